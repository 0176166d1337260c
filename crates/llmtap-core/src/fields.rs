//! Optional field bag over provider payloads
//!
//! Provider responses and call parameters arrive as JSON of unknown exact shape.
//! Every read goes through [`FieldBag`], which never panics and never errors:
//! a missing key, a `null`, or a value of the wrong type all read as absent.
//!
//! Paths are dotted (`"response.body.choices.0.message"`); candidate lists are tried in
//! order and the first candidate that yields a usable value wins.

use serde_json::{Map, Value};

/// Read-only view over an optional JSON value
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldBag<'a> {
    value: Option<&'a Value>,
}

impl<'a> FieldBag<'a> {
    /// Create a bag over a JSON value
    pub fn new(value: &'a Value) -> Self {
        Self::from_option(Some(value))
    }

    /// Create a bag over a value that may be missing
    pub fn from_option(value: Option<&'a Value>) -> Self {
        Self {
            value: value.filter(|v| !v.is_null()),
        }
    }

    /// An empty bag; every lookup on it is absent
    pub fn empty() -> Self {
        Self { value: None }
    }

    /// The underlying value (`null` reads as absent)
    pub fn value(&self) -> Option<&'a Value> {
        self.value
    }

    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }

    /// Look up a single object key
    pub fn get(&self, key: &str) -> FieldBag<'a> {
        Self::from_option(self.value.and_then(|v| v.as_object()).and_then(|o| o.get(key)))
    }

    /// Look up an object key ignoring ASCII case (header maps)
    pub fn get_ignore_case(&self, key: &str) -> FieldBag<'a> {
        let found = self.value.and_then(|v| v.as_object()).and_then(|o| {
            o.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        });
        Self::from_option(found)
    }

    /// Look up an array element
    pub fn index(&self, index: usize) -> FieldBag<'a> {
        Self::from_option(self.value.and_then(|v| v.as_array()).and_then(|a| a.get(index)))
    }

    /// Follow a dotted path; numeric segments index into arrays
    pub fn path(&self, path: &str) -> FieldBag<'a> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .fold(*self, |bag, segment| match segment.parse::<usize>() {
                Ok(index) if bag.as_array().is_some() => bag.index(index),
                _ => bag.get(segment),
            })
    }

    /// First candidate path that is present (any type)
    pub fn first_of(&self, paths: &[&str]) -> FieldBag<'a> {
        paths
            .iter()
            .map(|p| self.path(p))
            .find(|bag| bag.is_present())
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> Option<&'a str> {
        self.value.and_then(|v| v.as_str())
    }

    /// Non-negative integer, tolerating integral floats and numeric strings
    pub fn as_u64(&self) -> Option<u64> {
        match self.value? {
            Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                    .map(|f| f as u64)
            }),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<u64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                        .map(|f| f as u64)
                })
            }
            _ => None,
        }
    }

    /// Floating point number, tolerating numeric strings
    pub fn as_f64(&self) -> Option<f64> {
        match self.value? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value? {
            Value::Bool(b) => Some(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&'a Vec<Value>> {
        self.value.and_then(|v| v.as_array())
    }

    pub fn as_object(&self) -> Option<&'a Map<String, Value>> {
        self.value.and_then(|v| v.as_object())
    }

    /// Iterate array elements as bags (empty when not an array)
    pub fn items(self) -> impl Iterator<Item = FieldBag<'a>> + 'a {
        self.as_array()
            .into_iter()
            .flat_map(|items| items.iter().map(FieldBag::new))
    }

    /// Iterate object entries as bags (empty when not an object)
    pub fn entries(self) -> impl Iterator<Item = (&'a str, FieldBag<'a>)> + 'a {
        self.as_object()
            .into_iter()
            .flat_map(|o| o.iter().map(|(k, v)| (k.as_str(), FieldBag::new(v))))
    }

    /// First candidate path that reads as a string
    pub fn first_str(&self, paths: &[&str]) -> Option<&'a str> {
        paths.iter().find_map(|p| self.path(p).as_str())
    }

    /// First candidate path that reads as a non-negative integer
    pub fn first_u64(&self, paths: &[&str]) -> Option<u64> {
        paths.iter().find_map(|p| self.path(p).as_u64())
    }

    /// First candidate path that reads as a number
    pub fn first_f64(&self, paths: &[&str]) -> Option<f64> {
        paths.iter().find_map(|p| self.path(p).as_f64())
    }

    /// First candidate path that reads as a boolean
    pub fn first_bool(&self, paths: &[&str]) -> Option<bool> {
        paths.iter().find_map(|p| self.path(p).as_bool())
    }

    /// First candidate path that reads as an array
    pub fn first_array(&self, paths: &[&str]) -> Option<&'a Vec<Value>> {
        paths.iter().find_map(|p| self.path(p).as_array())
    }
}

impl<'a> From<&'a Value> for FieldBag<'a> {
    fn from(value: &'a Value) -> Self {
        Self::new(value)
    }
}

impl<'a> From<Option<&'a Value>> for FieldBag<'a> {
    fn from(value: Option<&'a Value>) -> Self {
        Self::from_option(value)
    }
}

#[cfg(test)]
mod tests;
