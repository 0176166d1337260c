//! The flat call row persisted for every logical call
//!
//! A row carries either a response view or an error payload, never a
//! meaningful mix of both. Request-side fields are populated in both cases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `finish_reason` of a row whose underlying call failed
pub const FINISH_REASON_ERROR: &str = "error";

/// `finish_reason` of a stream finalized without a finish chunk
pub const FINISH_REASON_ABORTED: &str = "aborted";

/// Column names in storage order
pub const CALL_COLUMNS: [&str; 34] = [
    "id",
    "timestamp",
    "model_id",
    "tags",
    "input_text",
    "input_json",
    "prompt_json",
    "output_text",
    "output_json",
    "content_json",
    "reasoning_text",
    "reasoning_json",
    "input_tokens",
    "output_tokens",
    "total_tokens",
    "cached_input_tokens",
    "reasoning_tokens",
    "output_reasoning_tokens",
    "request_tools_json",
    "response_tools_json",
    "tool_count",
    "tool_names_json",
    "parallel_tool_calls",
    "temperature",
    "top_p",
    "max_output_tokens",
    "finish_reason",
    "latency_ms",
    "warnings_json",
    "request_id",
    "response_id",
    "headers_json",
    "meta_json",
    "error_json",
];

/// Canonical token usage; every count is optional since providers differ
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
    pub cached_input_tokens: Option<u64>,
    pub reasoning_tokens: Option<u64>,
    pub output_reasoning_tokens: Option<u64>,
}

impl TokenUsage {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Terminal error of a logical call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorPayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    /// Capture an error: its message plus the rendered chain of sources
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(format!("caused by: {}", cause));
            source = cause.source();
        }

        Self {
            message: err.to_string(),
            stack: (!causes.is_empty()).then(|| causes.join("\n")),
        }
    }

    /// Capture an inline error reported inside a stream
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(message) => Self::new(message.clone()),
            Value::Object(map) => Self {
                message: map
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string()),
                stack: map.get("stack").and_then(Value::as_str).map(str::to_string),
            },
            other => Self::new(other.to_string()),
        }
    }
}

/// Immutable, finalized record of one logical call.
///
/// Field names match storage column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRow {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub model_id: String,
    pub tags: Option<Vec<String>>,

    // Request view
    pub input_text: Option<String>,
    pub input_json: Option<Value>,
    pub prompt_json: Option<Value>,
    pub request_tools_json: Option<Value>,
    pub parallel_tool_calls: Option<bool>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_output_tokens: Option<u64>,

    // Response view
    pub output_text: Option<String>,
    pub output_json: Option<Value>,
    pub content_json: Option<Value>,
    pub reasoning_text: Option<String>,
    pub reasoning_json: Option<Value>,
    pub response_tools_json: Option<Value>,
    pub tool_count: Option<u64>,
    pub tool_names_json: Option<Vec<String>>,
    pub finish_reason: Option<String>,
    pub request_id: Option<String>,
    pub response_id: Option<String>,
    pub headers_json: Option<Value>,

    #[serde(flatten)]
    pub usage: TokenUsage,

    pub latency_ms: u64,
    pub warnings_json: Option<Value>,
    pub meta_json: Option<Value>,
    pub error_json: Option<ErrorPayload>,
}

impl CallRow {
    /// Empty row for a call that started at `timestamp`
    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>, model_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            timestamp,
            model_id: model_id.into(),
            tags: None,
            input_text: None,
            input_json: None,
            prompt_json: None,
            request_tools_json: None,
            parallel_tool_calls: None,
            temperature: None,
            top_p: None,
            max_output_tokens: None,
            output_text: None,
            output_json: None,
            content_json: None,
            reasoning_text: None,
            reasoning_json: None,
            response_tools_json: None,
            tool_count: None,
            tool_names_json: None,
            finish_reason: None,
            request_id: None,
            response_id: None,
            headers_json: None,
            usage: TokenUsage::default(),
            latency_ms: 0,
            warnings_json: None,
            meta_json: None,
            error_json: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_json.is_some()
    }

    /// Storage values in [`CALL_COLUMNS`] order
    pub fn columns(&self) -> Vec<(&'static str, ColumnValue)> {
        let values = vec![
            ColumnValue::text(&self.id),
            ColumnValue::Text(self.timestamp.to_rfc3339()),
            ColumnValue::text(&self.model_id),
            ColumnValue::serialized(self.tags.as_ref()),
            ColumnValue::opt_text(self.input_text.as_deref()),
            ColumnValue::json(self.input_json.as_ref()),
            ColumnValue::json(self.prompt_json.as_ref()),
            ColumnValue::opt_text(self.output_text.as_deref()),
            ColumnValue::json(self.output_json.as_ref()),
            ColumnValue::json(self.content_json.as_ref()),
            ColumnValue::opt_text(self.reasoning_text.as_deref()),
            ColumnValue::json(self.reasoning_json.as_ref()),
            ColumnValue::count(self.usage.input_tokens),
            ColumnValue::count(self.usage.output_tokens),
            ColumnValue::count(self.usage.total_tokens),
            ColumnValue::count(self.usage.cached_input_tokens),
            ColumnValue::count(self.usage.reasoning_tokens),
            ColumnValue::count(self.usage.output_reasoning_tokens),
            ColumnValue::json(self.request_tools_json.as_ref()),
            ColumnValue::json(self.response_tools_json.as_ref()),
            ColumnValue::count(self.tool_count),
            ColumnValue::serialized(self.tool_names_json.as_ref()),
            ColumnValue::flag(self.parallel_tool_calls),
            ColumnValue::real(self.temperature),
            ColumnValue::real(self.top_p),
            ColumnValue::count(self.max_output_tokens),
            ColumnValue::opt_text(self.finish_reason.as_deref()),
            ColumnValue::count(Some(self.latency_ms)),
            ColumnValue::json(self.warnings_json.as_ref()),
            ColumnValue::opt_text(self.request_id.as_deref()),
            ColumnValue::opt_text(self.response_id.as_deref()),
            ColumnValue::json(self.headers_json.as_ref()),
            ColumnValue::json(self.meta_json.as_ref()),
            ColumnValue::serialized(self.error_json.as_ref()),
        ];

        CALL_COLUMNS.into_iter().zip(values).collect()
    }
}

/// A storage-ready primitive value
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl ColumnValue {
    pub fn text(value: &str) -> Self {
        Self::Text(value.to_string())
    }

    pub fn opt_text(value: Option<&str>) -> Self {
        value.map_or(Self::Null, Self::text)
    }

    /// Unsigned count; values beyond `i64::MAX` saturate
    pub fn count(value: Option<u64>) -> Self {
        value.map_or(Self::Null, |v| Self::Integer(i64::try_from(v).unwrap_or(i64::MAX)))
    }

    pub fn real(value: Option<f64>) -> Self {
        value.map_or(Self::Null, Self::Real)
    }

    /// Booleans are stored as 0/1
    pub fn flag(value: Option<bool>) -> Self {
        value.map_or(Self::Null, |b| Self::Integer(i64::from(b)))
    }

    /// JSON column: every value, strings included, is stored as serialized
    /// JSON text so it decodes back to the same value
    pub fn json(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Null,
            Some(other) => Self::serialized(Some(other)),
        }
    }

    /// Serialized text form of any value; on an encoding fault, falls back to
    /// the value's debug rendering and logs a warning
    pub fn serialized<T: Serialize + std::fmt::Debug>(value: Option<&T>) -> Self {
        let Some(value) = value else {
            return Self::Null;
        };

        match serde_json::to_string(value) {
            Ok(text) => Self::Text(text),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize column value, storing debug form");
                Self::Text(format!("{:?}", value))
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}
