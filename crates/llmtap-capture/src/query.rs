//! Read-side query types for persisted call rows

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Filter for listing persisted calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallFilter {
    /// Only calls recorded against one of these models
    #[serde(default)]
    pub model_ids: Vec<String>,

    /// Only calls with one of these finish reasons
    #[serde(default)]
    pub finish_reasons: Vec<String>,

    /// Only calls whose row carries an error payload
    #[serde(default)]
    pub errors_only: bool,

    /// Only calls tagged with this exact tag
    #[serde(default)]
    pub tag: Option<String>,

    /// Page number (0-indexed)
    #[serde(default)]
    pub page: usize,

    /// Page size
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    50
}

impl Default for CallFilter {
    fn default() -> Self {
        Self {
            model_ids: Vec::new(),
            finish_reasons: Vec::new(),
            errors_only: false,
            tag: None,
            page: 0,
            page_size: default_page_size(),
        }
    }
}

impl CallFilter {
    /// Maximum number of items in filter arrays
    const MAX_FILTER_ARRAY_LEN: usize = 100;

    /// Maximum length for individual string elements
    const MAX_STRING_LEN: usize = 256;

    const MAX_PAGE_SIZE: usize = 1000;

    /// Create a new filter builder
    pub fn builder() -> CallFilterBuilder {
        CallFilterBuilder::default()
    }

    /// Validate the filter parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.page_size == 0 {
            return Err("page_size must be greater than 0".to_string());
        }

        if self.page_size > Self::MAX_PAGE_SIZE {
            return Err(format!(
                "page_size {} exceeds maximum {}",
                self.page_size,
                Self::MAX_PAGE_SIZE
            ));
        }

        for (name, values) in [
            ("model_ids", &self.model_ids),
            ("finish_reasons", &self.finish_reasons),
        ] {
            if values.len() > Self::MAX_FILTER_ARRAY_LEN {
                return Err(format!(
                    "{} exceeds maximum of {} items",
                    name,
                    Self::MAX_FILTER_ARRAY_LEN
                ));
            }
            if values.iter().any(|v| v.len() > Self::MAX_STRING_LEN) {
                return Err(format!(
                    "{} contains a value longer than {}",
                    name,
                    Self::MAX_STRING_LEN
                ));
            }
        }

        if let Some(ref tag) = self.tag
            && (tag.is_empty() || tag.len() > Self::MAX_STRING_LEN)
        {
            return Err(format!(
                "tag must be between 1 and {} characters",
                Self::MAX_STRING_LEN
            ));
        }

        Ok(())
    }

    /// Row offset of the requested page
    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.page_size)
    }
}

/// Builder for [`CallFilter`]
#[derive(Debug, Default)]
pub struct CallFilterBuilder {
    filter: CallFilter,
}

impl CallFilterBuilder {
    pub fn model_id(mut self, model_id: impl Into<String>) -> Self {
        self.filter.model_ids.push(model_id.into());
        self
    }

    pub fn finish_reason(mut self, reason: impl Into<String>) -> Self {
        self.filter.finish_reasons.push(reason.into());
        self
    }

    pub fn errors_only(mut self, errors_only: bool) -> Self {
        self.filter.errors_only = errors_only;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.filter.tag = Some(tag.into());
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.filter.page = page;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.filter.page_size = page_size;
        self
    }

    pub fn build(self) -> CallFilter {
        self.filter
    }
}

/// Search results with pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults<T> {
    /// Matching items
    pub items: Vec<T>,

    /// Total count of matching items (for pagination)
    pub total_count: u64,

    /// Current page (0-indexed)
    pub page: usize,

    /// Page size
    pub page_size: usize,

    /// Total pages
    pub total_pages: usize,
}

impl<T> SearchResults<T> {
    pub fn new(items: Vec<T>, total_count: u64, page: usize, page_size: usize) -> Self {
        let total_pages = if page_size > 0 {
            (total_count as usize).div_ceil(page_size).max(1)
        } else {
            1
        };

        Self {
            items,
            total_count,
            page,
            page_size,
            total_pages,
        }
    }

    pub fn has_next_page(&self) -> bool {
        self.page + 1 < self.total_pages
    }

    pub fn has_prev_page(&self) -> bool {
        self.page > 0
    }
}

/// One line of a call listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSummary {
    pub id: String,
    pub timestamp: String,
    pub model_id: String,
    pub finish_reason: Option<String>,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
    pub total_tokens: Option<i64>,
    pub latency_ms: Option<i64>,
    pub tool_count: Option<i64>,
    pub is_error: bool,
}

/// A stored `_json` column.
///
/// Columns that hold text which does not parse as JSON are kept raw so they
/// can still be displayed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JsonColumn {
    Parsed(Value),
    Raw(String),
}

impl JsonColumn {
    pub fn decode(stored: Option<String>) -> Option<Self> {
        let text = stored?;
        Some(match serde_json::from_str(&text) {
            Ok(value) => Self::Parsed(value),
            Err(_) => Self::Raw(text),
        })
    }

    /// The parsed value, or the raw text as a JSON string
    pub fn to_value(&self) -> Value {
        match self {
            Self::Parsed(value) => value.clone(),
            Self::Raw(text) => Value::String(text.clone()),
        }
    }
}

/// A full persisted call as read back from storage
#[derive(Debug, Clone, Serialize)]
pub struct StoredCall {
    pub id: String,
    pub timestamp: String,
    pub model_id: String,
    pub tags: Option<JsonColumn>,
    pub input_text: Option<String>,
    pub input_json: Option<JsonColumn>,
    pub prompt_json: Option<JsonColumn>,
    pub output_text: Option<String>,
    pub output_json: Option<JsonColumn>,
    pub content_json: Option<JsonColumn>,
    pub reasoning_text: Option<String>,
    pub reasoning_json: Option<JsonColumn>,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
    pub total_tokens: Option<i64>,
    pub cached_input_tokens: Option<i64>,
    pub reasoning_tokens: Option<i64>,
    pub output_reasoning_tokens: Option<i64>,
    pub request_tools_json: Option<JsonColumn>,
    pub response_tools_json: Option<JsonColumn>,
    pub tool_count: Option<i64>,
    pub tool_names_json: Option<JsonColumn>,
    pub parallel_tool_calls: Option<bool>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_output_tokens: Option<i64>,
    pub finish_reason: Option<String>,
    pub latency_ms: Option<i64>,
    pub warnings_json: Option<JsonColumn>,
    pub request_id: Option<String>,
    pub response_id: Option<String>,
    pub headers_json: Option<JsonColumn>,
    pub meta_json: Option<JsonColumn>,
    pub error_json: Option<JsonColumn>,
}

impl StoredCall {
    pub fn is_error(&self) -> bool {
        self.error_json.is_some()
    }
}

/// Call statistics aggregation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallAggregates {
    pub total_calls: u64,
    pub error_calls: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_tokens: u64,
    pub avg_latency_ms: f64,
    pub calls_by_model: HashMap<String, u64>,
}
