//! Stream chunk types
//!
//! A streaming invocation yields an ordered sequence of typed chunks. The set
//! of chunk types is closed; anything a provider emits that has no dedicated
//! variant travels as [`StreamChunk::Raw`] and is passed through untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One discrete, typed unit of a streaming response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum StreamChunk {
    /// Stream acknowledged by the provider
    StreamStart {
        #[serde(default)]
        warnings: Vec<Value>,
    },

    /// Provider-assigned response metadata
    ResponseMetadata {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        model_id: Option<String>,
        #[serde(default)]
        timestamp: Option<String>,
        #[serde(default)]
        headers: Option<Value>,
    },

    TextStart {
        id: String,
    },

    /// Output text fragment
    TextDelta {
        id: String,
        delta: String,
    },

    TextEnd {
        id: String,
    },

    ReasoningStart {
        id: String,
    },

    /// Reasoning text fragment
    ReasoningDelta {
        id: String,
        delta: String,
    },

    ReasoningEnd {
        id: String,
    },

    /// A tool call began streaming its input
    ToolInputStart {
        id: String,
        tool_name: String,
    },

    /// Tool input fragment
    ToolInputDelta {
        id: String,
        delta: String,
    },

    ToolInputEnd {
        id: String,
    },

    /// A complete tool call
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        input: String,
    },

    /// Inline error reported by the provider; the stream may continue
    Error {
        error: Value,
    },

    /// Terminal chunk carrying finish reason and usage
    Finish {
        #[serde(default)]
        finish_reason: Option<String>,
        #[serde(default)]
        usage: Option<Value>,
        #[serde(default)]
        provider_metadata: Option<Value>,
    },

    /// Provider-specific chunk passed through as-is
    Raw {
        raw_value: Value,
    },
}

impl StreamChunk {
    /// The `type` discriminator of this chunk
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StreamStart { .. } => "stream-start",
            Self::ResponseMetadata { .. } => "response-metadata",
            Self::TextStart { .. } => "text-start",
            Self::TextDelta { .. } => "text-delta",
            Self::TextEnd { .. } => "text-end",
            Self::ReasoningStart { .. } => "reasoning-start",
            Self::ReasoningDelta { .. } => "reasoning-delta",
            Self::ReasoningEnd { .. } => "reasoning-end",
            Self::ToolInputStart { .. } => "tool-input-start",
            Self::ToolInputDelta { .. } => "tool-input-delta",
            Self::ToolInputEnd { .. } => "tool-input-end",
            Self::ToolCall { .. } => "tool-call",
            Self::Error { .. } => "error",
            Self::Finish { .. } => "finish",
            Self::Raw { .. } => "raw",
        }
    }

    /// Whether this chunk finalizes the logical call
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish { .. })
    }

    /// Convenience constructor for a text fragment
    pub fn text(id: impl Into<String>, delta: impl Into<String>) -> Self {
        Self::TextDelta {
            id: id.into(),
            delta: delta.into(),
        }
    }

    /// Convenience constructor for a reasoning fragment
    pub fn reasoning(id: impl Into<String>, delta: impl Into<String>) -> Self {
        Self::ReasoningDelta {
            id: id.into(),
            delta: delta.into(),
        }
    }

    /// Convenience constructor for a finish chunk
    pub fn finish(finish_reason: impl Into<String>, usage: Option<Value>) -> Self {
        Self::Finish {
            finish_reason: Some(finish_reason.into()),
            usage,
            provider_metadata: None,
        }
    }
}
