//! Model invocation capability
//!
//! The underlying model client is opaque: a one-shot call returns a result
//! object of provider-dependent shape, a streaming call returns a sequence of
//! typed chunks. Both shapes are carried as JSON and read through
//! [`FieldBag`](crate::FieldBag).

use crate::{FieldBag, Result, StreamChunk};
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Boxed chunk sequence returned by a streaming call.
///
/// An `Err` item is a transport-level failure; the stream is over after it.
pub type ChunkStream = Box<dyn Stream<Item = Result<StreamChunk>> + Send + Unpin>;

#[async_trait::async_trait]
pub trait ModelClient: Send + Sync {
    /// Provider name (e.g. "openai", "anthropic")
    fn provider(&self) -> &str;

    /// Model identifier requested by this client
    fn model_id(&self) -> &str;

    /// Run a one-shot generation
    async fn generate(&self, params: &CallParams) -> Result<ModelResponse>;

    /// Run a streaming generation
    async fn stream(&self, params: &CallParams) -> Result<StreamResult>;
}

/// Identity of the model behind a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub provider: String,
    pub model_id: String,
}

impl ModelInfo {
    pub fn new(provider: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model_id: model_id.into(),
        }
    }

    /// Snapshot the identity of a client
    pub fn of(client: &dyn ModelClient) -> Self {
        Self::new(client.provider(), client.model_id())
    }
}

/// Call parameters exactly as the caller supplied them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallParams(Value);

impl CallParams {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn bag(&self) -> FieldBag<'_> {
        FieldBag::new(&self.0)
    }
}

impl Default for CallParams {
    fn default() -> Self {
        Self(Value::Object(Default::default()))
    }
}

impl From<Value> for CallParams {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Result object of a one-shot generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelResponse(Value);

impl ModelResponse {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn bag(&self) -> FieldBag<'_> {
        FieldBag::new(&self.0)
    }
}

impl From<Value> for ModelResponse {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Result of a streaming generation
pub struct StreamResult {
    /// The chunk sequence
    pub stream: ChunkStream,

    /// Realized request body, when the provider echoes it
    pub request: Option<Value>,

    /// Response metadata known when the stream opened (headers, id)
    pub response: Option<Value>,
}

impl StreamResult {
    pub fn new(stream: ChunkStream) -> Self {
        Self {
            stream,
            request: None,
            response: None,
        }
    }

    pub fn with_request(mut self, request: Value) -> Self {
        self.request = Some(request);
        self
    }

    pub fn with_response(mut self, response: Value) -> Self {
        self.response = Some(response);
        self
    }
}

impl std::fmt::Debug for StreamResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResult")
            .field("request", &self.request)
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}
