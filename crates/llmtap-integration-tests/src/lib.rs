//! Shared fixtures for llmtap end-to-end tests
//!
//! Scripted model clients and sinks with controllable failure and latency,
//! used by the tests under `tests/`.

use async_trait::async_trait;
use llmtap_capture::{MemoryWriter, RowSink, WriterError, WriterResult};
use llmtap_core::{
    CallParams, CallRow, Error, ModelClient, ModelResponse, Result, StreamChunk, StreamResult,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

/// How a scripted stream ends after its chunks
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEnding {
    /// The chunk list is the whole stream
    Close,
    /// A transport error follows the chunks
    Abort(String),
}

/// Model client that replays a fixed response and chunk script
pub struct ScriptedModel {
    provider: String,
    model_id: String,
    response: Value,
    chunks: Vec<StreamChunk>,
    ending: StreamEnding,
    request_echo: Option<Value>,
    /// When set, `stream` is refused before any chunk is produced
    stream_rejection: Option<String>,
    /// Every n-th one-shot call (1-based) fails; 0 never fails
    fail_every: usize,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(provider: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model_id: model_id.into(),
            response: Value::Object(Default::default()),
            chunks: Vec::new(),
            ending: StreamEnding::Close,
            request_echo: None,
            stream_rejection: None,
            fail_every: 0,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_response(mut self, response: Value) -> Self {
        self.response = response;
        self
    }

    pub fn with_chunks(mut self, chunks: Vec<StreamChunk>) -> Self {
        self.chunks = chunks;
        self
    }

    pub fn with_ending(mut self, ending: StreamEnding) -> Self {
        self.ending = ending;
        self
    }

    pub fn with_request_echo(mut self, request: Value) -> Self {
        self.request_echo = Some(request);
        self
    }

    pub fn rejecting_streams(mut self, reason: impl Into<String>) -> Self {
        self.stream_rejection = Some(reason.into());
        self
    }

    pub fn failing_every(mut self, n: usize) -> Self {
        self.fail_every = n;
        self
    }

    /// One-shot calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, _params: &CallParams) -> Result<ModelResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_every > 0 && n % self.fail_every == 0 {
            return Err(Error::invocation(format!("scripted failure {n}")));
        }
        Ok(ModelResponse::new(self.response.clone()))
    }

    async fn stream(&self, _params: &CallParams) -> Result<StreamResult> {
        if let Some(reason) = &self.stream_rejection {
            return Err(Error::Provider(reason.clone()));
        }

        let mut items: Vec<Result<StreamChunk>> = self.chunks.iter().cloned().map(Ok).collect();
        if let StreamEnding::Abort(reason) = &self.ending {
            items.push(Err(Error::StreamAborted(reason.clone())));
        }

        let result = StreamResult::new(Box::new(futures::stream::iter(items)));
        Ok(match &self.request_echo {
            Some(request) => result.with_request(request.clone()),
            None => result,
        })
    }
}

/// Text fragments followed by a finish chunk
pub fn text_stream(fragments: &[&str], usage: Option<Value>) -> Vec<StreamChunk> {
    let mut chunks = vec![StreamChunk::StreamStart { warnings: vec![] }];
    chunks.extend(fragments.iter().map(|f| StreamChunk::text("txt-0", *f)));
    chunks.push(StreamChunk::finish("stop", usage));
    chunks
}

/// Sink that rejects every row
pub struct FailingSink;

#[async_trait]
impl RowSink for FailingSink {
    async fn save(&self, _row: &CallRow) -> WriterResult<()> {
        Err(WriterError::Database("disk I/O error".to_string()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Sink that holds each save until a permit is released.
///
/// Every save consumes one permit for good, so `release(n)` lets exactly `n`
/// saves through.
pub struct GatedSink {
    gate: Semaphore,
    inner: MemoryWriter,
}

impl GatedSink {
    pub fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            inner: MemoryWriter::new(),
        }
    }

    /// Let the next `n` saves through
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn rows(&self) -> &MemoryWriter {
        &self.inner
    }
}

impl Default for GatedSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RowSink for GatedSink {
    async fn save(&self, row: &CallRow) -> WriterResult<()> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| WriterError::NotInitialized)?;
        permit.forget();
        self.inner.save(row).await
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

/// Poll `writer` until it holds `expected` rows or a second has passed
pub async fn wait_for_rows(writer: &MemoryWriter, expected: usize) -> Vec<CallRow> {
    for _ in 0..100 {
        if writer.len().await >= expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    writer.rows().await
}
