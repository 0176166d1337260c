//! Call interception
//!
//! [`CaptureMiddleware`] wraps one-shot and streaming model invocations. Each
//! wrapper receives the call parameters plus a continuation that performs the
//! real call, and returns the continuation's result to the caller unchanged.
//!
//! One-shot rows are persisted before the result is returned; a persistence
//! failure is logged and never replaces the result. Streaming rows are handed
//! to a detached task the moment the finish chunk passes through, so the
//! caller's consumption of the stream never waits on the sink.

use crate::aggregator::StreamAggregator;
use crate::builder::{CallStart, RowBuilder};
use crate::config::CaptureConfig;
use crate::writer::RowSink;
use futures::StreamExt;
use futures::stream::Stream;
use llmtap_core::{
    CallParams, CallRow, ChunkStream, ErrorPayload, ModelInfo, ModelResponse, Result, StreamChunk,
    StreamResult,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

#[cfg(feature = "metrics")]
use llmtap_observability::CaptureMetrics;

const PATH_GENERATE: &str = "generate";
const PATH_STREAM: &str = "stream";

/// Before/after hooks around model invocations
#[derive(Clone)]
pub struct CaptureMiddleware {
    persister: Persister,
    builder: RowBuilder,
    enabled: bool,
    persist_incomplete_streams: bool,
}

impl CaptureMiddleware {
    /// Capture every call into `sink` with default settings
    pub fn new(sink: Arc<dyn RowSink>) -> Self {
        Self {
            persister: Persister {
                sink,
                #[cfg(feature = "metrics")]
                metrics: None,
            },
            builder: RowBuilder::default(),
            enabled: true,
            persist_incomplete_streams: false,
        }
    }

    /// Capture according to `config`
    pub fn from_config(config: &CaptureConfig, sink: Arc<dyn RowSink>) -> Self {
        Self::new(sink)
            .with_enabled(config.enabled)
            .with_tag_namespace(config.tag_namespace.clone())
            .with_persist_incomplete_streams(config.persist_incomplete_streams)
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_tag_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.builder = RowBuilder::new(namespace);
        self
    }

    /// Persist an "aborted" row for streams that end without a finish chunk
    pub fn with_persist_incomplete_streams(mut self, persist: bool) -> Self {
        self.persist_incomplete_streams = persist;
        self
    }

    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: Arc<CaptureMetrics>) -> Self {
        self.persister.metrics = Some(metrics);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Wrap a one-shot invocation.
    ///
    /// The continuation's result, success or error, is returned unchanged after
    /// its row has been persisted.
    pub async fn wrap_generate<F, Fut>(
        &self,
        model: &ModelInfo,
        params: &CallParams,
        continuation: F,
    ) -> Result<ModelResponse>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ModelResponse>>,
    {
        if !self.enabled {
            return continuation().await;
        }

        let call = CallStart::begin(model.clone(), false);
        let result = continuation().await;

        let row = match &result {
            Ok(response) => self.builder.build(&call, params, response),
            Err(e) => {
                tracing::debug!(call_id = %call.id, model_id = %model.model_id, error = %e, "Model call failed");
                self.builder
                    .build_error(&call, params, None, ErrorPayload::from_error(e))
            }
        };
        self.persister.save(row, PATH_GENERATE).await;

        result
    }

    /// Wrap a streaming invocation.
    ///
    /// The returned stream yields exactly the chunks of the underlying stream,
    /// in order. If the continuation itself fails, an error row is persisted and
    /// the failure is returned unchanged.
    pub async fn wrap_stream<F, Fut>(
        &self,
        model: &ModelInfo,
        params: &CallParams,
        continuation: F,
    ) -> Result<StreamResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<StreamResult>>,
    {
        if !self.enabled {
            return continuation().await;
        }

        let call = CallStart::begin(model.clone(), true);
        let StreamResult {
            stream,
            request,
            response,
        } = match continuation().await {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(call_id = %call.id, model_id = %model.model_id, error = %e, "Stream failed to open");
                let row = self
                    .builder
                    .build_error(&call, params, None, ErrorPayload::from_error(&e));
                self.persister.save(row, PATH_STREAM).await;
                return Err(e);
            }
        };

        let mut aggregator = StreamAggregator::new(call, params.clone(), self.builder.clone());
        aggregator.capture_request(request.clone());
        aggregator.capture_response(response.clone());

        let recording = RecordingStream {
            inner: stream,
            aggregator: Some(aggregator),
            persister: self.persister.clone(),
            persist_incomplete: self.persist_incomplete_streams,
        };

        Ok(StreamResult {
            stream: Box::new(recording),
            request,
            response,
        })
    }
}

/// Hands finalized rows to the sink and reports the outcome
#[derive(Clone)]
struct Persister {
    sink: Arc<dyn RowSink>,
    #[cfg(feature = "metrics")]
    metrics: Option<Arc<CaptureMetrics>>,
}

impl Persister {
    async fn save(&self, row: CallRow, path: &'static str) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_call(path, row.latency_ms, row.is_error());
        }

        let result = self.sink.save(&row).await;

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_persisted(path, result.is_ok());
        }

        match result {
            Ok(()) => {
                tracing::debug!(call_id = %row.id, model_id = %row.model_id, path, "Captured call row");
            }
            Err(e) => {
                tracing::warn!(
                    call_id = %row.id,
                    sink = self.sink.name(),
                    error = %e,
                    "Failed to persist call row"
                );
            }
        }
    }

    /// Persist on a detached task; the caller never awaits it
    fn spawn_save(&self, row: CallRow, path: &'static str) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let persister = self.clone();
                handle.spawn(async move {
                    persister.save(row, path).await;
                });
            }
            Err(_) => {
                tracing::warn!(call_id = %row.id, "No async runtime available, dropping call row");
            }
        }
    }

    fn record_incomplete(&self) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_incomplete_stream();
        }
    }
}

/// Pass-through stream that feeds every chunk to the call's aggregator
struct RecordingStream {
    inner: ChunkStream,
    /// `None` once the call has been finalized or discarded
    aggregator: Option<StreamAggregator>,
    persister: Persister,
    persist_incomplete: bool,
}

impl RecordingStream {
    /// The stream ended or failed before a finish chunk
    fn end_incomplete(&mut self, cause: Option<ErrorPayload>) {
        let Some(mut aggregator) = self.aggregator.take() else {
            return;
        };
        self.persister.record_incomplete();

        if !self.persist_incomplete {
            tracing::debug!(
                call_id = %aggregator.call().id,
                "Stream ended without a finish chunk, discarding call"
            );
            return;
        }

        if let Some(row) = aggregator.abort(cause) {
            self.persister.spawn_save(row, PATH_STREAM);
        }
    }
}

impl Stream for RecordingStream {
    type Item = Result<StreamChunk>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                let finalized = this
                    .aggregator
                    .as_mut()
                    .and_then(|aggregator| aggregator.observe(&chunk));
                if let Some(row) = finalized {
                    this.aggregator = None;
                    this.persister.spawn_save(row, PATH_STREAM);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.end_incomplete(Some(ErrorPayload::from_error(&e)));
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.end_incomplete(None);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for RecordingStream {
    fn drop(&mut self) {
        // Cancellation never persists
        if let Some(aggregator) = self.aggregator.take() {
            self.persister.record_incomplete();
            tracing::debug!(
                call_id = %aggregator.call().id,
                "Stream dropped before a finish chunk, discarding call"
            );
        }
    }
}

#[cfg(test)]
mod tests;
