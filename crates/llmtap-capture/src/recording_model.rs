//! Recording model wrapper
//!
//! This module provides a [`ModelClient`] wrapper that captures every call it
//! forwards through a [`CaptureMiddleware`].

use crate::middleware::CaptureMiddleware;
use async_trait::async_trait;
use llmtap_core::{CallParams, ModelClient, ModelInfo, ModelResponse, Result, StreamResult};
use std::sync::Arc;

/// Recording model wrapper
///
/// Wraps a model client and records one row per call to the middleware's sink.
pub struct RecordingModel<M: ModelClient> {
    model: Arc<M>,
    middleware: CaptureMiddleware,
    info: ModelInfo,
}

impl<M: ModelClient> RecordingModel<M> {
    /// Create a new recording model
    pub fn new(model: Arc<M>, middleware: CaptureMiddleware) -> Self {
        let info = ModelInfo::new(model.provider(), model.model_id());
        Self {
            model,
            middleware,
            info,
        }
    }

    /// The wrapped client
    pub fn inner(&self) -> &Arc<M> {
        &self.model
    }
}

#[async_trait]
impl<M: ModelClient + 'static> ModelClient for RecordingModel<M> {
    fn provider(&self) -> &str {
        &self.info.provider
    }

    fn model_id(&self) -> &str {
        &self.info.model_id
    }

    async fn generate(&self, params: &CallParams) -> Result<ModelResponse> {
        self.middleware
            .wrap_generate(&self.info, params, || self.model.generate(params))
            .await
    }

    async fn stream(&self, params: &CallParams) -> Result<StreamResult> {
        self.middleware
            .wrap_stream(&self.info, params, || self.model.stream(params))
            .await
    }
}
