//! Row builder
//!
//! Turns the parameters and result of one logical call into a [`CallRow`].
//! Building never fails: a field that cannot be extracted is left empty.

use crate::extract::{self, DEFAULT_TAG_NAMESPACE, RequestView};
use crate::usage::normalize_usage;
use chrono::{DateTime, Utc};
use llmtap_core::{
    CallParams, CallRow, ErrorPayload, FieldBag, ModelInfo, ModelResponse,
    row::FINISH_REASON_ERROR,
};
use serde_json::{Map, Value, json};
use std::time::Instant;
use uuid::Uuid;

/// Identity and start instant of a logical call
#[derive(Debug, Clone)]
pub struct CallStart {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub model: ModelInfo,
    pub streaming: bool,
    started: Instant,
}

impl CallStart {
    /// Open a new logical call with a fresh id
    pub fn begin(model: ModelInfo, streaming: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            model,
            streaming,
            started: Instant::now(),
        }
    }

    /// Milliseconds since the call began
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Builds call rows for one capture configuration
#[derive(Debug, Clone)]
pub struct RowBuilder {
    tag_namespace: String,
}

impl Default for RowBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_TAG_NAMESPACE)
    }
}

impl RowBuilder {
    pub fn new(tag_namespace: impl Into<String>) -> Self {
        Self {
            tag_namespace: tag_namespace.into(),
        }
    }

    pub fn tag_namespace(&self) -> &str {
        &self.tag_namespace
    }

    /// Row for a call that returned successfully
    pub fn build(&self, call: &CallStart, params: &CallParams, response: &ModelResponse) -> CallRow {
        let result = response.bag();
        let mut row = self.base_row(call, params, result.path("request.body"));

        if let Some(model_id) = extract::reported_model_id(result) {
            row.model_id = model_id;
        }

        row.output_text = extract::output_text(result);
        row.output_json = result.value().cloned();
        row.content_json = extract::content_segments(result);
        (row.reasoning_text, row.reasoning_json) = extract::reasoning(result);

        let tool_calls = extract::tool_calls(result);
        row.tool_count = Some(tool_calls.len() as u64);
        row.tool_names_json = extract::tool_names(&tool_calls);
        if !tool_calls.is_empty() {
            row.response_tools_json = serde_json::to_value(&tool_calls).ok();
        }

        row.finish_reason = extract::finish_reason(result);
        row.request_id = extract::request_id(result);
        row.response_id = extract::response_id(result);
        row.headers_json = extract::response_headers(result);
        row.warnings_json = extract::warnings(result);
        row.usage = normalize_usage(result.get("usage"), extract::raw_usage(result));
        row.meta_json = Some(meta(call, result.get("providerMetadata")));

        row
    }

    /// Row for a call that failed. Only request-side fields and the error are set.
    pub fn build_error(
        &self,
        call: &CallStart,
        params: &CallParams,
        request_echo: Option<&Value>,
        error: ErrorPayload,
    ) -> CallRow {
        let mut row = self.base_row(call, params, FieldBag::from_option(request_echo));
        row.finish_reason = Some(FINISH_REASON_ERROR.to_string());
        row.error_json = Some(error);
        row.meta_json = Some(meta(call, FieldBag::empty()));
        row
    }

    fn base_row(&self, call: &CallStart, params: &CallParams, request_echo: FieldBag<'_>) -> CallRow {
        let RequestView {
            input_text,
            input_json,
            prompt_json,
            request_tools_json,
            parallel_tool_calls,
            sampling,
            tags,
        } = extract::request_view(params.bag(), request_echo, &self.tag_namespace);

        let mut row = CallRow::new(&call.id, call.started_at, &call.model.model_id);
        row.tags = tags;
        row.input_text = input_text;
        row.input_json = input_json;
        row.prompt_json = prompt_json;
        row.request_tools_json = request_tools_json;
        row.parallel_tool_calls = parallel_tool_calls;
        row.temperature = sampling.temperature;
        row.top_p = sampling.top_p;
        row.max_output_tokens = sampling.max_output_tokens;
        row.latency_ms = call.elapsed_ms();
        row
    }
}

fn meta(call: &CallStart, provider_metadata: FieldBag<'_>) -> Value {
    let mut meta = Map::new();
    meta.insert("provider".to_string(), json!(call.model.provider));
    meta.insert("streaming".to_string(), json!(call.streaming));
    if let Some(provider_metadata) = provider_metadata.value() {
        meta.insert("providerMetadata".to_string(), provider_metadata.clone());
    }
    Value::Object(meta)
}
