//! Stream aggregation
//!
//! A [`StreamAggregator`] is created fresh for every streaming call and owned
//! by the stream that feeds it. It accumulates chunks in arrival order and
//! produces exactly one row, at the `finish` chunk (or on an explicit abort).

use crate::builder::{CallStart, RowBuilder};
use llmtap_core::{
    CallParams, CallRow, ErrorPayload, ModelResponse, StreamChunk,
    row::FINISH_REASON_ABORTED,
};
use serde_json::{Map, Value, json};

/// Message recorded when a stream closes without a finish chunk
pub const ENDED_WITHOUT_FINISH: &str = "Stream ended before a finish chunk";

/// Accumulated state of one streaming call
#[derive(Debug)]
pub struct StreamAggregator {
    call: CallStart,
    params: CallParams,
    builder: RowBuilder,
    request_snapshot: Option<Value>,
    response: Map<String, Value>,
    output_text: Option<String>,
    reasoning_text: Option<String>,
    tool_input_trace: String,
    tool_calls: Vec<Value>,
    warnings: Option<Value>,
    error: Option<ErrorPayload>,
    finalized: bool,
}

impl StreamAggregator {
    pub fn new(call: CallStart, params: CallParams, builder: RowBuilder) -> Self {
        Self {
            call,
            params,
            builder,
            request_snapshot: None,
            response: Map::new(),
            output_text: None,
            reasoning_text: None,
            tool_input_trace: String::new(),
            tool_calls: Vec::new(),
            warnings: None,
            error: None,
            finalized: false,
        }
    }

    pub fn call(&self) -> &CallStart {
        &self.call
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Record the realized request body. Only the first snapshot is kept.
    pub fn capture_request(&mut self, request: Option<Value>) {
        if self.request_snapshot.is_none() {
            self.request_snapshot = request.filter(|r| !r.is_null());
        }
    }

    /// Seed response metadata known when the stream opened
    pub fn capture_response(&mut self, response: Option<Value>) {
        if let Some(Value::Object(fields)) = response {
            self.response.extend(fields);
        }
    }

    /// Feed one chunk. Returns the finalized row when `chunk` is the first
    /// finish chunk of the stream.
    pub fn observe(&mut self, chunk: &StreamChunk) -> Option<CallRow> {
        if self.finalized {
            return None;
        }

        match chunk {
            StreamChunk::TextDelta { delta, .. } => {
                self.output_text.get_or_insert_with(String::new).push_str(delta);
            }
            StreamChunk::ReasoningDelta { delta, .. } => {
                self.reasoning_text.get_or_insert_with(String::new).push_str(delta);
            }
            StreamChunk::ToolInputStart { tool_name, .. } => {
                if !self.tool_input_trace.is_empty() {
                    self.tool_input_trace.push('\n');
                }
                self.tool_input_trace.push_str(tool_name);
                self.tool_input_trace.push_str(": ");
            }
            StreamChunk::ToolInputDelta { delta, .. } => {
                self.tool_input_trace.push_str(delta);
            }
            StreamChunk::ToolCall {
                tool_call_id,
                tool_name,
                input,
            } => {
                self.tool_calls.push(json!({
                    "toolCallId": tool_call_id,
                    "toolName": tool_name,
                    "input": input,
                }));
            }
            StreamChunk::StreamStart { warnings } => {
                if !warnings.is_empty() {
                    self.warnings = Some(Value::Array(warnings.clone()));
                }
            }
            StreamChunk::ResponseMetadata {
                id,
                model_id,
                timestamp,
                headers,
            } => {
                let fields = [
                    ("id", id.clone().map(Value::String)),
                    ("modelId", model_id.clone().map(Value::String)),
                    ("timestamp", timestamp.clone().map(Value::String)),
                    ("headers", headers.clone()),
                ];
                for (key, value) in fields {
                    if let Some(value) = value {
                        self.response.insert(key.to_string(), value);
                    }
                }
            }
            StreamChunk::Error { error } => {
                tracing::debug!(call_id = %self.call.id, "Inline error chunk in stream");
                self.error = Some(ErrorPayload::from_value(error));
            }
            StreamChunk::Finish {
                finish_reason,
                usage,
                provider_metadata,
            } => {
                return Some(self.finalize(finish_reason, usage, provider_metadata));
            }
            StreamChunk::TextStart { .. }
            | StreamChunk::TextEnd { .. }
            | StreamChunk::ReasoningStart { .. }
            | StreamChunk::ReasoningEnd { .. }
            | StreamChunk::ToolInputEnd { .. }
            | StreamChunk::Raw { .. } => {}
        }

        None
    }

    /// Finalize a stream that ended without a finish chunk as an aborted
    /// error row. `cause` is the transport error, if any.
    pub fn abort(&mut self, cause: Option<ErrorPayload>) -> Option<CallRow> {
        if self.finalized {
            return None;
        }
        self.finalized = true;

        let error = cause
            .or_else(|| self.error.take())
            .unwrap_or_else(|| ErrorPayload::new(ENDED_WITHOUT_FINISH));
        let mut row =
            self.builder
                .build_error(&self.call, &self.params, self.request_snapshot.as_ref(), error);
        row.finish_reason = Some(FINISH_REASON_ABORTED.to_string());

        let mut extra = vec![("aborted", Value::Bool(true))];
        if let Some(partial) = self.output_text.take() {
            extra.push(("partialOutput", Value::String(partial)));
        }
        self.extend_meta(&mut row, extra);
        Some(row)
    }

    fn finalize(
        &mut self,
        finish_reason: &Option<String>,
        usage: &Option<Value>,
        provider_metadata: &Option<Value>,
    ) -> CallRow {
        self.finalized = true;

        if let Some(error) = self.error.take() {
            let mut row =
                self.builder
                    .build_error(&self.call, &self.params, self.request_snapshot.as_ref(), error);
            self.extend_meta(&mut row, Vec::new());
            return row;
        }

        let response = ModelResponse::new(self.synthesize(finish_reason, usage, provider_metadata));
        let mut row = self.builder.build(&self.call, &self.params, &response);
        self.extend_meta(&mut row, Vec::new());
        row
    }

    /// Assemble a result object equivalent to a one-shot response
    fn synthesize(
        &mut self,
        finish_reason: &Option<String>,
        usage: &Option<Value>,
        provider_metadata: &Option<Value>,
    ) -> Value {
        let mut result = Map::new();
        let mut put = |key: &str, value: Option<Value>| {
            if let Some(value) = value {
                result.insert(key.to_string(), value);
            }
        };

        put("content", self.content_segments());
        put("text", self.output_text.take().map(Value::String));
        put("reasoningText", self.reasoning_text.take().map(Value::String));
        put(
            "toolCalls",
            (!self.tool_calls.is_empty()).then(|| Value::Array(std::mem::take(&mut self.tool_calls))),
        );
        put("finishReason", finish_reason.clone().map(Value::String));
        put("usage", usage.clone());
        put("providerMetadata", provider_metadata.clone());
        put("warnings", self.warnings.take());
        put(
            "request",
            self.request_snapshot.clone().map(|body| json!({ "body": body })),
        );
        put(
            "response",
            (!self.response.is_empty()).then(|| Value::Object(std::mem::take(&mut self.response))),
        );

        Value::Object(result)
    }

    /// Reasoning, text and tool-call segments in the one-shot `content` shape
    fn content_segments(&self) -> Option<Value> {
        let reasoning = self
            .reasoning_text
            .as_ref()
            .map(|text| json!({"type": "reasoning", "text": text}));
        let text = self
            .output_text
            .as_ref()
            .map(|text| json!({"type": "text", "text": text}));
        let tool_calls = self.tool_calls.iter().map(|call| {
            let mut segment = Map::new();
            segment.insert("type".to_string(), Value::String("tool-call".to_string()));
            if let Value::Object(fields) = call {
                segment.extend(fields.clone());
            }
            Value::Object(segment)
        });

        let segments: Vec<Value> = reasoning.into_iter().chain(text).chain(tool_calls).collect();
        (!segments.is_empty()).then_some(Value::Array(segments))
    }

    fn extend_meta(&self, row: &mut CallRow, extra: Vec<(&str, Value)>) {
        let Some(Value::Object(meta)) = row.meta_json.as_mut() else {
            return;
        };
        if !self.tool_input_trace.is_empty() {
            meta.insert(
                "toolInputTrace".to_string(),
                Value::String(self.tool_input_trace.clone()),
            );
        }
        for (key, value) in extra {
            meta.insert(key.to_string(), value);
        }
    }
}
