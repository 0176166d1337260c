//! Field extraction
//!
//! Pure, total functions that pull normalized values out of call parameters
//! and provider results of unknown exact shape. A field that cannot be derived
//! reads as `None`; nothing here returns an error or panics.

use llmtap_core::FieldBag;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default `providerOptions` namespace that carries caller-supplied tags
pub const DEFAULT_TAG_NAMESPACE: &str = "llmtap";

const REQUEST_ID_HEADERS: [&str; 3] = ["x-request-id", "request-id", "anthropic-request-id"];

/// Request-side view of a logical call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestView {
    pub input_text: Option<String>,
    pub input_json: Option<Value>,
    pub prompt_json: Option<Value>,
    pub request_tools_json: Option<Value>,
    pub parallel_tool_calls: Option<bool>,
    pub sampling: SamplingParams,
    pub tags: Option<Vec<String>>,
}

/// Sampling parameters of a call
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SamplingParams {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_output_tokens: Option<u64>,
}

/// A tool call made by the model, normalized across provider dialects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    pub input: Value,
}

/// Build the request view from call parameters.
///
/// `request_echo` is the realized request body reported by the provider, used
/// to collate input text when the parameters carry neither messages nor a prompt.
pub fn request_view(params: FieldBag<'_>, request_echo: FieldBag<'_>, tag_namespace: &str) -> RequestView {
    RequestView {
        input_text: input_text(params, request_echo),
        input_json: params.value().cloned(),
        prompt_json: prompt_json(params),
        request_tools_json: declared_tools(params),
        parallel_tool_calls: parallel_tool_calls(params),
        sampling: sampling(params),
        tags: tags(params, tag_namespace),
    }
}

/// Collate a human-readable input text.
///
/// Message list: an optional `[SYSTEM] ...` line, then `[ROLE] content` per
/// message. Prompt string: `[SYSTEM] ...` (when present), `[PROMPT]`, the
/// prompt. Otherwise the provider's raw request echo.
pub fn input_text(params: FieldBag<'_>, request_echo: FieldBag<'_>) -> Option<String> {
    let system = params.get("system").value().map(render_content);

    if let Some(messages) = message_list(params) {
        let mut lines = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = system {
            lines.push(format!("[SYSTEM] {}", system));
        }
        for message in messages.iter().map(FieldBag::new) {
            let role = message
                .get("role")
                .as_str()
                .unwrap_or("unknown")
                .to_uppercase();
            let content = message
                .get("content")
                .value()
                .map(render_content)
                .unwrap_or_default();
            lines.push(format!("[{}] {}", role, content));
        }
        return Some(lines.join("\n"));
    }

    if let Some(prompt) = params.get("prompt").as_str() {
        return Some(match system {
            Some(system) => format!("[SYSTEM] {}\n[PROMPT]\n{}", system, prompt),
            None => format!("[PROMPT]\n{}", prompt),
        });
    }

    request_echo.value().map(render_content)
}

/// The structured prompt: the message list or the prompt string
pub fn prompt_json(params: FieldBag<'_>) -> Option<Value> {
    if let Some(messages) = message_list(params) {
        return Some(Value::Array(messages.clone()));
    }
    params.get("prompt").value().filter(|v| v.is_string()).cloned()
}

/// Tools declared on the request
pub fn declared_tools(params: FieldBag<'_>) -> Option<Value> {
    params.get("tools").value().cloned()
}

pub fn sampling(params: FieldBag<'_>) -> SamplingParams {
    SamplingParams {
        temperature: params.get("temperature").as_f64(),
        top_p: params.first_f64(&["topP", "top_p"]),
        max_output_tokens: params.first_u64(&[
            "maxOutputTokens",
            "maxTokens",
            "max_tokens",
            "max_output_tokens",
        ]),
    }
}

/// Whether parallel tool execution was requested, top-level or per provider
pub fn parallel_tool_calls(params: FieldBag<'_>) -> Option<bool> {
    params
        .first_bool(&["parallelToolCalls", "parallel_tool_calls"])
        .or_else(|| {
            params
                .get("providerOptions")
                .entries()
                .find_map(|(_, options)| {
                    options.first_bool(&["parallelToolCalls", "parallel_tool_calls"])
                })
        })
}

/// Caller-supplied tags under `providerOptions.<namespace>.tags`.
///
/// A single string becomes a one-element list. Absent tags stay `None`, so an
/// explicit empty list remains distinguishable.
pub fn tags(params: FieldBag<'_>, namespace: &str) -> Option<Vec<String>> {
    let tags = params.get("providerOptions").get(namespace).get("tags");
    match tags.value()? {
        Value::String(tag) => Some(vec![tag.clone()]),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    Value::Bool(b) => Some(b.to_string()),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

/// Output text: `text`, else the text segments of `content`, else the raw body
pub fn output_text(response: FieldBag<'_>) -> Option<String> {
    if let Some(text) = response.get("text").as_str() {
        return Some(text.to_string());
    }

    segments_text(response.get("content"), "text")
        .or_else(|| {
            response
                .path("response.body.choices.0.message.content")
                .as_str()
                .map(str::to_string)
        })
        .or_else(|| segments_text(response.path("response.body.content"), "text"))
}

/// Structured content segments
pub fn content_segments(response: FieldBag<'_>) -> Option<Value> {
    response
        .get("content")
        .as_array()
        .map(|segments| Value::Array(segments.clone()))
}

/// Reasoning text and reasoning segments
pub fn reasoning(response: FieldBag<'_>) -> (Option<String>, Option<Value>) {
    let segments: Vec<Value> = response
        .get("content")
        .items()
        .filter(|segment| segment.get("type").as_str() == Some("reasoning"))
        .filter_map(|segment| segment.value().cloned())
        .chain(response.get("reasoning").items().filter_map(|s| s.value().cloned()))
        .collect();

    let text = response
        .first_str(&["reasoningText", "reasoning"])
        .map(str::to_string)
        .or_else(|| {
            let joined: String = segments
                .iter()
                .filter_map(|s| FieldBag::new(s).get("text").as_str())
                .collect();
            (!segments.is_empty()).then_some(joined)
        });

    let json = (!segments.is_empty()).then(|| Value::Array(segments));
    (text, json)
}

/// Tool calls from content segments, `toolCalls`, or a provider body
pub fn tool_calls(response: FieldBag<'_>) -> Vec<ToolCallRecord> {
    let from_segments: Vec<ToolCallRecord> = response
        .get("content")
        .items()
        .filter(|segment| segment.get("type").as_str() == Some("tool-call"))
        .map(sdk_tool_call)
        .collect();
    if !from_segments.is_empty() {
        return from_segments;
    }

    let from_list: Vec<ToolCallRecord> = response.get("toolCalls").items().map(sdk_tool_call).collect();
    if !from_list.is_empty() {
        return from_list;
    }

    let from_openai: Vec<ToolCallRecord> = response
        .path("response.body.choices.0.message.tool_calls")
        .items()
        .map(|call| ToolCallRecord {
            tool_call_id: call.get("id").as_str().map(str::to_string),
            tool_name: call.path("function.name").as_str().map(str::to_string),
            input: tool_input(call.path("function.arguments")),
        })
        .collect();
    if !from_openai.is_empty() {
        return from_openai;
    }

    response
        .path("response.body.content")
        .items()
        .filter(|block| block.get("type").as_str() == Some("tool_use"))
        .map(|block| ToolCallRecord {
            tool_call_id: block.get("id").as_str().map(str::to_string),
            tool_name: block.get("name").as_str().map(str::to_string),
            input: tool_input(block.get("input")),
        })
        .collect()
}

/// Names of the tools called, in call order
pub fn tool_names(calls: &[ToolCallRecord]) -> Option<Vec<String>> {
    let names: Vec<String> = calls.iter().filter_map(|c| c.tool_name.clone()).collect();
    (!names.is_empty()).then_some(names)
}

/// Parse tool input text as JSON; text that does not parse is kept verbatim
pub fn parse_tool_input(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub fn finish_reason(response: FieldBag<'_>) -> Option<String> {
    response
        .first_str(&[
            "finishReason",
            "finish_reason",
            "finishReason.unified",
            "response.body.choices.0.finish_reason",
            "response.body.stop_reason",
        ])
        .map(str::to_string)
}

/// Provider-assigned response identifier
pub fn response_id(response: FieldBag<'_>) -> Option<String> {
    response
        .first_str(&["response.id", "response.body.id"])
        .map(str::to_string)
}

/// Provider-assigned request identifier, from headers or provider metadata
pub fn request_id(response: FieldBag<'_>) -> Option<String> {
    let headers = response.path("response.headers");
    REQUEST_ID_HEADERS
        .iter()
        .find_map(|name| headers.get_ignore_case(name).as_str())
        .or_else(|| {
            response
                .get("providerMetadata")
                .entries()
                .find_map(|(_, meta)| meta.get("requestId").as_str())
        })
        .map(str::to_string)
}

/// Model that actually served the call, when the provider reports it
pub fn reported_model_id(response: FieldBag<'_>) -> Option<String> {
    response
        .first_str(&["response.modelId", "response.body.model"])
        .map(str::to_string)
}

pub fn response_headers(response: FieldBag<'_>) -> Option<Value> {
    response.path("response.headers").value().cloned()
}

pub fn response_body(response: FieldBag<'_>) -> Option<Value> {
    response.path("response.body").value().cloned()
}

pub fn warnings(response: FieldBag<'_>) -> Option<Value> {
    response
        .get("warnings")
        .as_array()
        .filter(|w| !w.is_empty())
        .map(|w| Value::Array(w.clone()))
}

/// Vendor-specific usage object carried in the raw body or provider metadata
pub fn raw_usage(response: FieldBag<'_>) -> FieldBag<'_> {
    let from_body = response.path("response.body.usage");
    if from_body.is_present() {
        return from_body;
    }
    response
        .get("providerMetadata")
        .entries()
        .map(|(_, meta)| meta.get("usage"))
        .find(|usage| usage.is_present())
        .unwrap_or_default()
}

fn message_list(params: FieldBag<'_>) -> Option<&Vec<Value>> {
    params.first_array(&["prompt", "messages"])
}

fn sdk_tool_call(call: FieldBag<'_>) -> ToolCallRecord {
    ToolCallRecord {
        tool_call_id: call.first_str(&["toolCallId", "id"]).map(str::to_string),
        tool_name: call.first_str(&["toolName", "name"]).map(str::to_string),
        input: tool_input(call.first_of(&["input", "args"])),
    }
}

fn tool_input(input: FieldBag<'_>) -> Value {
    match input.value() {
        Some(Value::String(raw)) => parse_tool_input(raw),
        Some(other) => other.clone(),
        None => Value::Null,
    }
}

/// Concatenate the `text` of segments whose `type` matches
fn segments_text(segments: FieldBag<'_>, kind: &str) -> Option<String> {
    let texts: Vec<&str> = segments
        .items()
        .filter(|segment| segment.get("type").as_str() == Some(kind))
        .filter_map(|segment| segment.get("text").as_str())
        .collect();
    (!texts.is_empty()).then(|| texts.concat())
}

/// Strings as-is, anything else JSON-rendered
fn render_content(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_else(|_| other.to_string()),
    }
}
