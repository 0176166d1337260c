//! Plain-text rendering of stored calls

use llmtap_capture::{CallAggregates, CallSummary, JsonColumn, SearchResults, StoredCall};
use std::fmt::Write;

const PREVIEW_CHARS: usize = 2000;

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

pub fn call_list(results: &SearchResults<CallSummary>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<36}  {:<25}  {:<28}  {:<14}  {:>8}  {:>9}",
        "ID", "TIMESTAMP", "MODEL", "FINISH", "TOKENS", "LATENCY"
    );

    for call in &results.items {
        let _ = writeln!(
            out,
            "{:<36}  {:<25}  {:<28}  {:<14}  {:>8}  {:>7}ms",
            call.id,
            call.timestamp,
            call.model_id,
            or_dash(call.finish_reason.as_deref()),
            or_dash(call.total_tokens),
            or_dash(call.latency_ms),
        );
    }

    let _ = write!(
        out,
        "page {}/{} ({} calls)",
        results.page + 1,
        results.total_pages,
        results.total_count
    );
    out
}

fn json_block(out: &mut String, label: &str, column: &Option<JsonColumn>) {
    let Some(column) = column else {
        return;
    };
    let rendered = match column {
        JsonColumn::Parsed(value) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        JsonColumn::Raw(text) => text.clone(),
    };
    let _ = writeln!(out, "\n{}:\n{}", label, rendered);
}

fn text_block(out: &mut String, label: &str, text: &Option<String>) {
    let Some(text) = text else {
        return;
    };
    let preview: String = text.chars().take(PREVIEW_CHARS).collect();
    let _ = writeln!(out, "\n{}:\n{}", label, preview);
    if preview.len() < text.len() {
        let _ = writeln!(out, "... ({} characters total)", text.chars().count());
    }
}

pub fn call_detail(call: &StoredCall) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "id:            {}", call.id);
    let _ = writeln!(out, "timestamp:     {}", call.timestamp);
    let _ = writeln!(out, "model:         {}", call.model_id);
    let _ = writeln!(out, "finish reason: {}", or_dash(call.finish_reason.as_deref()));
    let _ = writeln!(out, "latency:       {}ms", or_dash(call.latency_ms));
    let _ = writeln!(
        out,
        "tokens:        in {} / out {} / total {}",
        or_dash(call.input_tokens),
        or_dash(call.output_tokens),
        or_dash(call.total_tokens)
    );
    if call.cached_input_tokens.is_some() || call.reasoning_tokens.is_some() {
        let _ = writeln!(
            out,
            "               cached {} / reasoning {}",
            or_dash(call.cached_input_tokens),
            or_dash(call.reasoning_tokens)
        );
    }
    if let Some(count) = call.tool_count {
        let _ = writeln!(out, "tool calls:    {}", count);
    }
    if let Some(request_id) = &call.request_id {
        let _ = writeln!(out, "request id:    {}", request_id);
    }
    if let Some(response_id) = &call.response_id {
        let _ = writeln!(out, "response id:   {}", response_id);
    }

    json_block(&mut out, "tags", &call.tags);
    text_block(&mut out, "input", &call.input_text);
    text_block(&mut out, "reasoning", &call.reasoning_text);
    text_block(&mut out, "output", &call.output_text);
    json_block(&mut out, "tool calls", &call.response_tools_json);
    json_block(&mut out, "error", &call.error_json);
    out
}

pub fn aggregates(stats: &CallAggregates) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "calls:          {}", stats.total_calls);
    let _ = writeln!(out, "errors:         {}", stats.error_calls);
    let _ = writeln!(out, "input tokens:   {}", stats.total_input_tokens);
    let _ = writeln!(out, "output tokens:  {}", stats.total_output_tokens);
    let _ = writeln!(out, "total tokens:   {}", stats.total_tokens);
    let _ = writeln!(out, "avg latency:    {:.1}ms", stats.avg_latency_ms);

    let mut models: Vec<_> = stats.calls_by_model.iter().collect();
    models.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    if !models.is_empty() {
        let _ = writeln!(out, "\nby model:");
        for (model, calls) in models {
            let _ = writeln!(out, "  {:<32} {}", model, calls);
        }
    }
    out
}
