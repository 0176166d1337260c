//! Usage normalization
//!
//! Resolves one canonical token-usage tuple from the vendor-normalized usage
//! object and the vendor-specific raw body usage. Per field, the first hit wins:
//!
//! | field | normalized | raw body | derived |
//! |---|---|---|---|
//! | input | `inputTokens`, `inputTokens.total`, `promptTokens` | `input_tokens`, `prompt_tokens` | |
//! | output | `outputTokens`, `outputTokens.total`, `completionTokens` | `output_tokens`, `completion_tokens` | |
//! | total | `totalTokens` | `total_tokens` | input + output, only when both exist |
//! | cached input | `cachedInputTokens`, `inputTokens.cacheRead` | `cache_read_input_tokens`, `prompt_tokens_details.cached_tokens`, `input_tokens_details.cached_tokens` | |
//! | reasoning | `reasoningTokens` | `reasoning_tokens`, `completion_tokens_details.reasoning_tokens` | |
//! | output reasoning | `outputTokens.reasoning`, `outputReasoningTokens` | `output_tokens_details.reasoning_tokens` | |
//!
//! A count that is absent everywhere stays absent; nothing is coerced to zero.

use llmtap_core::{FieldBag, TokenUsage};

const INPUT: Candidates = Candidates {
    normalized: &["inputTokens", "inputTokens.total", "promptTokens"],
    raw: &["input_tokens", "prompt_tokens"],
};

const OUTPUT: Candidates = Candidates {
    normalized: &["outputTokens", "outputTokens.total", "completionTokens"],
    raw: &["output_tokens", "completion_tokens"],
};

const TOTAL: Candidates = Candidates {
    normalized: &["totalTokens"],
    raw: &["total_tokens"],
};

const CACHED_INPUT: Candidates = Candidates {
    normalized: &["cachedInputTokens", "inputTokens.cacheRead"],
    raw: &[
        "cache_read_input_tokens",
        "prompt_tokens_details.cached_tokens",
        "input_tokens_details.cached_tokens",
    ],
};

const REASONING: Candidates = Candidates {
    normalized: &["reasoningTokens"],
    raw: &["reasoning_tokens", "completion_tokens_details.reasoning_tokens"],
};

const OUTPUT_REASONING: Candidates = Candidates {
    normalized: &["outputTokens.reasoning", "outputReasoningTokens"],
    raw: &["output_tokens_details.reasoning_tokens"],
};

struct Candidates {
    normalized: &'static [&'static str],
    raw: &'static [&'static str],
}

impl Candidates {
    fn resolve(&self, normalized: FieldBag<'_>, raw: FieldBag<'_>) -> Option<u64> {
        normalized
            .first_u64(self.normalized)
            .or_else(|| raw.first_u64(self.raw))
    }
}

/// Normalize usage from both sources
pub fn normalize_usage(normalized: FieldBag<'_>, raw: FieldBag<'_>) -> TokenUsage {
    let input_tokens = INPUT.resolve(normalized, raw);
    let output_tokens = OUTPUT.resolve(normalized, raw);
    let total_tokens = TOTAL.resolve(normalized, raw).or(match (input_tokens, output_tokens) {
        (Some(input), Some(output)) => Some(input.saturating_add(output)),
        _ => None,
    });

    TokenUsage {
        input_tokens,
        output_tokens,
        total_tokens,
        cached_input_tokens: CACHED_INPUT.resolve(normalized, raw),
        reasoning_tokens: REASONING.resolve(normalized, raw),
        output_reasoning_tokens: OUTPUT_REASONING.resolve(normalized, raw),
    }
}
