use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::tokens::{is_o_series, normalize_model};
use crate::types::Settings;

/// Context window used when no family rule matches.
pub const DEFAULT_CONTEXT_WINDOW: u64 = 128_000;

/// Shortname → OpenRouter model ID
pub static MODEL_ALIASES: Lazy<HashMap<&str, &str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("sonnet", "anthropic/claude-3.5-sonnet");
    m.insert("haiku", "anthropic/claude-3.5-haiku");
    m.insert("opus", "anthropic/claude-3-opus");
    m.insert("4o", "openai/gpt-4o");
    m.insert("4o-mini", "openai/gpt-4o-mini");
    m.insert("gemini", "google/gemini-2.0-flash-001");
    m.insert("llama", "meta-llama/llama-3.1-70b-instruct");
    m.insert("deepseek", "deepseek/deepseek-chat");
    m
});

/// Family label used in [`CONTEXT_WINDOWS`] for the o-series, which is
/// matched by prefix rather than substring.
pub const O_SERIES_FAMILY: &str = "o-series";

/// Family substring → context window, checked in order. More specific
/// families come before the ones they contain.
pub const CONTEXT_WINDOWS: &[(&str, u64)] = &[
    ("claude", 200_000),
    ("gemini", 1_000_000),
    ("gpt-4o", 128_000),
    ("gpt-4.1", 128_000),
    (O_SERIES_FAMILY, 128_000),
    ("gpt-4", 128_000),
    ("gpt-3.5", 16_385),
    ("llama", 128_000),
    ("mixtral", 32_768),
    ("mistral", 32_768),
    ("deepseek", 128_000),
    ("qwen", 131_072),
];

fn matches_family(normalized: &str, family: &str) -> bool {
    if family == O_SERIES_FAMILY {
        is_o_series(normalized)
    } else {
        normalized.contains(family)
    }
}

/// Family rules in match order, for listings.
pub fn known_families() -> &'static [(&'static str, u64)] {
    CONTEXT_WINDOWS
}

/// Resolve a shortname to its full model ID.
/// Falls back to the raw model string if no mapping found.
pub fn resolve_model_alias(model: &str) -> String {
    MODEL_ALIASES
        .get(model)
        .map(|s| s.to_string())
        .unwrap_or_else(|| model.to_string())
}

/// Context window for a model ID from the family table.
pub fn context_window_for(model: &str) -> u64 {
    let normalized = normalize_model(model);
    CONTEXT_WINDOWS
        .iter()
        .find(|(family, _)| matches_family(&normalized, family))
        .map(|(_, window)| *window)
        .unwrap_or(DEFAULT_CONTEXT_WINDOW)
}

/// Context window honoring `model.context_windows` overrides in settings.
pub fn resolve_context_window(model: &str, settings: &Settings) -> u64 {
    settings
        .model
        .as_ref()
        .and_then(|m| m.context_windows.as_ref())
        .and_then(|overrides| overrides.get(model).copied())
        .unwrap_or_else(|| context_window_for(model))
}
