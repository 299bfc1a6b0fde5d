//! Token counting for prompts and chat histories.
//!
//! Counts use the model family's BPE encoding via tiktoken-rs. When an encoding
//! can't be loaded the counter estimates from text length instead; counting
//! never fails.

use once_cell::sync::Lazy;
use tiktoken_rs::CoreBPE;
use tracing::warn;

use crate::types::{ChatMessage, ContentPart, MessageContent, Role};

/// Framing tokens every message costs (`<|start|>{role}\n ... <|end|>`).
pub const TOKENS_PER_MESSAGE: u64 = 3;

/// Extra framing for system messages.
pub const SYSTEM_ROLE_TOKENS: u64 = 1;

/// Cost of a `name` field on a message.
pub const TOKENS_PER_NAME: u64 = 1;

/// Added once per message list for the primed assistant reply.
pub const REPLY_PRIMING_TOKENS: u64 = 3;

/// Flat charge per image/audio part (low-detail image cost).
pub const MEDIA_PART_TOKENS: u64 = 85;

/// Approximate characters per token for the fallback estimator.
pub const CHARS_PER_TOKEN: usize = 4;

/// BPE encodings the counter knows how to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Cl100kBase,
    O200kBase,
}

impl Encoding {
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Cl100kBase => "cl100k_base",
            Encoding::O200kBase => "o200k_base",
        }
    }

    fn bpe(&self) -> Option<&'static CoreBPE> {
        match self {
            Encoding::Cl100kBase => CL100K_BASE.as_ref(),
            Encoding::O200kBase => O200K_BASE.as_ref(),
        }
    }
}

static CL100K_BASE: Lazy<Option<CoreBPE>> =
    Lazy::new(|| load_encoding(Encoding::Cl100kBase, tiktoken_rs::cl100k_base()));

static O200K_BASE: Lazy<Option<CoreBPE>> =
    Lazy::new(|| load_encoding(Encoding::O200kBase, tiktoken_rs::o200k_base()));

fn load_encoding<E: std::fmt::Display>(
    encoding: Encoding,
    loaded: Result<CoreBPE, E>,
) -> Option<CoreBPE> {
    match loaded {
        Ok(bpe) => Some(bpe),
        Err(e) => {
            warn!(
                encoding = encoding.name(),
                error = %e,
                "tokenizer unavailable, falling back to length estimate"
            );
            None
        }
    }
}

type ModelPredicate = fn(&str) -> bool;

/// Checked in order against the normalized model name; first match wins.
const ENCODING_RULES: &[(ModelPredicate, Encoding)] = &[
    (is_o200k_family as ModelPredicate, Encoding::O200kBase),
    (is_gpt_family as ModelPredicate, Encoding::Cl100kBase),
];

/// Used for every model no rule matches.
pub const DEFAULT_ENCODING: Encoding = Encoding::Cl100kBase;

/// Lowercase and drop any router prefix ("openai/gpt-4o" -> "gpt-4o").
pub fn normalize_model(model: &str) -> String {
    let lower = model.trim().to_lowercase();
    match lower.rsplit_once('/') {
        Some((_, name)) => name.to_string(),
        None => lower,
    }
}

/// Reasoning model prefixes ("o1", "o3-mini", "o4-mini").
pub const O_SERIES_PREFIXES: &[&str] = &["o1", "o3", "o4"];

/// True for a normalized model name in the o-series.
pub fn is_o_series(model: &str) -> bool {
    O_SERIES_PREFIXES.iter().any(|p| model.starts_with(p))
}

fn is_o200k_family(model: &str) -> bool {
    model.contains("gpt-4o")
        || model.contains("gpt-4.1")
        || model.contains("gpt-5")
        || is_o_series(model)
}

fn is_gpt_family(model: &str) -> bool {
    model.contains("gpt")
}

/// Resolve the encoding for a model ID. Unknown models get [`DEFAULT_ENCODING`].
pub fn resolve_encoding(model: &str) -> Encoding {
    let normalized = normalize_model(model);
    ENCODING_RULES
        .iter()
        .find(|(matches, _)| matches(&normalized))
        .map(|(_, encoding)| *encoding)
        .unwrap_or(DEFAULT_ENCODING)
}

/// Length-based estimate used when no tokenizer is available.
/// Non-empty text is always at least one token.
pub fn estimate_tokens(text: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }
    (text.len() / CHARS_PER_TOKEN).max(1) as u64
}

/// Model-aware token counter. Cheap to clone; tokenizer tables are shared
/// process-wide.
#[derive(Clone)]
pub struct TokenCounter {
    model: String,
    encoding: Encoding,
    bpe: Option<&'static CoreBPE>,
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("model", &self.model)
            .field("encoding", &self.encoding)
            .field("exact", &self.is_exact())
            .finish()
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self {
            model: String::new(),
            encoding: DEFAULT_ENCODING,
            bpe: DEFAULT_ENCODING.bpe(),
        }
    }
}

impl TokenCounter {
    pub fn for_model(model: &str) -> Self {
        let encoding = resolve_encoding(model);
        Self {
            model: model.to_string(),
            encoding,
            bpe: encoding.bpe(),
        }
    }

    /// A counter that always uses the length estimate, as if the model's
    /// tokenizer had failed to load.
    pub fn estimating(model: &str) -> Self {
        Self {
            bpe: None,
            ..Self::for_model(model)
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// False when counts come from the length estimator.
    pub fn is_exact(&self) -> bool {
        self.bpe.is_some()
    }

    pub fn count_text(&self, text: &str) -> u64 {
        if text.is_empty() {
            return 0;
        }
        match self.bpe {
            Some(bpe) => bpe.encode_with_special_tokens(text).len() as u64,
            None => estimate_tokens(text),
        }
    }

    /// Text parts are tokenized, media parts cost [`MEDIA_PART_TOKENS`], and
    /// unrecognized parts cost nothing.
    pub fn count_content(&self, content: Option<&MessageContent>) -> u64 {
        match content {
            None => 0,
            Some(MessageContent::Text(text)) => self.count_text(text),
            Some(MessageContent::Parts(parts)) => parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => self.count_text(text),
                    part if part.is_media() => MEDIA_PART_TOKENS,
                    _ => 0,
                })
                .sum(),
        }
    }

    /// Tokens for one message including its framing, excluding the list-level
    /// reply priming.
    pub fn count_message(&self, message: &ChatMessage) -> u64 {
        let mut tokens = TOKENS_PER_MESSAGE + self.count_content(message.content.as_ref());
        if message.role == Role::System {
            tokens += SYSTEM_ROLE_TOKENS;
        }
        if message.name.is_some() {
            tokens += TOKENS_PER_NAME;
        }
        tokens
    }

    /// Tokens for a whole message list. An empty list costs nothing.
    pub fn count_messages(&self, messages: &[ChatMessage]) -> u64 {
        if messages.is_empty() {
            return 0;
        }
        let body: u64 = messages.iter().map(|m| self.count_message(m)).sum();
        body + REPLY_PRIMING_TOKENS
    }
}
