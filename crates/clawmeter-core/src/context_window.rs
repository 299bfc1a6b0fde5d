//! Context window accounting.
//!
//! [`ContextAccountant`] turns the four input groups of a model call (system
//! prompt, memory blocks, tool schemas, conversation) into a
//! [`TokenUsageReport`] and decides whether history should be summarized.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::ConfigurationError;
use crate::tokens::TokenCounter;
use crate::types::{ChatMessage, MemoryBlock};

/// Fraction of the window at which summarization triggers.
pub const DEFAULT_SUMMARIZATION_THRESHOLD: f64 = 0.80;

/// Formatting tokens charged per memory block on top of label + content.
pub const DEFAULT_MEMORY_BLOCK_OVERHEAD: u64 = 4;

/// Token usage of one model call against its context window.
///
/// Only the per-group counts, the window and the threshold are stored; totals
/// and percentages are derived on every access.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenUsageReport {
    system_tokens: u64,
    memory_blocks_tokens: u64,
    tool_schema_tokens: u64,
    conversation_tokens: u64,
    max_tokens: u64,
    threshold: f64,
}

impl TokenUsageReport {
    pub fn system_tokens(&self) -> u64 {
        self.system_tokens
    }

    pub fn memory_blocks_tokens(&self) -> u64 {
        self.memory_blocks_tokens
    }

    pub fn tool_schema_tokens(&self) -> u64 {
        self.tool_schema_tokens
    }

    pub fn conversation_tokens(&self) -> u64 {
        self.conversation_tokens
    }

    pub fn max_tokens(&self) -> u64 {
        self.max_tokens
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn total_tokens(&self) -> u64 {
        self.system_tokens
            + self.memory_blocks_tokens
            + self.tool_schema_tokens
            + self.conversation_tokens
    }

    pub fn percentage_used(&self) -> f64 {
        self.total_tokens() as f64 / self.max_tokens as f64 * 100.0
    }

    /// Negative once the window is overrun.
    pub fn tokens_remaining(&self) -> i64 {
        self.max_tokens as i64 - self.total_tokens() as i64
    }

    pub fn needs_summarization(&self) -> bool {
        self.total_tokens() as f64 / self.max_tokens as f64 >= self.threshold
    }
}

impl Serialize for TokenUsageReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("TokenUsageReport", 10)?;
        s.serialize_field("system_tokens", &self.system_tokens)?;
        s.serialize_field("memory_blocks_tokens", &self.memory_blocks_tokens)?;
        s.serialize_field("tool_schema_tokens", &self.tool_schema_tokens)?;
        s.serialize_field("conversation_tokens", &self.conversation_tokens)?;
        s.serialize_field("total_tokens", &self.total_tokens())?;
        s.serialize_field("max_tokens", &self.max_tokens)?;
        s.serialize_field("percentage_used", &self.percentage_used())?;
        s.serialize_field("tokens_remaining", &self.tokens_remaining())?;
        s.serialize_field("summarization_threshold", &self.threshold)?;
        s.serialize_field("needs_summarization", &self.needs_summarization())?;
        s.end()
    }
}

/// Computes usage reports. Holds no per-call state and is safe to share.
#[derive(Debug, Clone)]
pub struct ContextAccountant {
    counter: TokenCounter,
    summarization_threshold: f64,
    memory_block_overhead: u64,
}

impl ContextAccountant {
    pub fn new(counter: TokenCounter) -> Self {
        Self {
            counter,
            summarization_threshold: DEFAULT_SUMMARIZATION_THRESHOLD,
            memory_block_overhead: DEFAULT_MEMORY_BLOCK_OVERHEAD,
        }
    }

    /// Threshold must lie in (0, 1].
    pub fn with_threshold(mut self, threshold: f64) -> Result<Self, ConfigurationError> {
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigurationError::ThresholdOutOfRange(threshold));
        }
        self.summarization_threshold = threshold;
        Ok(self)
    }

    pub fn with_memory_block_overhead(mut self, overhead: u64) -> Self {
        self.memory_block_overhead = overhead;
        self
    }

    pub fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    pub fn summarization_threshold(&self) -> f64 {
        self.summarization_threshold
    }

    pub fn memory_block_overhead(&self) -> u64 {
        self.memory_block_overhead
    }

    pub fn count_memory_blocks(&self, blocks: &[MemoryBlock]) -> u64 {
        blocks
            .iter()
            .map(|block| {
                self.counter.count_text(&block.label)
                    + self.counter.count_text(&block.content)
                    + self.memory_block_overhead
            })
            .sum()
    }

    /// Schemas are counted as their compact JSON encoding. No schemas, no tokens.
    pub fn count_tool_schemas(&self, schemas: &[Value]) -> u64 {
        if schemas.is_empty() {
            return 0;
        }
        self.counter.count_text(&canonical_tool_text(schemas))
    }

    pub fn calculate_usage(
        &self,
        system_prompt: &str,
        memory_blocks: &[MemoryBlock],
        tool_schemas: &[Value],
        conversation: &[ChatMessage],
        max_tokens: i64,
    ) -> Result<TokenUsageReport, ConfigurationError> {
        if max_tokens <= 0 {
            return Err(ConfigurationError::NonPositiveMaxTokens(max_tokens));
        }

        Ok(TokenUsageReport {
            system_tokens: self.counter.count_text(system_prompt),
            memory_blocks_tokens: self.count_memory_blocks(memory_blocks),
            tool_schema_tokens: self.count_tool_schemas(tool_schemas),
            conversation_tokens: self.counter.count_messages(conversation),
            max_tokens: max_tokens as u64,
            threshold: self.summarization_threshold,
        })
    }
}

/// Compact, key-sorted JSON for a list of tool schemas. Parses back to the
/// same values.
pub fn canonical_tool_text(schemas: &[Value]) -> String {
    Value::Array(schemas.to_vec()).to_string()
}

/// Human-readable summary, e.g. `21.77k of 131.07k tokens (83% left)`.
pub fn format_usage(report: &TokenUsageReport) -> String {
    let left = (100.0 - report.percentage_used()).floor().max(0.0);
    format!(
        "{} of {} tokens ({}% left)",
        format_token_count(report.total_tokens()),
        format_token_count(report.max_tokens()),
        left as u64
    )
}

/// Counts from 1000 up render as thousands with two decimals and a `k`.
pub fn format_token_count(count: u64) -> String {
    if count >= 1000 {
        format!("{:.2}k", count as f64 / 1000.0)
    } else {
        count.to_string()
    }
}
