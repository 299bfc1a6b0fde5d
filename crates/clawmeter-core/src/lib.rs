//! Context-window accounting core for Clawmeter.
//!
//! - [`tokens`]: model-aware token counting with a length-estimate fallback
//! - [`context_window`]: usage reports and the summarization trigger
//! - [`rate_limit`]: per-session sliding window admission control
//! - [`gate`]: the two combined in front of a chat pipeline

pub mod compaction;
pub mod config;
pub mod context_window;
pub mod error;
pub mod gate;
pub mod models;
pub mod rate_limit;
pub mod tokens;
pub mod types;

pub use context_window::{format_usage, ContextAccountant, TokenUsageReport};
pub use error::ConfigurationError;
pub use gate::{ChatGate, GateDecision};
pub use rate_limit::SessionRateLimiter;
pub use tokens::TokenCounter;
