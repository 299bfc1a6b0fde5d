use thiserror::Error;

/// Invalid construction or call parameters. Raised before any state is touched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("max_tokens must be positive, got {0}")]
    NonPositiveMaxTokens(i64),

    #[error("summarization threshold must be in (0, 1], got {0}")]
    ThresholdOutOfRange(f64),

    #[error("rate limit max_requests must be positive")]
    ZeroMaxRequests,

    #[error("rate limit window_seconds must be positive")]
    ZeroWindow,
}
