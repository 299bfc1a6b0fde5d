//! Admission pipeline for chat requests: rate limit first, then context
//! accounting.

use tracing::{debug, info};

use crate::context_window::{ContextAccountant, TokenUsageReport};
use crate::error::ConfigurationError;
use crate::rate_limit::SessionRateLimiter;
use crate::types::ContextRequest;

/// Outcome of [`ChatGate::admit`].
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Request may proceed; the caller summarizes first if the report says so.
    Admitted(TokenUsageReport),
    RateLimited { reason: String },
}

impl GateDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, GateDecision::Admitted(_))
    }
}

/// Owned by the chat orchestrator and shared by reference across request
/// handlers.
#[derive(Debug)]
pub struct ChatGate {
    limiter: SessionRateLimiter,
    accountant: ContextAccountant,
}

impl ChatGate {
    pub fn new(limiter: SessionRateLimiter, accountant: ContextAccountant) -> Self {
        Self {
            limiter,
            accountant,
        }
    }

    pub fn limiter(&self) -> &SessionRateLimiter {
        &self.limiter
    }

    pub fn accountant(&self) -> &ContextAccountant {
        &self.accountant
    }

    /// A bad `max_tokens` is reported before the limiter records anything.
    pub fn admit(
        &self,
        session_id: &str,
        request: &ContextRequest,
        max_tokens: i64,
    ) -> Result<GateDecision, ConfigurationError> {
        if max_tokens <= 0 {
            return Err(ConfigurationError::NonPositiveMaxTokens(max_tokens));
        }

        let (allowed, reason) = self.limiter.is_allowed(session_id);
        if !allowed {
            info!(session_id, %reason, "request rejected");
            return Ok(GateDecision::RateLimited { reason });
        }

        let report = self.accountant.calculate_usage(
            &request.system_prompt,
            &request.memory_blocks,
            &request.tools,
            &request.messages,
            max_tokens,
        )?;
        debug!(
            session_id,
            total_tokens = report.total_tokens(),
            max_tokens = report.max_tokens(),
            needs_summarization = report.needs_summarization(),
            "request admitted"
        );
        Ok(GateDecision::Admitted(report))
    }

    pub fn reset(&self, session_id: &str) {
        self.limiter.reset(session_id);
    }
}
