//! Retry ceiling, backoff, and outcome classification.
//!
//! The ceiling counts network attempts per user turn and applies equally
//! to rate limiting and transport failures: after the k-th attempt fails
//! with a retryable outcome, the cycle retries iff `k < ceiling`.

use std::time::Duration;

use docai_core::config::RetryConfig;

use crate::client::ApiReply;
use crate::error::ChatError;
use crate::types::QueryResponse;

/// HTTP status the backend uses to signal rate limiting.
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// How many times to call and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    ceiling: u32,
    backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// A ceiling of zero is raised to one so every turn makes at least one call.
    pub fn new(ceiling: u32, backoff_unit: Duration) -> Self {
        Self {
            ceiling: ceiling.max(1),
            backoff_unit,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.retry_ceiling,
            Duration::from_millis(config.backoff_unit_ms),
        )
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn backoff_unit(&self) -> Duration {
        self.backoff_unit
    }

    /// Wait after the `attempt`-th failed call (1-based): `backoff_unit * attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_unit
            .checked_mul(attempt.max(1))
            .unwrap_or(Duration::MAX)
    }

    /// Decide what follows the most recent attempt.
    pub fn decide(&self, state: &AttemptState) -> Decision {
        match state.last() {
            Some(outcome) if outcome.is_retryable() && state.attempts() < self.ceiling => {
                Decision::Retry {
                    delay: self.delay_for(state.attempts()),
                }
            }
            _ => Decision::Resolve,
        }
    }
}

/// Classified result of one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(QueryResponse),
    RateLimited,
    ServerError { status: u16 },
    Transport(String),
}

impl Outcome {
    /// Classify the raw result of a call.
    pub fn classify(result: Result<ApiReply, ChatError>) -> Self {
        match result {
            Ok(ApiReply::Success(response)) => Outcome::Success(response),
            Ok(ApiReply::Failure { status }) if status == STATUS_TOO_MANY_REQUESTS => {
                Outcome::RateLimited
            }
            Ok(ApiReply::Failure { status }) => Outcome::ServerError { status },
            Err(ChatError::Transport(desc)) => Outcome::Transport(desc),
            Err(other) => Outcome::Transport(other.to_string()),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Outcome::RateLimited | Outcome::Transport(_))
    }

    /// Short label for structured logs.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::RateLimited => "rate_limited",
            Outcome::ServerError { .. } => "server_error",
            Outcome::Transport(_) => "transport",
        }
    }
}

/// What the orchestrator does next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Retry { delay: Duration },
    Resolve,
}

/// Per-cycle bookkeeping, discarded when the cycle ends.
#[derive(Debug, Clone, Default)]
pub struct AttemptState {
    attempts: u32,
    succeeded: bool,
    last: Option<Outcome>,
}

impl AttemptState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed calls so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn last(&self) -> Option<&Outcome> {
        self.last.as_ref()
    }

    /// Record the outcome of one completed call.
    pub fn record(&mut self, outcome: Outcome) {
        self.attempts += 1;
        self.succeeded = matches!(outcome, Outcome::Success(_));
        self.last = Some(outcome);
    }

    /// Final result of a resolved cycle.
    ///
    /// A retryable outcome here means the ceiling was reached. A cycle
    /// with no recorded outcome maps to an `InvariantViolation`, which
    /// users see as "Unknown error occurred".
    pub fn into_result(self) -> Result<QueryResponse, ChatError> {
        let attempts = self.attempts;
        match self.last {
            Some(Outcome::Success(response)) => Ok(response),
            Some(Outcome::ServerError { status }) => Err(ChatError::Server { status }),
            Some(Outcome::RateLimited) => Err(ChatError::ExhaustedRetries {
                attempts,
                last: Box::new(ChatError::RateLimited),
            }),
            Some(Outcome::Transport(desc)) => Err(ChatError::ExhaustedRetries {
                attempts,
                last: Box::new(ChatError::Transport(desc)),
            }),
            None => Err(ChatError::InvariantViolation(
                "submission cycle ended without an outcome".to_string(),
            )),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
