//! Submission orchestrator: turns one user query into exactly one terminal
//! assistant message.
//!
//! Drives the conversation store through the submission lifecycle, calls the
//! query API at most once at a time, and retries rate-limited or failed
//! calls with linear backoff until the retry ceiling.

use tokio_util::sync::CancellationToken;

use crate::client::QueryApi;
use crate::error::ChatError;
use crate::retry::{AttemptState, Decision, Outcome, RetryPolicy};
use crate::state::{StateTracker, SubmissionState};
use crate::store::ConversationStore;
use crate::types::{Message, QueryRequest};

/// How a call to [`SubmissionOrchestrator::submit`] ended.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Blank query or a cycle already in flight. Nothing was changed.
    Skipped,
    /// The backend answered; its text is now the last assistant message.
    Answered {
        text: String,
        should_continue: bool,
        attempts: u32,
    },
    /// The cycle ended with an error message in place of the answer.
    Failed { error: ChatError, attempts: u32 },
    /// Cancelled between or during attempts; no terminal message was appended.
    Cancelled { attempts: u32 },
}

impl SubmitOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, SubmitOutcome::Skipped)
    }

    /// Network calls made during the cycle.
    pub fn attempts(&self) -> u32 {
        match self {
            SubmitOutcome::Skipped => 0,
            SubmitOutcome::Answered { attempts, .. }
            | SubmitOutcome::Failed { attempts, .. }
            | SubmitOutcome::Cancelled { attempts } => *attempts,
        }
    }
}

enum CycleEnd {
    Resolved(AttemptState),
    Cancelled(u32),
}

/// Owns one conversation and the retry loop that feeds it.
pub struct SubmissionOrchestrator<A> {
    api: A,
    store: ConversationStore,
    policy: RetryPolicy,
    state: StateTracker,
}

impl<A: QueryApi> SubmissionOrchestrator<A> {
    pub fn new(api: A, store: ConversationStore, policy: RetryPolicy) -> Self {
        Self {
            api,
            store,
            policy,
            state: StateTracker::new(),
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Tracker for the phase of the current cycle.
    pub fn state(&self) -> &StateTracker {
        &self.state
    }

    /// Submit a query with no way to cancel it.
    pub async fn submit(&self, query: &str) -> Result<SubmitOutcome, ChatError> {
        self.submit_with_cancel(query, &CancellationToken::new())
            .await
    }

    /// Run one full submission cycle.
    ///
    /// Network and server failures become the terminal assistant message and
    /// are reported through [`SubmitOutcome::Failed`]. Only invariant
    /// violations are returned as `Err`, after the busy flag is cleared.
    ///
    /// Cancellation is observed before each attempt, during the call, and
    /// during backoff; the placeholder is then discarded and busy cleared.
    /// Dropping the returned future instead gives no such cleanup.
    pub async fn submit_with_cancel(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<SubmitOutcome, ChatError> {
        if query.trim().is_empty() {
            tracing::debug!("Ignoring blank query");
            return Ok(SubmitOutcome::Skipped);
        }
        if self.store.is_busy() || self.state.transition(SubmissionState::Submitting).is_err() {
            tracing::debug!("Ignoring query while a submission is in flight");
            return Ok(SubmitOutcome::Skipped);
        }

        self.store.append_user(query);
        self.store.set_busy(true);
        if let Err(e) = self.store.append_placeholder() {
            tracing::error!(error = %e, "Could not append placeholder");
            self.store.set_busy(false);
            self.state.reset();
            return Err(e);
        }

        let request = QueryRequest {
            query: query.to_string(),
            query_num: self.store.query_num(),
        };
        tracing::info!(query_num = request.query_num, "Submitting query");

        match self.drive(&request, cancel).await {
            Ok(CycleEnd::Resolved(attempts)) => Ok(self.resolve(attempts)),
            Ok(CycleEnd::Cancelled(attempts)) => {
                tracing::info!(query_num = request.query_num, attempts, "Submission cancelled");
                self.store.discard_placeholder();
                self.store.set_busy(false);
                if self.state.transition(SubmissionState::Idle).is_err() {
                    self.state.reset();
                }
                Ok(SubmitOutcome::Cancelled { attempts })
            }
            Err(e) => {
                tracing::error!(error = %e, "Submission cycle aborted");
                self.store
                    .resolve_placeholder(Message::assistant(e.user_message()));
                self.store.set_busy(false);
                self.state.reset();
                Err(e)
            }
        }
    }

    /// The Calling/Retrying loop. One call in flight at a time.
    async fn drive(
        &self,
        request: &QueryRequest,
        cancel: &CancellationToken,
    ) -> Result<CycleEnd, ChatError> {
        let mut attempts = AttemptState::new();
        self.state.transition(SubmissionState::Calling)?;

        loop {
            if cancel.is_cancelled() {
                return Ok(CycleEnd::Cancelled(attempts.attempts()));
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(CycleEnd::Cancelled(attempts.attempts())),
                result = self.api.send_query(request) => result,
            };

            let outcome = Outcome::classify(result);
            tracing::debug!(
                query_num = request.query_num,
                attempt = attempts.attempts() + 1,
                outcome = outcome.label(),
                "Query attempt finished"
            );
            attempts.record(outcome);

            match self.policy.decide(&attempts) {
                Decision::Resolve => {
                    self.state.transition(SubmissionState::Resolved)?;
                    return Ok(CycleEnd::Resolved(attempts));
                }
                Decision::Retry { delay } => {
                    self.state.transition(SubmissionState::Retrying)?;
                    tracing::warn!(
                        query_num = request.query_num,
                        attempt = attempts.attempts(),
                        ceiling = self.policy.ceiling(),
                        delay_ms = delay.as_millis() as u64,
                        outcome = attempts.last().map(Outcome::label).unwrap_or("none"),
                        "Retrying query after backoff"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Ok(CycleEnd::Cancelled(attempts.attempts())),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    self.state.transition(SubmissionState::Calling)?;
                }
            }
        }
    }

    /// Fold the final outcome into the store and return to Idle.
    fn resolve(&self, attempts: AttemptState) -> SubmitOutcome {
        let count = attempts.attempts();
        let outcome = match attempts.into_result() {
            Ok(response) => {
                let next = self.store.advance_query_num();
                tracing::info!(attempts = count, next_query_num = next, "Query answered");
                self.store
                    .resolve_placeholder(Message::assistant(response.response.clone()));
                SubmitOutcome::Answered {
                    text: response.response,
                    should_continue: response.should_continue,
                    attempts: count,
                }
            }
            Err(error) => {
                tracing::warn!(attempts = count, error = %error, "Query failed");
                self.store
                    .resolve_placeholder(Message::assistant(error.user_message()));
                SubmitOutcome::Failed {
                    error,
                    attempts: count,
                }
            }
        };

        self.store.set_busy(false);
        if self.state.transition(SubmissionState::Idle).is_err() {
            self.state.reset();
        }
        outcome
    }
}

// =============================================================================
// Tests
// =============================================================================
