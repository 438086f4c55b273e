//! Submission state machine with validated transitions.
//!
//! Enforces the lifecycle of one submission cycle:
//! - Idle -> Submitting (non-blank query accepted while not busy)
//! - Submitting -> Calling (user message and placeholder appended)
//! - Calling -> Retrying (rate limited or transport failure, ceiling not reached)
//! - Retrying -> Calling (backoff elapsed)
//! - Calling -> Resolved (terminal message determined)
//! - Resolved -> Idle (placeholder resolved, busy cleared)
//! - Calling -> Idle, Retrying -> Idle (cancelled)

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::ChatError;

/// Where a submission cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionState {
    /// No cycle in flight.
    Idle,
    /// User message and placeholder being appended.
    Submitting,
    /// One network call outstanding.
    Calling,
    /// Waiting out a backoff delay before the next call.
    Retrying,
    /// Terminal message determined, store being updated.
    Resolved,
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionState::Idle => write!(f, "Idle"),
            SubmissionState::Submitting => write!(f, "Submitting"),
            SubmissionState::Calling => write!(f, "Calling"),
            SubmissionState::Retrying => write!(f, "Retrying"),
            SubmissionState::Resolved => write!(f, "Resolved"),
        }
    }
}

impl SubmissionState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &SubmissionState) -> bool {
        matches!(
            (self, target),
            (SubmissionState::Idle, SubmissionState::Submitting)
                | (SubmissionState::Submitting, SubmissionState::Calling)
                | (SubmissionState::Calling, SubmissionState::Retrying)
                | (SubmissionState::Retrying, SubmissionState::Calling)
                | (SubmissionState::Calling, SubmissionState::Resolved)
                | (SubmissionState::Resolved, SubmissionState::Idle)
                // Cancel transitions
                | (SubmissionState::Calling, SubmissionState::Idle)
                | (SubmissionState::Retrying, SubmissionState::Idle)
        )
    }
}

/// Shared tracker for the current submission state.
///
/// Clones observe the same state, so a UI can poll the phase of a cycle
/// that another task drives.
#[derive(Debug, Clone)]
pub struct StateTracker {
    state: Arc<Mutex<SubmissionState>>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTracker {
    /// Create a tracker initialized to `Idle`.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SubmissionState::Idle)),
        }
    }

    pub fn current(&self) -> SubmissionState {
        *self.lock()
    }

    /// Attempt to move to `target`, rejecting transitions the lifecycle forbids.
    pub fn transition(&self, target: SubmissionState) -> Result<(), ChatError> {
        let mut state = self.lock();
        if state.can_transition_to(&target) {
            tracing::debug!("Submission state: {} -> {}", *state, target);
            *state = target;
            Ok(())
        } else {
            Err(ChatError::InvariantViolation(format!(
                "Invalid state transition: {} -> {}",
                *state, target
            )))
        }
    }

    /// Force the tracker back to Idle.
    pub fn reset(&self) {
        let mut state = self.lock();
        if *state != SubmissionState::Idle {
            tracing::warn!("Submission state reset to Idle from {}", *state);
        }
        *state = SubmissionState::Idle;
    }

    // A panic while holding the lock cannot leave a half-written Copy value.
    fn lock(&self) -> MutexGuard<'_, SubmissionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// =============================================================================
// Tests
// =============================================================================
