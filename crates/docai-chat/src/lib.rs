//! Conversation core for the DocAI client.
//!
//! Holds the in-memory conversation, sends queries to the backend, and
//! retries rate-limited or failed calls until each user turn resolves to
//! exactly one assistant message.

pub mod client;
pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod state;
pub mod store;
pub mod types;

pub use client::{ApiReply, HttpQueryApi, QueryApi};
pub use error::ChatError;
pub use orchestrator::{SubmissionOrchestrator, SubmitOutcome};
pub use retry::{AttemptState, Decision, Outcome, RetryPolicy};
pub use state::{StateTracker, SubmissionState};
pub use store::ConversationStore;
pub use types::{ConversationSnapshot, Message, QueryRequest, QueryResponse, Sender};
