//! Error types for the submission pipeline.

use docai_core::error::DocAiError;

/// Errors from the chat pipeline.
///
/// Network and classification errors never escape a submission cycle: the
/// orchestrator turns them into a single assistant message through
/// [`ChatError::user_message`]. Only `InvariantViolation` and `Config`
/// reach callers.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("rate limited by query API (status 429)")]
    RateLimited,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("server returned status {status}")]
    Server { status: u16 },
    #[error("gave up after {attempts} attempts: {last}")]
    ExhaustedRetries { attempts: u32, last: Box<ChatError> },
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl ChatError {
    /// Text of the assistant message that stands in for the answer.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::RateLimited => "Error: Server returned code 429".to_string(),
            ChatError::Transport(desc) => format!("Failed to connect: {}", desc),
            ChatError::Server { status } => format!("Error: Server returned code {}", status),
            ChatError::ExhaustedRetries { attempts, last } => match last.as_ref() {
                ChatError::Transport(desc) => {
                    format!("Failed to connect: {} (after {} attempts)", desc, attempts)
                }
                other => format!(
                    "{} (gave up after {} attempts)",
                    other.user_message(),
                    attempts
                ),
            },
            ChatError::InvariantViolation(_) | ChatError::Config(_) => {
                "Unknown error occurred".to_string()
            }
        }
    }
}

impl From<DocAiError> for ChatError {
    fn from(err: DocAiError) -> Self {
        ChatError::Config(err.to_string())
    }
}
