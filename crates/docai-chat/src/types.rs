//! Conversation and wire types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Text shown by the typing indicator while a reply is pending.
pub const PLACEHOLDER_TEXT: &str = "...";

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Assistant => write!(f, "assistant"),
        }
    }
}

/// One entry in the conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    /// Transient "response pending" marker; replaced before a cycle ends.
    #[serde(default)]
    pub is_placeholder: bool,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(text.into(), Sender::User, false)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(text.into(), Sender::Assistant, false)
    }

    pub fn placeholder() -> Self {
        Self::new(PLACEHOLDER_TEXT.to_string(), Sender::Assistant, true)
    }

    fn new(text: String, sender: Sender, is_placeholder: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            sender,
            timestamp: Utc::now(),
            is_placeholder,
        }
    }
}

/// Point-in-time view of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSnapshot {
    /// Messages in insertion order (oldest first).
    pub messages: Vec<Message>,
    /// True while a submission cycle is in flight.
    pub busy: bool,
    /// Turn number the next query will carry.
    pub query_num: u32,
}

impl Default for ConversationSnapshot {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            busy: false,
            query_num: 1,
        }
    }
}

impl ConversationSnapshot {
    /// Messages newest first, the order a chat list renders them.
    pub fn newest_first(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().rev()
    }

    pub fn placeholder(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.is_placeholder)
    }

    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.sender == Sender::Assistant && !m.is_placeholder)
    }
}

/// Request body sent to the query endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub query_num: u32,
}

/// Successful response body from the query endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: String,
    /// Backend hint that the conversation expects a follow-up. Not acted on yet.
    #[serde(rename = "continue", default)]
    pub should_continue: bool,
}

// =============================================================================
// Tests
// =============================================================================
