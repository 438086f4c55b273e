//! In-memory conversation store with snapshot observers.
//!
//! The whole conversation lives inside a `tokio::sync::watch` channel. Every
//! mutation edits the snapshot under the channel's lock and publishes it as
//! one unit, so subscribers only ever see states between operations.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::ChatError;
use crate::types::{ConversationSnapshot, Message};

/// Shared handle to one conversation.
///
/// Clones refer to the same conversation. Any number of observers may read
/// or subscribe, but only one orchestrator should write.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    tx: Arc<watch::Sender<ConversationSnapshot>>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    /// Create an empty, idle conversation with `query_num = 1`.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConversationSnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    /// Append a user message and return it.
    pub fn append_user(&self, text: &str) -> Message {
        let message = Message::user(text);
        let stored = message.clone();
        self.tx.send_modify(|snap| snap.messages.push(stored));
        message
    }

    /// Append the typing-indicator placeholder.
    ///
    /// Fails without touching the store if a placeholder is already present.
    pub fn append_placeholder(&self) -> Result<Message, ChatError> {
        let mut created = None;
        self.tx.send_if_modified(|snap| {
            if snap.placeholder().is_some() {
                return false;
            }
            let message = Message::placeholder();
            created = Some(message.clone());
            snap.messages.push(message);
            true
        });
        created.ok_or_else(|| {
            ChatError::InvariantViolation("a placeholder message is already present".to_string())
        })
    }

    /// Swap the placeholder (if any) for `final_message` in one step.
    pub fn resolve_placeholder(&self, final_message: Message) {
        self.tx.send_modify(|snap| {
            snap.messages.retain(|m| !m.is_placeholder);
            snap.messages.push(final_message);
        });
    }

    /// Drop the placeholder without a replacement. Returns whether one existed.
    pub fn discard_placeholder(&self) -> bool {
        self.tx.send_if_modified(|snap| {
            let before = snap.messages.len();
            snap.messages.retain(|m| !m.is_placeholder);
            snap.messages.len() != before
        })
    }

    /// Assign the busy flag. Observers are notified even if it is unchanged.
    pub fn set_busy(&self, busy: bool) {
        self.tx.send_modify(|snap| snap.busy = busy);
    }

    pub fn is_busy(&self) -> bool {
        self.tx.borrow().busy
    }

    /// Turn number the next query will carry.
    pub fn query_num(&self) -> u32 {
        self.tx.borrow().query_num
    }

    /// Increment the turn counter after a successful exchange. Returns the new value.
    pub fn advance_query_num(&self) -> u32 {
        let mut next = 0;
        self.tx.send_modify(|snap| {
            snap.query_num += 1;
            next = snap.query_num;
        });
        next
    }

    /// Consistent copy of the current conversation.
    pub fn snapshot(&self) -> ConversationSnapshot {
        self.tx.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ConversationSnapshot> {
        self.tx.subscribe()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Sender, PLACEHOLDER_TEXT};

    #[test]
    fn test_new_store_is_empty_and_idle() {
        let store = ConversationStore::new();
        let snap = store.snapshot();
        assert!(snap.messages.is_empty());
        assert!(!snap.busy);
        assert_eq!(snap.query_num, 1);
    }

    #[test]
    fn test_append_user_preserves_order() {
        let store = ConversationStore::new();
        let first = store.append_user("first");
        let second = store.append_user("second");

        let snap = store.snapshot();
        assert_eq!(snap.messages.len(), 2);
        assert_eq!(snap.messages[0].id, first.id);
        assert_eq!(snap.messages[1].id, second.id);
        assert_eq!(snap.messages[1].sender, Sender::User);
    }

    // ---- Placeholder discipline ----

    #[test]
    fn test_append_placeholder_once() {
        let store = ConversationStore::new();
        let placeholder = store.append_placeholder().unwrap();
        assert!(placeholder.is_placeholder);
        assert_eq!(placeholder.text, PLACEHOLDER_TEXT);
        assert_eq!(store.snapshot().placeholder().unwrap().id, placeholder.id);
    }

    #[test]
    fn test_second_placeholder_is_invariant_violation() {
        let store = ConversationStore::new();
        store.append_placeholder().unwrap();
        let result = store.append_placeholder();
        assert!(matches!(result, Err(ChatError::InvariantViolation(_))));

        let snap = store.snapshot();
        assert_eq!(snap.messages.iter().filter(|m| m.is_placeholder).count(), 1);
    }

    #[test]
    fn test_resolve_placeholder_swaps_in_final_message() {
        let store = ConversationStore::new();
        store.append_user("q");
        store.append_placeholder().unwrap();
        store.resolve_placeholder(Message::assistant("answer"));

        let snap = store.snapshot();
        assert_eq!(snap.messages.len(), 2);
        assert!(snap.placeholder().is_none());
        assert_eq!(snap.messages[1].text, "answer");
    }

    #[test]
    fn test_resolve_without_placeholder_still_appends() {
        let store = ConversationStore::new();
        store.resolve_placeholder(Message::assistant("late"));
        assert_eq!(store.snapshot().messages.len(), 1);
    }

    #[test]
    fn test_discard_placeholder() {
        let store = ConversationStore::new();
        store.append_user("q");
        assert!(!store.discard_placeholder());
        store.append_placeholder().unwrap();
        assert!(store.discard_placeholder());
        assert_eq!(store.snapshot().messages.len(), 1);
    }

    // ---- Busy flag and counter ----

    #[test]
    fn test_set_busy() {
        let store = ConversationStore::new();
        store.set_busy(true);
        assert!(store.is_busy());
        store.set_busy(false);
        assert!(!store.is_busy());
    }

    #[test]
    fn test_advance_query_num() {
        let store = ConversationStore::new();
        assert_eq!(store.advance_query_num(), 2);
        assert_eq!(store.advance_query_num(), 3);
        assert_eq!(store.query_num(), 3);
    }

    #[test]
    fn test_clones_share_state() {
        let store = ConversationStore::new();
        let other = store.clone();
        store.append_user("shared");
        assert_eq!(other.snapshot().messages.len(), 1);
    }

    // ---- Observers ----

    #[tokio::test]
    async fn test_set_busy_notifies_even_when_unchanged() {
        let store = ConversationStore::new();
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        store.set_busy(false);
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        store.set_busy(false);
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_resolve_publishes_single_consistent_snapshot() {
        let store = ConversationStore::new();
        store.append_user("q");
        store.append_placeholder().unwrap();

        let mut rx = store.subscribe();
        rx.borrow_and_update();
        store.resolve_placeholder(Message::assistant("a"));

        rx.changed().await.unwrap();
        let snap = rx.borrow_and_update().clone();
        assert!(snap.placeholder().is_none());
        assert_eq!(snap.last_assistant().unwrap().text, "a");
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_rejected_placeholder_does_not_notify() {
        let store = ConversationStore::new();
        store.append_placeholder().unwrap();

        let mut rx = store.subscribe();
        rx.borrow_and_update();
        let _ = store.append_placeholder();
        assert!(!rx.has_changed().unwrap());
    }
}
