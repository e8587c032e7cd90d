//! Conversation and message types for the Folio support chat.
//!
//! Each visitor owns exactly one durable conversation with the site admin.
//! Messages are ordered by `sent_at` ascending within their conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A support thread between one regular user and the admin role.
///
/// `last_message_at` always equals the `sent_at` of the most recently
/// persisted message, or `created_at` while the conversation is empty.
/// The `read_by_*` flags track whether each side has viewed the thread
/// since the other side last wrote into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
    pub read_by_admin: bool,
    pub read_by_user: bool,
}

/// A single message within a conversation.
///
/// Content is immutable after creation; only `is_read` transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    pub is_read: bool,
}

/// One row of the admin inbox: a conversation plus its unread count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxEntry {
    pub conversation: Conversation,
    /// Unread messages authored by the conversation's owning user.
    pub unread: u32,
}

/// The full admin inbox, ordered by most recent activity first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inbox {
    pub conversations: Vec<InboxEntry>,
    pub total_unread: u32,
}
