//! Fan-out event delivered to live chat connections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::Message;
use crate::identity::UserIdentity;

/// The event fanned out to every connection in a channel, and the exact JSON
/// shape written back to each WebSocket client:
///
/// ```json
/// {
///   "message": "hello",
///   "sender_id": 42,
///   "sender_name": "alice",
///   "sender_is_admin": false,
///   "message_id": 7,
///   "timestamp": "2026-01-01T00:00:00Z",
///   "conversation_id": 3
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub message: String,
    pub sender_id: i64,
    pub sender_name: String,
    pub sender_is_admin: bool,
    pub message_id: Option<i64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub conversation_id: Option<i64>,
}

impl ChatEvent {
    /// Build the fan-out event for a freshly persisted message.
    pub fn from_message(message: &Message, sender: &UserIdentity) -> Self {
        Self {
            message: message.content.clone(),
            sender_id: sender.id,
            sender_name: sender.username.clone(),
            sender_is_admin: sender.is_admin(),
            message_id: Some(message.id),
            timestamp: Some(message.sent_at),
            conversation_id: Some(message.conversation_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;

    #[test]
    fn test_event_carries_message_fields() {
        let sender = UserIdentity::new(42, "alice", Role::Regular);
        let message = Message {
            id: 7,
            conversation_id: 3,
            sender_id: 42,
            content: "hello".to_string(),
            sent_at: Utc::now(),
            is_read: false,
        };

        let event = ChatEvent::from_message(&message, &sender);
        assert_eq!(event.message, "hello");
        assert_eq!(event.sender_id, 42);
        assert_eq!(event.sender_name, "alice");
        assert!(!event.sender_is_admin);
        assert_eq!(event.message_id, Some(7));
        assert_eq!(event.conversation_id, Some(3));
        assert_eq!(event.timestamp, Some(message.sent_at));
    }

    #[test]
    fn test_event_wire_shape() {
        let event = ChatEvent {
            message: "hi back".to_string(),
            sender_id: 1,
            sender_name: "admin".to_string(),
            sender_is_admin: true,
            message_id: Some(8),
            timestamp: None,
            conversation_id: Some(3),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"sender_is_admin\":true"));
        assert!(json.contains("\"timestamp\":null"));
        assert!(json.contains("\"conversation_id\":3"));
    }
}
