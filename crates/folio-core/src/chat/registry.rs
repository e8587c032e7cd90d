//! Connection registry mapping channels to live chat connections.
//!
//! Built on `tokio::sync::broadcast`, one channel per fan-out group. The
//! registry is an explicit, injectable service rather than process-global
//! state, so the protocol logic can be tested without a live transport.
//!
//! Join = `subscribe` (creates the group lazily); leave = dropping the
//! receiver. Fan-out is at-least-once best-effort to the current member set:
//! connections that have already disconnected simply miss the event. There is
//! no replay -- history is recovered from the persistence store on the next
//! page view.

use dashmap::DashMap;
use folio_types::event::ChatEvent;
use tokio::sync::broadcast;

use std::fmt;

/// A named fan-out group: the fixed admin-broadcast group or one specific
/// conversation's group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Every connected admin session; receives events from all conversations.
    Admin,
    /// The group for one conversation: its owning user plus any session
    /// explicitly watching that conversation.
    Conversation(i64),
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Admin => write!(f, "chat_admin"),
            Channel::Conversation(id) => write!(f, "chat_conversation_{id}"),
        }
    }
}

/// Tracks which live connections belong to which channel and delivers events
/// to every member of a channel.
///
/// Concurrent subscribe/publish/drop are safe: the broadcast sender snapshots
/// its receiver set per send, and the map tolerates mid-broadcast joins.
pub struct ConnectionRegistry {
    channels: DashMap<Channel, broadcast::Sender<ChatEvent>>,
    capacity: usize,
}

impl ConnectionRegistry {
    /// Create a registry whose per-channel buffers hold `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    /// Join a channel, creating it on first subscribe.
    ///
    /// The returned receiver is the membership: dropping it leaves the
    /// channel. Subscribing twice yields two independent memberships.
    pub fn subscribe(&self, channel: Channel) -> broadcast::Receiver<ChatEvent> {
        self.channels
            .entry(channel)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Deliver an event to every connection currently joined to `channel`.
    ///
    /// Returns the number of connections reached. A channel with no members
    /// (or one that was never joined) drops the event silently; an entry
    /// whose last member left is pruned.
    pub fn publish(&self, channel: Channel, event: ChatEvent) -> usize {
        let sender = match self.channels.get(&channel) {
            Some(entry) => entry.value().clone(),
            None => return 0,
        };

        match sender.send(event) {
            Ok(delivered) => delivered,
            Err(_) => {
                // All receivers are gone; drop the idle entry unless someone
                // re-joined between the send and this cleanup.
                self.channels
                    .remove_if(&channel, |_, s| s.receiver_count() == 0);
                0
            }
        }
    }

    /// Number of channels currently tracked.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of live memberships in `channel`.
    pub fn member_count(&self, channel: Channel) -> usize {
        self.channels
            .get(&channel)
            .map(|entry| entry.receiver_count())
            .unwrap_or(0)
    }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("channel_count", &self.channels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(content: &str) -> ChatEvent {
        ChatEvent {
            message: content.to_string(),
            sender_id: 42,
            sender_name: "alice".to_string(),
            sender_is_admin: false,
            message_id: Some(1),
            timestamp: None,
            conversation_id: Some(3),
        }
    }

    #[test]
    fn channel_names_are_deterministic() {
        assert_eq!(Channel::Admin.to_string(), "chat_admin");
        assert_eq!(Channel::Conversation(3).to_string(), "chat_conversation_3");
    }

    #[tokio::test]
    async fn publish_delivers_to_subscriber() {
        let registry = ConnectionRegistry::new(16);
        let mut rx = registry.subscribe(Channel::Conversation(3));

        let reached = registry.publish(Channel::Conversation(3), sample_event("hello"));
        assert_eq!(reached, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.message, "hello");
    }

    #[tokio::test]
    async fn publish_does_not_cross_channels() {
        let registry = ConnectionRegistry::new(16);
        let mut own = registry.subscribe(Channel::Conversation(3));
        let mut other = registry.subscribe(Channel::Conversation(4));

        registry.publish(Channel::Conversation(3), sample_event("hello"));

        assert_eq!(own.recv().await.unwrap().message, "hello");
        assert!(matches!(
            other.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn every_member_receives_the_event() {
        let registry = ConnectionRegistry::new(16);
        let mut rx1 = registry.subscribe(Channel::Admin);
        let mut rx2 = registry.subscribe(Channel::Admin);

        let reached = registry.publish(Channel::Admin, sample_event("hello"));
        assert_eq!(reached, 2);
        assert_eq!(rx1.recv().await.unwrap().message, "hello");
        assert_eq!(rx2.recv().await.unwrap().message, "hello");
    }

    #[test]
    fn publish_with_no_members_is_a_noop() {
        let registry = ConnectionRegistry::new(16);
        assert_eq!(registry.publish(Channel::Admin, sample_event("lost")), 0);
    }

    #[test]
    fn dropping_the_receiver_leaves_the_channel() {
        let registry = ConnectionRegistry::new(16);
        let rx = registry.subscribe(Channel::Conversation(3));
        assert_eq!(registry.member_count(Channel::Conversation(3)), 1);

        drop(rx);
        assert_eq!(registry.member_count(Channel::Conversation(3)), 0);

        // Publishing into the emptied channel prunes its entry.
        registry.publish(Channel::Conversation(3), sample_event("late"));
        assert_eq!(registry.channel_count(), 0);
    }

    #[tokio::test]
    async fn lagged_member_does_not_break_the_channel() {
        let registry = ConnectionRegistry::new(2);
        let mut rx = registry.subscribe(Channel::Admin);

        for i in 0..5 {
            registry.publish(Channel::Admin, sample_event(&format!("m{i}")));
        }

        match rx.try_recv() {
            Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
}
