//! Chat service orchestrating persistence and fan-out.
//!
//! ChatService owns the protocol semantics shared by the WebSocket sessions
//! and the page-view endpoints: trim-and-drop of empty content, resolving the
//! target conversation per sender role, persist-then-fan-out ordering, and
//! the read-state transitions.
//!
//! Generic over `ConversationRepository` to keep clean architecture
//! (folio-core never depends on folio-infra).

use folio_types::chat::{Conversation, Inbox, InboxEntry, Message};
use folio_types::error::RepositoryError;
use folio_types::event::ChatEvent;
use folio_types::identity::UserIdentity;
use tracing::{debug, warn};

use std::sync::Arc;

use crate::chat::registry::{Channel, ConnectionRegistry};
use crate::chat::repository::ConversationRepository;

pub struct ChatService<R: ConversationRepository> {
    repo: R,
    registry: Arc<ConnectionRegistry>,
}

impl<R: ConversationRepository> ChatService<R> {
    pub fn new(repo: R, registry: Arc<ConnectionRegistry>) -> Self {
        Self { repo, registry }
    }

    /// Access the connection registry (sessions subscribe through it).
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Access the conversation repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Resolve the conversation a session of this identity belongs to.
    pub async fn conversation_for(
        &self,
        user: &UserIdentity,
    ) -> Result<Conversation, RepositoryError> {
        self.repo.get_or_create_conversation(user.id).await
    }

    // --- Send paths ---

    /// A regular user sends a message into their own conversation.
    ///
    /// The sender's own resolved conversation is always used; client-supplied
    /// conversation ids are never trusted for regular users. Whitespace-only
    /// content is a deliberate no-op, not a failure: no persistence, no
    /// fan-out, `Ok(None)`.
    ///
    /// On success the event reaches the user's own channel (so the sender
    /// sees the message echoed) and the admin broadcast channel.
    pub async fn send_user_message(
        &self,
        sender: &UserIdentity,
        content: &str,
    ) -> Result<Option<Message>, RepositoryError> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }

        let conversation = self.repo.get_or_create_conversation(sender.id).await?;
        let message = self
            .repo
            .create_message(conversation.id, sender, content)
            .await?;

        let event = ChatEvent::from_message(&message, sender);
        self.registry
            .publish(Channel::Conversation(conversation.id), event.clone());
        self.registry.publish(Channel::Admin, event);

        Ok(Some(message))
    }

    /// An admin sends a message into a specific conversation.
    ///
    /// An unknown conversation id drops the frame: nothing is persisted and
    /// nothing is fanned out. The wire contract has no error frame, so the
    /// drop is only surfaced in the logs.
    pub async fn send_admin_message(
        &self,
        sender: &UserIdentity,
        conversation_id: i64,
        content: &str,
    ) -> Result<Option<Message>, RepositoryError> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }

        let Some(conversation) = self.repo.get_conversation(conversation_id).await? else {
            warn!(conversation_id, "dropping admin message for unknown conversation");
            return Ok(None);
        };

        let message = self
            .repo
            .create_message(conversation.id, sender, content)
            .await?;

        let event = ChatEvent::from_message(&message, sender);
        self.registry
            .publish(Channel::Conversation(conversation.id), event.clone());
        self.registry.publish(Channel::Admin, event);

        Ok(Some(message))
    }

    // --- View paths ---

    /// The owning user opens their conversation: admin-authored messages are
    /// marked read, `read_by_user` is set, and the history is returned in
    /// `sent_at` order.
    pub async fn user_view(
        &self,
        user: &UserIdentity,
    ) -> Result<(Conversation, Vec<Message>), RepositoryError> {
        let conversation = self.repo.get_or_create_conversation(user.id).await?;
        self.repo.mark_read_by_user(&conversation).await?;

        let messages = self.repo.get_messages(conversation.id).await?;
        let conversation = self
            .repo
            .get_conversation(conversation.id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        debug!(conversation_id = conversation.id, "user viewed conversation");

        Ok((conversation, messages))
    }

    /// An admin opens a conversation: user-authored messages are marked read
    /// and `read_by_admin` is set. Unknown ids are an error here (unlike the
    /// live send path, the caller gets a response to surface).
    pub async fn admin_view(
        &self,
        conversation_id: i64,
    ) -> Result<(Conversation, Vec<Message>), RepositoryError> {
        let conversation = self
            .repo
            .get_conversation(conversation_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        self.repo.mark_read_by_admin(&conversation).await?;

        let messages = self.repo.get_messages(conversation.id).await?;
        let conversation = self
            .repo
            .get_conversation(conversation_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        Ok((conversation, messages))
    }

    /// The admin inbox: every conversation ordered by recency, each with its
    /// unread count, plus the total across all of them.
    pub async fn inbox(&self) -> Result<Inbox, RepositoryError> {
        let conversations = self.repo.list_conversations().await?;

        let mut entries = Vec::with_capacity(conversations.len());
        let mut total_unread = 0;
        for conversation in conversations {
            let unread = self.repo.admin_unread_count(&conversation).await?;
            total_unread += unread;
            entries.push(InboxEntry {
                conversation,
                unread,
            });
        }

        Ok(Inbox {
            conversations: entries,
            total_unread,
        })
    }
}
