//! ConversationRepository trait definition.
//!
//! The persistence port for conversations, messages, and read-state.
//! Implementations live in folio-infra (e.g., `SqliteConversationRepository`).
//! Uses native async fn in traits (RPITIT, Rust 2024 edition).

use folio_types::chat::{Conversation, Message};
use folio_types::error::RepositoryError;
use folio_types::identity::UserIdentity;

pub trait ConversationRepository: Send + Sync {
    /// Fetch the conversation owned by `user_id`, creating it on first
    /// contact. Idempotent: at most one conversation exists per user.
    fn get_or_create_conversation(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<Conversation, RepositoryError>> + Send;

    /// Get a conversation by id.
    fn get_conversation(
        &self,
        conversation_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<Conversation>, RepositoryError>> + Send;

    /// Persist a message and, in the same transaction, advance the parent
    /// conversation's `last_message_at` to the new message's timestamp and
    /// clear the opposite side's read flag.
    ///
    /// Returns the stored row with its assigned id and `sent_at`.
    fn create_message(
        &self,
        conversation_id: i64,
        sender: &UserIdentity,
        content: &str,
    ) -> impl std::future::Future<Output = Result<Message, RepositoryError>> + Send;

    /// All messages in a conversation, ordered by `sent_at` ascending.
    fn get_messages(
        &self,
        conversation_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;

    /// All conversations, ordered by `last_message_at` descending.
    fn list_conversations(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Conversation>, RepositoryError>> + Send;

    /// Count of unread messages authored by the conversation's owning user.
    fn admin_unread_count(
        &self,
        conversation: &Conversation,
    ) -> impl std::future::Future<Output = Result<u32, RepositoryError>> + Send;

    /// Count of unread messages authored by anyone other than the owner.
    fn user_unread_count(
        &self,
        conversation: &Conversation,
    ) -> impl std::future::Future<Output = Result<u32, RepositoryError>> + Send;

    /// The owning user viewed the thread: mark all messages not authored by
    /// them as read and set `read_by_user`.
    fn mark_read_by_user(
        &self,
        conversation: &Conversation,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// An admin viewed the thread: mark all messages authored by the owning
    /// user as read and set `read_by_admin`.
    fn mark_read_by_admin(
        &self,
        conversation: &Conversation,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
