//! SQLite conversation repository implementation.
//!
//! Implements `ConversationRepository` from `folio-core` using sqlx with the
//! split read/write pools: raw queries, private Row structs, and one
//! transaction per message creation so `last_message_at` can never be
//! observed out of sync with the message set.

use chrono::{DateTime, Utc};
use folio_core::chat::repository::ConversationRepository;
use folio_types::chat::{Conversation, Message};
use folio_types::error::RepositoryError;
use folio_types::identity::UserIdentity;
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ConversationRepository`.
pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ConversationRow {
    id: i64,
    user_id: i64,
    created_at: String,
    last_message_at: String,
    read_by_admin: bool,
    read_by_user: bool,
}

impl ConversationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            created_at: row.try_get("created_at")?,
            last_message_at: row.try_get("last_message_at")?,
            read_by_admin: row.try_get("read_by_admin")?,
            read_by_user: row.try_get("read_by_user")?,
        })
    }

    fn into_conversation(self) -> Result<Conversation, RepositoryError> {
        Ok(Conversation {
            id: self.id,
            user_id: self.user_id,
            created_at: parse_datetime(&self.created_at)?,
            last_message_at: parse_datetime(&self.last_message_at)?,
            read_by_admin: self.read_by_admin,
            read_by_user: self.read_by_user,
        })
    }
}

struct MessageRow {
    id: i64,
    conversation_id: i64,
    sender_id: i64,
    content: String,
    sent_at: String,
    is_read: bool,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            sender_id: row.try_get("sender_id")?,
            content: row.try_get("content")?,
            sent_at: row.try_get("sent_at")?,
            is_read: row.try_get("is_read")?,
        })
    }

    fn into_message(self) -> Result<Message, RepositoryError> {
        Ok(Message {
            id: self.id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            content: self.content,
            sent_at: parse_datetime(&self.sent_at)?,
            is_read: self.is_read,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

// ---------------------------------------------------------------------------
// ConversationRepository implementation
// ---------------------------------------------------------------------------

impl ConversationRepository for SqliteConversationRepository {
    async fn get_or_create_conversation(
        &self,
        user_id: i64,
    ) -> Result<Conversation, RepositoryError> {
        // INSERT OR IGNORE keeps this idempotent under concurrent first
        // contact: the UNIQUE(user_id) constraint arbitrates, the re-read
        // returns whichever row won.
        let now = format_datetime(&Utc::now());
        sqlx::query(
            r#"INSERT INTO conversations (user_id, created_at, last_message_at)
               VALUES (?, ?, ?)
               ON CONFLICT(user_id) DO NOTHING"#,
        )
        .bind(user_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let row = sqlx::query("SELECT * FROM conversations WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        ConversationRow::from_row(&row)
            .map_err(|e| RepositoryError::Query(e.to_string()))?
            .into_conversation()
    }

    async fn get_conversation(
        &self,
        conversation_id: i64,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?")
            .bind(conversation_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let conversation_row = ConversationRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(conversation_row.into_conversation()?))
            }
            None => Ok(None),
        }
    }

    async fn create_message(
        &self,
        conversation_id: i64,
        sender: &UserIdentity,
        content: &str,
    ) -> Result<Message, RepositoryError> {
        let sent_at = Utc::now();

        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let result = sqlx::query(
            r#"INSERT INTO messages (conversation_id, sender_id, content, sent_at, is_read)
               VALUES (?, ?, ?, ?, 0)"#,
        )
        .bind(conversation_id)
        .bind(sender.id)
        .bind(content)
        .bind(format_datetime(&sent_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let message_id = result.last_insert_rowid();

        // Advance the conversation clock and flag the opposite side's unread
        // work in the same transaction as the insert.
        let update_sql = if sender.is_admin() {
            "UPDATE conversations SET last_message_at = ?, read_by_user = 0 WHERE id = ?"
        } else {
            "UPDATE conversations SET last_message_at = ?, read_by_admin = 0 WHERE id = ?"
        };
        let updated = sqlx::query(update_sql)
            .bind(format_datetime(&sent_at))
            .bind(conversation_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(Message {
            id: message_id,
            conversation_id,
            sender_id: sender.id,
            content: content.to_string(),
            sent_at,
            is_read: false,
        })
    }

    async fn get_messages(&self, conversation_id: i64) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE conversation_id = ? ORDER BY sent_at ASC, id ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let message_row =
                MessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            messages.push(message_row.into_message()?);
        }

        Ok(messages)
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM conversations ORDER BY last_message_at DESC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut conversations = Vec::with_capacity(rows.len());
        for row in &rows {
            let conversation_row = ConversationRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            conversations.push(conversation_row.into_conversation()?);
        }

        Ok(conversations)
    }

    async fn admin_unread_count(
        &self,
        conversation: &Conversation,
    ) -> Result<u32, RepositoryError> {
        let row = sqlx::query(
            "SELECT COUNT(*) as cnt FROM messages WHERE conversation_id = ? AND is_read = 0 AND sender_id = ?",
        )
        .bind(conversation.id)
        .bind(conversation.user_id)
        .fetch_one(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let count: i64 = row
            .try_get("cnt")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(count as u32)
    }

    async fn user_unread_count(
        &self,
        conversation: &Conversation,
    ) -> Result<u32, RepositoryError> {
        let row = sqlx::query(
            "SELECT COUNT(*) as cnt FROM messages WHERE conversation_id = ? AND is_read = 0 AND sender_id != ?",
        )
        .bind(conversation.id)
        .bind(conversation.user_id)
        .fetch_one(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let count: i64 = row
            .try_get("cnt")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(count as u32)
    }

    async fn mark_read_by_user(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            "UPDATE messages SET is_read = 1 WHERE conversation_id = ? AND is_read = 0 AND sender_id != ?",
        )
        .bind(conversation.id)
        .bind(conversation.user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query("UPDATE conversations SET read_by_user = 1 WHERE id = ?")
            .bind(conversation.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))
    }

    async fn mark_read_by_admin(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            "UPDATE messages SET is_read = 1 WHERE conversation_id = ? AND is_read = 0 AND sender_id = ?",
        )
        .bind(conversation.id)
        .bind(conversation.user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query("UPDATE conversations SET read_by_admin = 1 WHERE id = ?")
            .bind(conversation.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_types::identity::Role;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    async fn seed_user(pool: &DatabasePool, username: &str, role: Role) -> UserIdentity {
        let result = sqlx::query("INSERT INTO users (username, role, created_at) VALUES (?, ?, ?)")
            .bind(username)
            .bind(role.to_string())
            .bind(Utc::now().to_rfc3339())
            .execute(&pool.writer)
            .await
            .unwrap();
        UserIdentity::new(result.last_insert_rowid(), username, role)
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool.clone());
        let alice = seed_user(&pool, "alice", Role::Regular).await;
        let bob = seed_user(&pool, "bob", Role::Regular).await;

        let first = repo.get_or_create_conversation(alice.id).await.unwrap();
        let second = repo.get_or_create_conversation(alice.id).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.user_id, alice.id);

        let other = repo.get_or_create_conversation(bob.id).await.unwrap();
        assert_ne!(other.id, first.id);
    }

    #[tokio::test]
    async fn test_fresh_conversation_has_no_unread_work() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool.clone());
        let alice = seed_user(&pool, "alice", Role::Regular).await;

        let conversation = repo.get_or_create_conversation(alice.id).await.unwrap();
        assert!(conversation.read_by_admin);
        assert!(conversation.read_by_user);
        assert_eq!(conversation.last_message_at, conversation.created_at);
        assert_eq!(repo.admin_unread_count(&conversation).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_message_advances_conversation_clock() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool.clone());
        let alice = seed_user(&pool, "alice", Role::Regular).await;

        let conversation = repo.get_or_create_conversation(alice.id).await.unwrap();
        let message = repo
            .create_message(conversation.id, &alice, "hello")
            .await
            .unwrap();
        assert!(!message.is_read);

        let updated = repo
            .get_conversation(conversation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.last_message_at, message.sent_at);
        assert!(!updated.read_by_admin, "user send flags admin unread work");
        assert!(updated.read_by_user);
    }

    #[tokio::test]
    async fn test_admin_message_clears_user_read_flag() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool.clone());
        let alice = seed_user(&pool, "alice", Role::Regular).await;
        let admin = seed_user(&pool, "admin", Role::Admin).await;

        let conversation = repo.get_or_create_conversation(alice.id).await.unwrap();
        repo.create_message(conversation.id, &admin, "hi back")
            .await
            .unwrap();

        let updated = repo
            .get_conversation(conversation.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!updated.read_by_user);
        assert!(updated.read_by_admin);
    }

    #[tokio::test]
    async fn test_create_message_for_unknown_conversation_fails() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool.clone());
        let alice = seed_user(&pool, "alice", Role::Regular).await;

        let result = repo.create_message(999, &alice, "hello").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_messages_ordered_with_increasing_ids() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool.clone());
        let alice = seed_user(&pool, "alice", Role::Regular).await;

        let conversation = repo.get_or_create_conversation(alice.id).await.unwrap();
        for i in 0..5 {
            repo.create_message(conversation.id, &alice, &format!("message {i}"))
                .await
                .unwrap();
        }

        let messages = repo.get_messages(conversation.id).await.unwrap();
        assert_eq!(messages.len(), 5);
        for (i, message) in messages.iter().enumerate() {
            assert_eq!(message.content, format!("message {i}"));
        }
        for pair in messages.windows(2) {
            assert!(pair[0].id < pair[1].id);
            assert!(pair[0].sent_at <= pair[1].sent_at);
        }

        let updated = repo
            .get_conversation(conversation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.last_message_at, messages.last().unwrap().sent_at);
    }

    #[tokio::test]
    async fn test_unread_counts_and_read_transitions() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool.clone());
        let alice = seed_user(&pool, "alice", Role::Regular).await;
        let admin = seed_user(&pool, "admin", Role::Admin).await;

        let conversation = repo.get_or_create_conversation(alice.id).await.unwrap();
        repo.create_message(conversation.id, &alice, "one").await.unwrap();
        repo.create_message(conversation.id, &alice, "two").await.unwrap();
        repo.create_message(conversation.id, &admin, "reply").await.unwrap();

        assert_eq!(repo.admin_unread_count(&conversation).await.unwrap(), 2);
        assert_eq!(repo.user_unread_count(&conversation).await.unwrap(), 1);

        // Admin opens the thread: user-authored messages become read.
        repo.mark_read_by_admin(&conversation).await.unwrap();
        assert_eq!(repo.admin_unread_count(&conversation).await.unwrap(), 0);
        assert_eq!(repo.user_unread_count(&conversation).await.unwrap(), 1);
        let updated = repo
            .get_conversation(conversation.id)
            .await
            .unwrap()
            .unwrap();
        assert!(updated.read_by_admin);

        // User opens the thread: the admin reply becomes read.
        repo.mark_read_by_user(&conversation).await.unwrap();
        assert_eq!(repo.user_unread_count(&conversation).await.unwrap(), 0);
        let updated = repo
            .get_conversation(conversation.id)
            .await
            .unwrap()
            .unwrap();
        assert!(updated.read_by_user);
    }

    #[tokio::test]
    async fn test_inbox_ordering_by_recency() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool.clone());
        let alice = seed_user(&pool, "alice", Role::Regular).await;
        let bob = seed_user(&pool, "bob", Role::Regular).await;

        let alice_conversation = repo.get_or_create_conversation(alice.id).await.unwrap();
        let bob_conversation = repo.get_or_create_conversation(bob.id).await.unwrap();

        repo.create_message(alice_conversation.id, &alice, "first").await.unwrap();
        repo.create_message(bob_conversation.id, &bob, "second").await.unwrap();

        let conversations = repo.list_conversations().await.unwrap();
        assert_eq!(conversations.len(), 2);
        assert_eq!(conversations[0].id, bob_conversation.id);
        assert_eq!(conversations[1].id, alice_conversation.id);
    }

    #[tokio::test]
    async fn test_user_delete_cascades_conversation_and_messages() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool.clone());
        let alice = seed_user(&pool, "alice", Role::Regular).await;

        let conversation = repo.get_or_create_conversation(alice.id).await.unwrap();
        repo.create_message(conversation.id, &alice, "hello").await.unwrap();

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(alice.id)
            .execute(&pool.writer)
            .await
            .unwrap();

        assert!(repo.get_conversation(conversation.id).await.unwrap().is_none());
        let messages = repo.get_messages(conversation.id).await.unwrap();
        assert!(messages.is_empty());
    }
}
