//! SQLite token authentication provider.
//!
//! Bearer tokens are generated once, shown to the caller, and stored only as
//! SHA-256 hashes in the `auth_tokens` table. Resolving a token joins through
//! to `users` and yields the identity with its role already decided, so no
//! downstream code re-derives admin status.

use chrono::Utc;
use folio_core::auth::provider::AuthProvider;
use folio_types::error::AuthError;
use folio_types::identity::{Role, UserIdentity};
use sha2::{Digest, Sha256};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `AuthProvider`.
pub struct SqliteAuthProvider {
    pool: DatabasePool,
}

impl SqliteAuthProvider {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn insert_user(&self, username: &str, role: Role) -> Result<UserIdentity, AuthError> {
        let result = sqlx::query("INSERT INTO users (username, role, created_at) VALUES (?, ?, ?)")
            .bind(username)
            .bind(role.to_string())
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| {
                if e.as_database_error()
                    .is_some_and(|db| db.is_unique_violation())
                {
                    AuthError::UsernameTaken(username.to_string())
                } else {
                    AuthError::Storage(e.to_string())
                }
            })?;

        Ok(UserIdentity::new(result.last_insert_rowid(), username, role))
    }

    async fn issue_token(&self, user_id: i64) -> Result<String, AuthError> {
        let token = generate_token();
        sqlx::query("INSERT INTO auth_tokens (user_id, token_hash, created_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(hash_token(&token))
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        Ok(token)
    }
}

impl AuthProvider for SqliteAuthProvider {
    async fn resolve_token(&self, token: &str) -> Result<Option<UserIdentity>, AuthError> {
        let row = sqlx::query(
            r#"SELECT t.id as token_id, u.id as user_id, u.username, u.role
               FROM auth_tokens t JOIN users u ON u.id = t.user_id
               WHERE t.token_hash = ?"#,
        )
        .bind(hash_token(token))
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| AuthError::Storage(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let token_id: i64 = row
            .try_get("token_id")
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        let user_id: i64 = row
            .try_get("user_id")
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        let username: String = row
            .try_get("username")
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        let role: Role = row
            .try_get::<String, _>("role")
            .map_err(|e| AuthError::Storage(e.to_string()))?
            .parse()
            .map_err(AuthError::Storage)?;

        // Update last_used_at (best effort, don't fail the request)
        if let Err(e) = sqlx::query("UPDATE auth_tokens SET last_used_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(token_id)
            .execute(&self.pool.writer)
            .await
        {
            tracing::debug!(token_id, error = %e, "failed to update last_used_at");
        }

        Ok(Some(UserIdentity::new(user_id, username, role)))
    }

    async fn register_user(&self, username: &str) -> Result<(UserIdentity, String), AuthError> {
        let identity = self.insert_user(username, Role::Regular).await?;
        let token = self.issue_token(identity.id).await?;
        Ok((identity, token))
    }

    async fn ensure_admin(&self, username: &str) -> Result<Option<String>, AuthError> {
        let existing = sqlx::query("SELECT id FROM users WHERE role = 'admin' LIMIT 1")
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        if existing.is_some() {
            return Ok(None);
        }

        let identity = self.insert_user(username, Role::Admin).await?;
        let token = self.issue_token(identity.id).await?;
        Ok(Some(token))
    }
}

/// Generate a fresh bearer token: two random UUIDs, hex-encoded with a
/// recognizable prefix.
fn generate_token() -> String {
    format!(
        "folio_{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

/// Compute SHA-256 hash of a token (lowercase hex).
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{digest:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    #[tokio::test]
    async fn test_register_and_resolve_roundtrip() {
        let provider = SqliteAuthProvider::new(test_pool().await);

        let (identity, token) = provider.register_user("alice").await.unwrap();
        assert_eq!(identity.username, "alice");
        assert_eq!(identity.role, Role::Regular);
        assert!(token.starts_with("folio_"));

        let resolved = provider.resolve_token(&token).await.unwrap().unwrap();
        assert_eq!(resolved, identity);
    }

    #[tokio::test]
    async fn test_unknown_token_resolves_to_none() {
        let provider = SqliteAuthProvider::new(test_pool().await);
        let resolved = provider.resolve_token("folio_bogus").await.unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_a_conflict() {
        let provider = SqliteAuthProvider::new(test_pool().await);

        provider.register_user("alice").await.unwrap();
        let err = provider.register_user("alice").await.unwrap_err();
        assert!(matches!(err, AuthError::UsernameTaken(name) if name == "alice"));
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let provider = SqliteAuthProvider::new(test_pool().await);

        let token = provider.ensure_admin("admin").await.unwrap();
        let token = token.expect("first run issues a token");

        let resolved = provider.resolve_token(&token).await.unwrap().unwrap();
        assert_eq!(resolved.role, Role::Admin);

        // Second run finds the existing admin and issues nothing.
        assert!(provider.ensure_admin("admin").await.unwrap().is_none());
    }

    #[test]
    fn test_generated_tokens_are_prefixed_hex() {
        let token = generate_token();
        let hex = token.strip_prefix("folio_").expect("folio_ prefix");
        // Two simple-format UUIDs, 32 hex chars each.
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }

    #[tokio::test]
    async fn test_tokens_are_stored_hashed() {
        let pool = test_pool().await;
        let provider = SqliteAuthProvider::new(pool.clone());

        let (_, token) = provider.register_user("alice").await.unwrap();

        let stored: (String,) = sqlx::query_as("SELECT token_hash FROM auth_tokens LIMIT 1")
            .fetch_one(&pool.reader)
            .await
            .unwrap();
        assert_ne!(stored.0, token);
        assert_eq!(stored.0, hash_token(&token));
    }
}
