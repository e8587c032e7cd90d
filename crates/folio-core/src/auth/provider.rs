//! AuthProvider trait definition.
//!
//! Resolves bearer tokens to user identities and manages account bootstrap.
//! The SQLite implementation lives in folio-infra.

use folio_types::error::AuthError;
use folio_types::identity::UserIdentity;

pub trait AuthProvider: Send + Sync {
    /// Resolve a bearer token to an identity. `None` means the token is
    /// unknown -- the connection must be rejected before any channel join.
    fn resolve_token(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Option<UserIdentity>, AuthError>> + Send;

    /// Create a regular user account and issue its bearer token.
    ///
    /// Returns the new identity and the plaintext token (shown once; only
    /// its hash is stored).
    fn register_user(
        &self,
        username: &str,
    ) -> impl std::future::Future<Output = Result<(UserIdentity, String), AuthError>> + Send;

    /// Idempotent admin bootstrap: create the admin account and token on
    /// first run. Returns `None` when an admin already exists.
    fn ensure_admin(
        &self,
        username: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, AuthError>> + Send;
}
