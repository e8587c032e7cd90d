use thiserror::Error;

/// Errors from repository operations (used by trait definitions in folio-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors related to token authentication and account registration.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username '{0}' is already taken")]
    UsernameTaken(String),

    #[error("storage error: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_auth_error_display() {
        let err = AuthError::UsernameTaken("alice".to_string());
        assert_eq!(err.to_string(), "username 'alice' is already taken");
    }
}
