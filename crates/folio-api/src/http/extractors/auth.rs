//! Bearer-token authentication extractors.
//!
//! Extracts and verifies tokens from:
//! - `Authorization: Bearer <token>` header
//! - `X-API-Key: <token>` header
//! - `?token=<token>` query parameter (browser WebSocket clients cannot set
//!   headers, so the upgrade request carries the token in the URL)
//!
//! Tokens are SHA-256 hashed and compared against the `auth_tokens` table by
//! the auth provider. Connections without a resolvable identity are rejected
//! here, before any upgrade or channel join happens.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use folio_core::auth::provider::AuthProvider;
use folio_types::identity::UserIdentity;

use crate::http::error::AppError;
use crate::state::AppState;

/// The authenticated caller. Extracting this validates the bearer token.
pub struct CurrentUser(pub UserIdentity);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts)?;

        let identity = state
            .auth
            .resolve_token(&token)
            .await
            .map_err(|e| AppError::Internal(format!("Auth lookup failed: {e}")))?;

        match identity {
            Some(identity) => Ok(CurrentUser(identity)),
            None => Err(AppError::Unauthorized("Invalid token".to_string())),
        }
    }
}

/// Authenticated caller that must hold the admin role.
pub struct AdminUser(pub UserIdentity);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(identity) = CurrentUser::from_request_parts(parts, state).await?;
        if !identity.is_admin() {
            return Err(AppError::Unauthorized("Admin role required".to_string()));
        }
        Ok(AdminUser(identity))
    }
}

/// Extract the bearer token from the request.
fn extract_token(parts: &Parts) -> Result<String, AppError> {
    // Try Authorization: Bearer <token>
    if let Some(auth) = parts.headers.get("authorization") {
        let auth_str = auth.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid Authorization header encoding".to_string())
        })?;
        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            return Ok(token.trim().to_string());
        }
    }

    // Try X-API-Key header
    if let Some(key) = parts.headers.get("x-api-key") {
        let key_str = key
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid X-API-Key header encoding".to_string()))?;
        return Ok(key_str.trim().to_string());
    }

    // Try ?token= query parameter (WebSocket upgrades)
    if let Some(token) = query_param(parts.uri.query(), "token") {
        return Ok(token);
    }

    Err(AppError::Unauthorized(
        "Missing token. Provide via 'Authorization: Bearer <token>', 'X-API-Key', or '?token='."
            .to_string(),
    ))
}

/// Minimal query-string lookup. Tokens are URL-safe hex, so no percent
/// decoding is needed.
fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}
