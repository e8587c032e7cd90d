//! Account registration handler.

use std::time::Instant;

use axum::Json;
use axum::extract::State;
use folio_core::auth::provider::AuthProvider;
use folio_types::identity::UserIdentity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: UserIdentity,
    /// Shown once. Only the hash is stored.
    pub token: String,
}

/// `POST /api/v1/auth/register` - create a regular user account and issue
/// its bearer token. No authentication required.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<RegisterResponse>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let username = req.username.trim();
    if username.is_empty() {
        return Err(AppError::Validation("Username must not be empty".to_string()));
    }

    let (user, token) = state.auth.register_user(username).await?;
    tracing::info!(user_id = user.id, username = %user.username, "registered user");

    Ok(Json(ApiResponse::success(
        RegisterResponse { user, token },
        request_id,
        start.elapsed().as_millis() as u64,
    )))
}
