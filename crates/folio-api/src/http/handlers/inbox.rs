//! Admin inbox and per-conversation views.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use folio_types::chat::Inbox;
use uuid::Uuid;

use crate::http::error::AppError;
use crate::http::extractors::auth::AdminUser;
use crate::http::handlers::chat::ConversationView;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// `GET /api/v1/chat/inbox` - every conversation ordered by recency with
/// unread counts and the total across all of them. Admin only.
pub async fn inbox(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<ApiResponse<Inbox>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let inbox = state.chat.inbox().await?;

    Ok(Json(ApiResponse::success(
        inbox,
        request_id,
        start.elapsed().as_millis() as u64,
    )))
}

/// `GET /api/v1/chat/conversations/{id}/messages` - one conversation with
/// full history. Opening the view marks user-authored messages as read.
/// Admin only; unknown ids are a 404.
pub async fn conversation_messages(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(conversation_id): Path<i64>,
) -> Result<Json<ApiResponse<ConversationView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let (conversation, messages) = state.chat.admin_view(conversation_id).await?;

    Ok(Json(ApiResponse::success(
        ConversationView {
            conversation,
            messages,
        },
        request_id,
        start.elapsed().as_millis() as u64,
    )))
}
