//! Conversation view for the owning user.

use std::time::Instant;

use axum::Json;
use axum::extract::State;
use folio_types::chat::{Conversation, Message};
use serde::Serialize;
use uuid::Uuid;

use crate::http::error::AppError;
use crate::http::extractors::auth::CurrentUser;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ConversationView {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

/// `GET /api/v1/chat/messages` - the caller's own conversation with full
/// history. Opening the view marks admin-authored messages as read.
pub async fn messages(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<ConversationView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let (conversation, messages) = state.chat.user_view(&user).await?;

    Ok(Json(ApiResponse::success(
        ConversationView {
            conversation,
            messages,
        },
        request_id,
        start.elapsed().as_millis() as u64,
    )))
}
