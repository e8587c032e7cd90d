//! HTTP and WebSocket layer for the Folio support chat.
//!
//! Axum-based API at `/api/v1/` with bearer-token authentication, an
//! envelope response format, and CORS support. The live chat runs over
//! `/api/v1/chat/ws`.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
