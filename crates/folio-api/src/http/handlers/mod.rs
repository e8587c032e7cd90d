//! HTTP request handlers.

pub mod auth;
pub mod chat;
pub mod inbox;
pub mod ws;
