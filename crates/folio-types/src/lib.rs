//! Shared domain types for the Folio support chat.
//!
//! This crate contains the types used across the chat backend: conversations,
//! messages, user identities, fan-out events, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod chat;
pub mod error;
pub mod event;
pub mod identity;
