//! SQLite implementations of the folio-core ports.

pub mod auth;
pub mod conversation;
pub mod pool;
