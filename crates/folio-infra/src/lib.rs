//! Infrastructure layer for the Folio support chat.
//!
//! Contains implementations of the traits defined in `folio-core`:
//! SQLite-backed conversation persistence and token authentication.

pub mod sqlite;
