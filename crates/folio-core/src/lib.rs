//! Business logic and trait definitions for the Folio support chat.
//!
//! This crate defines the "ports" (repository and auth provider traits) that
//! the infrastructure layer implements, plus the connection registry and the
//! chat service that drives message fan-out. It depends only on
//! `folio-types` -- never on `folio-infra` or any database/IO crate.

pub mod auth;
pub mod chat;
