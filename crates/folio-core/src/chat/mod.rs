//! Chat core: persistence port, connection registry, and protocol service.

pub mod registry;
pub mod repository;
pub mod service;
