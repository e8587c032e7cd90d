//! Authentication port consumed by the HTTP and WebSocket layers.

pub mod provider;
