//! Infrastructure implementations.
//!
//! Contains port trait implementations for external dependencies.

pub mod auth;
pub mod clock;
pub mod config;
pub mod generation_client;
pub mod http_errors;
pub mod memory_store;
pub mod platforms;
pub mod ports;
pub mod retry;
pub mod sqlite_store;
