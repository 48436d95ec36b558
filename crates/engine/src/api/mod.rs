//! API layer - HTTP and WebSocket entry points.

pub mod connections;
pub mod http;
pub mod websocket;

use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use axum::Router;

use crate::app::App;

pub use connections::{SessionInfo, SessionRegistry};

/// Every route the engine serves.
pub fn router() -> Router<Arc<App>> {
    http::routes().merge(websocket::routes())
}

/// The credential of an `Authorization: Bearer` header, if present.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string())
}
