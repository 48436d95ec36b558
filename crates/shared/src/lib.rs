//! Quillcast Protocol - types shared between the engine and its clients.
//!
//! - WebSocket envelopes for live generation sessions (`ClientMessage`, `ServerMessage`)
//! - Request/response DTOs for the HTTP trigger surface
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - serde, uuid, chrono, and thiserror only
//! 2. **No business logic** - pure data types and serialization
//! 3. **No domain IDs** - raw `uuid::Uuid` and platform names as strings

pub mod messages;
pub mod requests;
pub mod responses;

pub use messages::{ClientMessage, GenerateContent, ProtocolError, ServerMessage};
pub use requests::{CreateContentRequest, PublishRequest, ScheduleRequest};
pub use responses::{
    CreateContentResponse, DispatchResponse, PublishResultData, ScheduleResponse,
    UnpublishResponse,
};
