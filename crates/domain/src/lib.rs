//! Quillcast Domain - content lifecycle vocabulary shared by every layer.
//!
//! Pure types and invariants only. No I/O, no async.

pub mod content;
pub mod error;
pub mod generation;
pub mod ids;
pub mod platform;

pub use content::{Content, ContentStatus, ContentType, Metadata, PUBLISH_RESULTS_KEY};
pub use error::DomainError;
pub use generation::GenerationRequest;
pub use ids::{CampaignId, ContentId, SessionId, UserId};
pub use platform::{Platform, PublishResult};
