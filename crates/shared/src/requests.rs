//! Request DTOs for the HTTP trigger surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /api/content`.
///
/// Fields are optional so missing ones are reported as a validation error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateContentRequest {
    #[serde(rename = "type", alias = "content_type")]
    pub content_type: Option<String>,
    pub prompt: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "campaignId")]
    pub campaign_id: Option<Uuid>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Body of `POST /api/content/{id}/publish`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRequest {
    /// Platform names, e.g. `["wordpress", "twitter"]`
    pub platforms: Vec<String>,
}

/// Body of `POST /api/content/{id}/schedule`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub scheduled_for: DateTime<Utc>,
    pub platforms: Vec<String>,
}
