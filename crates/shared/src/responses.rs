//! Response DTOs for the publish trigger surface.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-platform outcome (wire format).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishResultData {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: u32,
    pub last_attempted_at: DateTime<Utc>,
}

/// Result of one dispatch, keyed by platform name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub content_id: Uuid,
    /// Content status after the dispatch (`published` or `failed`)
    pub status: String,
    pub results: BTreeMap<String, PublishResultData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnpublishResponse {
    pub content_id: Uuid,
    pub platform: String,
    pub deleted_at: DateTime<Utc>,
}

/// Result of `POST /api/content/{id}/schedule`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleResponse {
    pub content_id: Uuid,
    pub status: String,
    pub scheduled_for: DateTime<Utc>,
    pub platforms: Vec<String>,
}

/// Body of a `202 Accepted` answer to `POST /api/content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateContentResponse {
    pub content_id: Uuid,
    pub status: String,
}
