//! Publishing platforms and per-platform dispatch outcomes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::DomainError;

/// An external destination content can be published to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Wordpress,
    Twitter,
    Facebook,
    Linkedin,
    Instagram,
    Email,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::Wordpress,
        Platform::Twitter,
        Platform::Facebook,
        Platform::Linkedin,
        Platform::Instagram,
        Platform::Email,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Wordpress => "wordpress",
            Platform::Twitter => "twitter",
            Platform::Facebook => "facebook",
            Platform::Linkedin => "linkedin",
            Platform::Instagram => "instagram",
            Platform::Email => "email",
        }
    }

    /// Maximum post length accepted by the platform, if it has one.
    pub fn max_text_len(&self) -> Option<usize> {
        match self {
            Platform::Twitter => Some(280),
            Platform::Facebook => Some(2000),
            Platform::Linkedin => Some(3000),
            Platform::Wordpress | Platform::Instagram | Platform::Email => None,
        }
    }

    /// Fit `text` to the platform's length limit.
    ///
    /// Twitter gets a trailing ellipsis when truncated; the others are cut.
    /// Counts characters, not bytes.
    pub fn adapt_text(&self, text: &str) -> String {
        let Some(limit) = self.max_text_len() else {
            return text.to_string();
        };
        if text.chars().count() <= limit {
            return text.to_string();
        }
        match self {
            Platform::Twitter => {
                let mut cut: String = text.chars().take(limit - 3).collect();
                cut.push_str("...");
                cut
            }
            _ => text.chars().take(limit).collect(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wordpress" => Ok(Platform::Wordpress),
            "twitter" | "x" => Ok(Platform::Twitter),
            "facebook" => Ok(Platform::Facebook),
            "linkedin" => Ok(Platform::Linkedin),
            "instagram" => Ok(Platform::Instagram),
            "email" => Ok(Platform::Email),
            _ => Err(DomainError::validation(format!(
                "Unknown platform: '{}'. Valid values: wordpress, twitter, facebook, \
                linkedin, instagram, email",
                s
            ))),
        }
    }
}

/// Outcome of the latest dispatch attempt to one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    pub platform: Platform,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: u32,
    pub last_attempted_at: DateTime<Utc>,
    /// Set when the external post was later removed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl PublishResult {
    pub fn succeeded(
        platform: Platform,
        external_id: impl Into<String>,
        external_url: Option<String>,
        attempts: u32,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            platform,
            success: true,
            external_id: Some(external_id.into()),
            external_url,
            error: None,
            attempts,
            last_attempted_at: at,
            deleted_at: None,
        }
    }

    pub fn failed(
        platform: Platform,
        error: impl Into<String>,
        attempts: u32,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            platform,
            success: false,
            external_id: None,
            external_url: None,
            error: Some(error.into()),
            attempts,
            last_attempted_at: at,
            deleted_at: None,
        }
    }

    /// A live post exists on the platform.
    pub fn is_live(&self) -> bool {
        self.success && self.deleted_at.is_none()
    }
}
