//! Content entity - the durable unit being generated and published.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::platform::{Platform, PublishResult};
use crate::{CampaignId, ContentId, DomainError, UserId};

/// Free-form metadata attached to a content record.
pub type Metadata = serde_json::Map<String, Value>;

/// Metadata key holding the per-platform publish results.
pub const PUBLISH_RESULTS_KEY: &str = "publish_results";
/// Metadata key holding the platforms a scheduled record will be published to.
pub const SCHEDULED_PLATFORMS_KEY: &str = "scheduled_platforms";
/// Metadata key holding the most recent failure reason.
pub const ERROR_KEY: &str = "error";

/// Kind of content requested from the generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Long-form article
    BlogPost,
    /// Short message
    Email,
    SocialPost,
    VideoScript,
    AdCopy,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::BlogPost => "blog_post",
            ContentType::Email => "email",
            ContentType::SocialPost => "social_post",
            ContentType::VideoScript => "video_script",
            ContentType::AdCopy => "ad_copy",
        }
    }

    /// Writing guidance prepended to the user's prompt.
    pub fn guidance(&self) -> &'static str {
        match self {
            ContentType::BlogPost => concat!(
                "Write a well-structured long-form blog article ",
                "with headings and a clear conclusion."
            ),
            ContentType::Email => {
                "Write a concise marketing email with a subject-worthy opening line."
            }
            ContentType::SocialPost => "Write a short, engaging social media post.",
            ContentType::VideoScript => "Write a video script with scene directions and narration.",
            ContentType::AdCopy => "Write punchy advertising copy with a clear call to action.",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "blog_post" => Ok(ContentType::BlogPost),
            "email" => Ok(ContentType::Email),
            "social_post" => Ok(ContentType::SocialPost),
            "video_script" => Ok(ContentType::VideoScript),
            "ad_copy" => Ok(ContentType::AdCopy),
            _ => Err(DomainError::validation(format!(
                "Unknown content type: '{}'. Valid values: blog_post, email, social_post, \
                video_script, ad_copy",
                s
            ))),
        }
    }
}

/// Lifecycle status of a content record.
///
/// ```text
/// queued -> generating -> draft -> scheduled -> published
///                 \          \          \-----> failed
///                  \          \--> published | failed | archived
///                   \--> failed          published -> archived
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Queued,
    Generating,
    Draft,
    Scheduled,
    Published,
    Failed,
    Archived,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Queued => "queued",
            ContentStatus::Generating => "generating",
            ContentStatus::Draft => "draft",
            ContentStatus::Scheduled => "scheduled",
            ContentStatus::Published => "published",
            ContentStatus::Failed => "failed",
            ContentStatus::Archived => "archived",
        }
    }

    /// Whether the lifecycle permits moving from `self` to `to`.
    pub fn can_transition_to(self, to: ContentStatus) -> bool {
        use ContentStatus::*;
        matches!(
            (self, to),
            (Queued, Generating)
                | (Generating, Draft)
                | (Generating, Failed)
                | (Draft, Scheduled)
                | (Draft, Published)
                | (Scheduled, Published)
                | (Draft, Failed)
                | (Scheduled, Failed)
                | (Published, Archived)
                | (Draft, Archived)
        )
    }

    /// States from which a dispatch may be attempted.
    pub fn is_publishable(self) -> bool {
        matches!(self, ContentStatus::Draft | ContentStatus::Scheduled)
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(ContentStatus::Queued),
            "generating" => Ok(ContentStatus::Generating),
            "draft" => Ok(ContentStatus::Draft),
            "scheduled" => Ok(ContentStatus::Scheduled),
            "published" => Ok(ContentStatus::Published),
            "failed" => Ok(ContentStatus::Failed),
            "archived" => Ok(ContentStatus::Archived),
            _ => Err(DomainError::parse(format!("Unknown content status: '{}'", s))),
        }
    }
}

/// A piece of generated marketing content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub id: ContentId,
    pub owner_id: UserId,
    pub campaign_id: Option<CampaignId>,
    pub content_type: ContentType,
    pub title: Option<String>,
    /// Empty while generating; immutable once published, failed, or archived.
    pub body: String,
    pub status: ContentStatus,
    pub metadata: Metadata,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Content {
    /// Create a new record in `queued` status.
    pub fn new(owner_id: UserId, content_type: ContentType, now: DateTime<Utc>) -> Self {
        Self {
            id: ContentId::new(),
            owner_id,
            campaign_id: None,
            content_type,
            title: None,
            body: String::new(),
            status: ContentStatus::Queued,
            metadata: Metadata::new(),
            scheduled_for: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a record that enters the lifecycle directly in `generating`.
    pub fn generating(owner_id: UserId, content_type: ContentType, now: DateTime<Utc>) -> Self {
        let mut content = Self::new(owner_id, content_type, now);
        content.status = ContentStatus::Generating;
        content
    }

    pub fn with_id(mut self, id: ContentId) -> Self {
        self.id = id;
        self
    }

    pub fn with_campaign(mut self, campaign_id: Option<CampaignId>) -> Self {
        self.campaign_id = campaign_id;
        self
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Title, falling back to the first line of the body.
    pub fn display_title(&self) -> String {
        match &self.title {
            Some(title) if !title.trim().is_empty() => title.clone(),
            _ => self
                .body
                .lines()
                .find(|l| !l.trim().is_empty())
                .map(|l| l.trim_start_matches('#').trim().to_string())
                .unwrap_or_default(),
        }
    }

    /// Replace the body. Only legal while generating.
    pub fn set_body(&mut self, body: impl Into<String>) -> Result<(), DomainError> {
        if self.status != ContentStatus::Generating {
            return Err(DomainError::invalid_state_transition(format!(
                "body of content {} is immutable in status {}",
                self.id, self.status
            )));
        }
        self.body = body.into();
        Ok(())
    }

    /// Append generated text. Only legal while generating.
    pub fn append_body(&mut self, chunk: &str) -> Result<(), DomainError> {
        if self.status != ContentStatus::Generating {
            return Err(DomainError::invalid_state_transition(format!(
                "cannot append to content {} in status {}",
                self.id, self.status
            )));
        }
        self.body.push_str(chunk);
        Ok(())
    }

    /// Move to `to`, enforcing the lifecycle table.
    pub fn move_to(&mut self, to: ContentStatus, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.status.can_transition_to(to) {
            return Err(DomainError::invalid_state_transition(format!(
                "{} -> {}",
                self.status, to
            )));
        }
        self.status = to;
        self.updated_at = now;
        if to == ContentStatus::Published && self.published_at.is_none() {
            self.published_at = Some(now);
        }
        Ok(())
    }

    /// Record a failure reason in metadata.
    pub fn record_error(&mut self, reason: impl Into<String>) {
        self.metadata
            .insert(ERROR_KEY.to_string(), Value::String(reason.into()));
    }

    pub fn error(&self) -> Option<&str> {
        self.metadata.get(ERROR_KEY).and_then(Value::as_str)
    }

    /// Per-platform publish results stored in metadata.
    ///
    /// Entries that fail to parse are skipped.
    pub fn publish_results(&self) -> BTreeMap<Platform, PublishResult> {
        let Some(Value::Object(map)) = self.metadata.get(PUBLISH_RESULTS_KEY) else {
            return BTreeMap::new();
        };
        map.iter()
            .filter_map(|(key, value)| {
                let platform = key.parse::<Platform>().ok()?;
                let result = serde_json::from_value::<PublishResult>(value.clone()).ok()?;
                Some((platform, result))
            })
            .collect()
    }

    pub fn publish_result(&self, platform: Platform) -> Option<PublishResult> {
        self.metadata
            .get(PUBLISH_RESULTS_KEY)
            .and_then(|v| v.get(platform.as_str()))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Store a publish result, replacing any earlier result for the same platform.
    pub fn record_publish_result(&mut self, result: &PublishResult) {
        let entry = self
            .metadata
            .entry(PUBLISH_RESULTS_KEY.to_string())
            .or_insert_with(|| Value::Object(Metadata::new()));
        if !entry.is_object() {
            *entry = Value::Object(Metadata::new());
        }
        if let (Value::Object(map), Ok(value)) = (entry, serde_json::to_value(result)) {
            map.insert(result.platform.as_str().to_string(), value);
        }
    }

    /// Platforms configured for the scheduled publication of this record.
    pub fn scheduled_platforms(&self) -> Vec<Platform> {
        self.metadata
            .get(SCHEDULED_PLATFORMS_KEY)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(|s| s.parse().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_scheduled_platforms(&mut self, platforms: &[Platform]) {
        let values = platforms
            .iter()
            .map(|p| Value::String(p.as_str().to_string()))
            .collect();
        self.metadata
            .insert(SCHEDULED_PLATFORMS_KEY.to_string(), Value::Array(values));
    }

    /// Tags for publishing, read from `metadata.keywords`.
    pub fn keywords(&self) -> Vec<String> {
        self.metadata
            .get("keywords")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn generation_path_transitions() {
        let mut content = Content::generating(UserId::new(), ContentType::BlogPost, now());
        content.append_body("Hello ").unwrap();
        content.append_body("world").unwrap();
        content.move_to(ContentStatus::Draft, now()).unwrap();
        assert_eq!(content.body, "Hello world");
        assert!(content.append_body("!").is_err());
    }

    #[test]
    fn published_and_archived_cannot_go_back() {
        for from in [ContentStatus::Published, ContentStatus::Archived] {
            for to in [
                ContentStatus::Queued,
                ContentStatus::Generating,
                ContentStatus::Draft,
                ContentStatus::Scheduled,
            ] {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be illegal");
            }
        }
    }

    #[test]
    fn legal_transition_table() {
        use ContentStatus::*;
        assert!(Queued.can_transition_to(Generating));
        assert!(Generating.can_transition_to(Draft));
        assert!(Generating.can_transition_to(Failed));
        assert!(Draft.can_transition_to(Scheduled));
        assert!(Scheduled.can_transition_to(Published));
        assert!(Scheduled.can_transition_to(Failed));
        assert!(Draft.can_transition_to(Archived));
        assert!(Published.can_transition_to(Archived));
        assert!(!Queued.can_transition_to(Draft));
        assert!(!Failed.can_transition_to(Published));
        assert!(!Scheduled.can_transition_to(Archived));
    }

    #[test]
    fn published_at_is_stamped_once() {
        let first = now();
        let mut content = Content::new(UserId::new(), ContentType::Email, first);
        content.status = ContentStatus::Draft;
        content.move_to(ContentStatus::Published, first).unwrap();
        assert_eq!(content.published_at, Some(first));
    }

    #[test]
    fn body_is_immutable_after_publish() {
        let mut content = Content::new(UserId::new(), ContentType::Email, now());
        content.status = ContentStatus::Published;
        assert!(content.set_body("rewrite").is_err());
    }

    #[test]
    fn publish_results_are_last_write_wins() {
        let mut content = Content::new(UserId::new(), ContentType::SocialPost, now());
        content.record_publish_result(&PublishResult::failed(
            Platform::Twitter,
            "rate limited",
            3,
            now(),
        ));
        content.record_publish_result(&PublishResult::succeeded(
            Platform::Twitter,
            "123",
            Some("https://twitter.com/i/web/status/123".into()),
            1,
            now(),
        ));

        let results = content.publish_results();
        assert_eq!(results.len(), 1);
        let twitter = &results[&Platform::Twitter];
        assert!(twitter.success);
        assert_eq!(twitter.external_id.as_deref(), Some("123"));
        assert!(twitter.error.is_none());
    }

    #[test]
    fn scheduled_platforms_round_trip_through_metadata() {
        let mut content = Content::new(UserId::new(), ContentType::BlogPost, now());
        content.set_scheduled_platforms(&[Platform::Wordpress, Platform::Linkedin]);
        assert_eq!(
            content.scheduled_platforms(),
            vec![Platform::Wordpress, Platform::Linkedin]
        );
    }

    #[test]
    fn display_title_falls_back_to_first_body_line() {
        let mut content = Content::generating(UserId::new(), ContentType::BlogPost, now());
        content.set_body("\n# Ten Tips for Spring\nBody text").unwrap();
        assert_eq!(content.display_title(), "Ten Tips for Spring");
    }

    #[test]
    fn parses_content_type() {
        assert_eq!("blog_post".parse::<ContentType>().unwrap(), ContentType::BlogPost);
        assert!(matches!(
            "podcast".parse::<ContentType>(),
            Err(DomainError::Validation(_))
        ));
    }
}
