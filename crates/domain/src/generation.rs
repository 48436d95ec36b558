//! GenerationRequest - one client-submitted generation job within a session.

use crate::content::{ContentType, Metadata};
use crate::{CampaignId, ContentId, DomainError};

/// A validated request to generate content.
///
/// Transient: never persisted on its own, it seeds a `Content` record.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub content_type: ContentType,
    pub prompt: String,
    pub title: Option<String>,
    pub campaign_id: Option<CampaignId>,
    /// Existing `queued` record to generate into, instead of creating a new one.
    pub content_id: Option<ContentId>,
    pub metadata: Metadata,
}

impl GenerationRequest {
    /// Validate the required fields.
    ///
    /// Fails when the content type or prompt is missing, blank, or the
    /// content type is not one of the known kinds.
    pub fn new(content_type: Option<&str>, prompt: Option<&str>) -> Result<Self, DomainError> {
        let (Some(raw_type), Some(prompt)) = (
            content_type.filter(|s| !s.trim().is_empty()),
            prompt.filter(|s| !s.trim().is_empty()),
        ) else {
            return Err(DomainError::validation(
                "Missing required fields: type and prompt",
            ));
        };

        Ok(Self {
            content_type: raw_type.parse()?,
            prompt: prompt.to_string(),
            title: None,
            campaign_id: None,
            content_id: None,
            metadata: Metadata::new(),
        })
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_campaign(mut self, campaign_id: Option<CampaignId>) -> Self {
        self.campaign_id = campaign_id;
        self
    }

    pub fn with_content_id(mut self, content_id: Option<ContentId>) -> Self {
        self.content_id = content_id;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// The prompt sent to the generation backend.
    pub fn build_prompt(&self) -> String {
        let mut prompt = String::from(self.content_type.guidance());
        if let Some(title) = &self.title {
            prompt.push_str("\nTitle: ");
            prompt.push_str(title);
        }
        prompt.push_str("\n\n");
        prompt.push_str(self.prompt.trim());
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_prompt() {
        let err = GenerationRequest::new(Some("blog_post"), None).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rejects_blank_type() {
        assert!(GenerationRequest::new(Some("  "), Some("Write about X")).is_err());
    }

    #[test]
    fn rejects_unknown_type() {
        let err = GenerationRequest::new(Some("haiku"), Some("Write about X")).unwrap_err();
        assert!(err.to_string().contains("Unknown content type"));
    }

    #[test]
    fn prompt_includes_guidance_and_title() {
        let request = GenerationRequest::new(Some("blog_post"), Some("Write about X"))
            .unwrap()
            .with_title(Some("Spring Sale".into()));
        let prompt = request.build_prompt();
        assert!(prompt.starts_with(ContentType::BlogPost.guidance()));
        assert!(prompt.contains("Title: Spring Sale"));
        assert!(prompt.ends_with("Write about X"));
    }

    #[test]
    fn blank_title_is_dropped() {
        let request = GenerationRequest::new(Some("email"), Some("Promo"))
            .unwrap()
            .with_title(Some("   ".into()));
        assert!(request.title.is_none());
    }
}
