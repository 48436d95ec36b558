//! External service ports: generation backend, publishing platforms, identity.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use quillcast_domain::{Content, ContentType, Platform, UserId};

use super::error::{AuthError, GenerationError, PublishError};

/// Incremental text fragments from the generation backend.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationPort: Send + Sync {
    /// Open a streaming completion for `prompt`.
    ///
    /// Errors returned here happen before any fragment was produced; errors
    /// yielded by the stream happen mid-generation.
    async fn stream_tokens(
        &self,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<TokenStream, GenerationError>;
}

/// Platform-ready payload derived from a content record.
#[derive(Debug, Clone, PartialEq)]
pub struct PostRequest {
    pub title: String,
    /// Full body for long-form platforms, adapted text for social ones.
    pub text: String,
    pub excerpt: String,
    pub tags: Vec<String>,
    pub content_type: ContentType,
}

/// Characters kept for `PostRequest::excerpt`.
pub const EXCERPT_CHARS: usize = 200;

impl PostRequest {
    pub fn for_platform(content: &Content, platform: Platform) -> Self {
        let title = content.display_title();
        let text = match platform {
            Platform::Wordpress | Platform::Email => content.body.clone(),
            _ => {
                let raw = if content.content_type == ContentType::SocialPost || title.is_empty() {
                    content.body.as_str()
                } else {
                    title.as_str()
                };
                platform.adapt_text(raw)
            }
        };

        Self {
            excerpt: content.body.chars().take(EXCERPT_CHARS).collect(),
            tags: content.keywords(),
            content_type: content.content_type,
            title,
            text,
        }
    }
}

/// Identifier of a post created on an external platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalPost {
    pub external_id: String,
    pub external_url: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    async fn create_post(&self, post: &PostRequest) -> Result<ExternalPost, PublishError>;

    async fn delete_post(&self, external_id: &str) -> Result<(), PublishError>;
}

/// Resolves a connection credential to a user.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<UserId, AuthError>;
}
