//! Live generation use case.
//!
//! Streams one generation request into a content record while relaying each
//! fragment to the requesting session. A disconnect never aborts the work:
//! the result is still persisted, only the outbound messages are dropped.
//! Queued records generate through the same path with no session attached.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use futures_util::StreamExt;
use quillcast_domain::{
    CampaignId, Content, ContentId, ContentStatus, DomainError, GenerationRequest, SessionId,
    UserId,
};
use quillcast_shared::{GenerateContent as GeneratePayload, ServerMessage};

use crate::api::connections::SessionRegistry;
use crate::infrastructure::ports::{GenerationError, GenerationPort};
use crate::infrastructure::retry::{with_retry, RetryConfig};
use crate::use_cases::content::{ContentLifecycle, TransitionDetail, TransitionError};

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub max_tokens: u32,
    /// Longest silence tolerated between two fragments.
    pub idle_timeout: Duration,
    /// Applies to opening the stream only.
    pub retry: RetryConfig,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_tokens: 3000,
            idle_timeout: Duration::from_secs(60),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationFailure {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("Generation already in progress for content {0}")]
    InProgress(ContentId),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("Generation failed for content {content_id}: {source}")]
    Generation {
        content_id: ContentId,
        source: GenerationError,
    },
}

/// Removes a content id from the in-flight set when generation ends.
struct InFlightGuard {
    in_flight: Arc<DashSet<ContentId>>,
    content_id: ContentId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.content_id);
    }
}

/// Drives generation requests for live sessions and queued records.
pub struct GenerateContent {
    lifecycle: Arc<ContentLifecycle>,
    generator: Arc<dyn GenerationPort>,
    sessions: Arc<SessionRegistry>,
    settings: GenerationSettings,
    in_flight: Arc<DashSet<ContentId>>,
}

impl GenerateContent {
    pub fn new(
        lifecycle: Arc<ContentLifecycle>,
        generator: Arc<dyn GenerationPort>,
        sessions: Arc<SessionRegistry>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            lifecycle,
            generator,
            sessions,
            settings,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    pub fn is_generating(&self, content_id: ContentId) -> bool {
        self.in_flight.contains(&content_id)
    }

    /// Run one request to completion.
    ///
    /// Every failure is also reported to the session as an `error` message.
    pub async fn execute(
        &self,
        session_id: SessionId,
        owner: UserId,
        payload: GeneratePayload,
    ) -> Result<ContentId, GenerationFailure> {
        let result = self.run(session_id, owner, payload).await;
        if let Err(e) = &result {
            let message = match e {
                GenerationFailure::Generation { source, .. } => {
                    format!("Generation failed: {}", source)
                }
                other => other.to_string(),
            };
            self.sessions.send(session_id, ServerMessage::error(message));
        }
        result
    }

    /// Validate a request and persist it as a `queued` record.
    ///
    /// Returns the record together with the prompt to generate it from.
    pub async fn enqueue(
        &self,
        owner: UserId,
        payload: GeneratePayload,
    ) -> Result<(Content, String), GenerationFailure> {
        let request = Self::request(payload)?;
        let content = Content::new(owner, request.content_type, self.lifecycle.now())
            .with_campaign(request.campaign_id)
            .with_title(request.title.clone())
            .with_metadata(request.metadata.clone());
        let content = self.lifecycle.create(content).await?;
        tracing::info!(
            content_id = %content.id,
            content_type = %request.content_type,
            "Content queued"
        );
        Ok((content, request.build_prompt()))
    }

    /// Generate a `queued` record with no session attached.
    pub async fn execute_queued(
        &self,
        content_id: ContentId,
        prompt: &str,
    ) -> Result<ContentId, GenerationFailure> {
        let _guard = self.reserve(content_id)?;
        self.lifecycle
            .transition(
                content_id,
                ContentStatus::Queued,
                ContentStatus::Generating,
                TransitionDetail::new(),
            )
            .await?;
        tracing::info!(content_id = %content_id, "Background generation started");

        self.generate(content_id, prompt, None).await?;
        Ok(content_id)
    }

    fn request(payload: GeneratePayload) -> Result<GenerationRequest, GenerationFailure> {
        Ok(GenerationRequest::new(
            payload.content_type.as_deref(),
            payload.prompt.as_deref(),
        )?
        .with_title(payload.title)
        .with_campaign(payload.campaign_id.map(CampaignId::from))
        .with_content_id(payload.content_id.map(ContentId::from))
        .with_metadata(payload.metadata))
    }

    async fn run(
        &self,
        session_id: SessionId,
        owner: UserId,
        payload: GeneratePayload,
    ) -> Result<ContentId, GenerationFailure> {
        let request = Self::request(payload)?;
        let (content, _guard) = self.claim(owner, &request).await?;
        let content_id = content.id;

        self.sessions.send(
            session_id,
            ServerMessage::Started {
                content_id: content_id.to_uuid(),
            },
        );

        tracing::info!(
            session_id = %session_id,
            content_id = %content_id,
            content_type = %request.content_type,
            "Generation started"
        );

        self.generate(content_id, &request.build_prompt(), Some(session_id))
            .await?;
        self.sessions.send(
            session_id,
            ServerMessage::Complete {
                content_id: content_id.to_uuid(),
            },
        );
        Ok(content_id)
    }

    /// Stream the body of a `generating` record and settle it to `draft` or `failed`.
    ///
    /// Fragments are relayed to `session` when one is attached.
    async fn generate(
        &self,
        content_id: ContentId,
        prompt: &str,
        session: Option<SessionId>,
    ) -> Result<(), GenerationFailure> {
        let mut body = String::new();
        match self.stream_into(session, prompt, &mut body).await {
            Ok(()) => {
                self.lifecycle
                    .transition(
                        content_id,
                        ContentStatus::Generating,
                        ContentStatus::Draft,
                        TransitionDetail::new().with_body(body),
                    )
                    .await?;
                tracing::info!(content_id = %content_id, "Generation complete");
                Ok(())
            }
            Err(source) => {
                tracing::warn!(content_id = %content_id, error = %source, "Generation failed");
                self.lifecycle
                    .transition(
                        content_id,
                        ContentStatus::Generating,
                        ContentStatus::Failed,
                        TransitionDetail::new()
                            .with_body(body)
                            .with_error(source.to_string()),
                    )
                    .await?;
                Err(GenerationFailure::Generation { content_id, source })
            }
        }
    }

    fn reserve(&self, content_id: ContentId) -> Result<InFlightGuard, GenerationFailure> {
        if !self.in_flight.insert(content_id) {
            return Err(GenerationFailure::InProgress(content_id));
        }
        Ok(InFlightGuard {
            in_flight: self.in_flight.clone(),
            content_id,
        })
    }

    /// Create a fresh `generating` record, or move the caller's `queued` record into it.
    async fn claim(
        &self,
        owner: UserId,
        request: &GenerationRequest,
    ) -> Result<(Content, InFlightGuard), GenerationFailure> {
        let content_id = request.content_id.unwrap_or_default();
        let guard = self.reserve(content_id)?;

        let content = match request.content_id {
            Some(id) => {
                let existing = self.lifecycle.get_owned(id, owner).await?;
                if existing.status == ContentStatus::Generating {
                    return Err(GenerationFailure::InProgress(id));
                }
                self.lifecycle
                    .transition(
                        id,
                        ContentStatus::Queued,
                        ContentStatus::Generating,
                        TransitionDetail::new(),
                    )
                    .await?
            }
            None => {
                let content =
                    Content::generating(owner, request.content_type, self.lifecycle.now())
                        .with_id(content_id)
                        .with_campaign(request.campaign_id)
                        .with_title(request.title.clone())
                        .with_metadata(request.metadata.clone());
                self.lifecycle.create(content).await?
            }
        };

        Ok((content, guard))
    }

    /// Accumulate fragments into `body`, relaying each to `session`.
    ///
    /// Only opening the stream is retried; a failure after the first
    /// fragment ends the generation. Relaying never waits on the client.
    async fn stream_into(
        &self,
        session: Option<SessionId>,
        prompt: &str,
        body: &mut String,
    ) -> Result<(), GenerationError> {
        let max_tokens = self.settings.max_tokens;
        let mut stream = with_retry(
            &self.settings.retry,
            "generation.open",
            GenerationError::is_retryable,
            || self.generator.stream_tokens(prompt, max_tokens),
        )
        .await
        .map_err(|failure| failure.error)?
        .value;

        loop {
            let next = tokio::time::timeout(self.settings.idle_timeout, stream.next())
                .await
                .map_err(|_| {
                    GenerationError::Transient(format!(
                        "no output for {}s",
                        self.settings.idle_timeout.as_secs()
                    ))
                })?;

            match next {
                None => return Ok(()),
                Some(Ok(fragment)) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    body.push_str(&fragment);
                    if let Some(session_id) = session {
                        self.sessions
                            .send(session_id, ServerMessage::Chunk { content: fragment });
                    }
                }
                Some(Err(e)) => return Err(e),
            }
        }
    }
}
