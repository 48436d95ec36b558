//! Publication use cases.
//!
//! `PublishContent` fans a record out to several platforms concurrently and
//! settles its status from the combined outcome. `UnpublishContent` removes
//! one platform's post again.

mod unpublish;

pub use unpublish::UnpublishContent;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use quillcast_domain::{Content, ContentId, ContentStatus, Platform, PublishResult};

use crate::infrastructure::ports::{PlatformAdapter, PostRequest, PublishError, RepoError};
use crate::infrastructure::retry::{with_retry, RetryConfig};
use crate::use_cases::content::{ContentLifecycle, TransitionDetail, TransitionError};

/// Registered adapters, keyed by the platform they serve.
pub type AdapterRegistry = HashMap<Platform, Arc<dyn PlatformAdapter>>;

pub fn adapter_registry(adapters: Vec<Arc<dyn PlatformAdapter>>) -> AdapterRegistry {
    adapters.into_iter().map(|a| (a.platform(), a)).collect()
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub retry: RetryConfig,
    /// Per-attempt bound on a single adapter call.
    pub adapter_timeout: Duration,
    /// When false, platforms holding a live post from an earlier dispatch are skipped.
    pub allow_redispatch: bool,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            adapter_timeout: Duration::from_secs(30),
            allow_redispatch: true,
        }
    }
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub content_id: ContentId,
    pub status: ContentStatus,
    pub results: BTreeMap<Platform, PublishResult>,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Content not found: {0}")]
    NotFound(ContentId),
    #[error("Content {id} cannot be published from {status}")]
    NotPublishable { id: ContentId, status: ContentStatus },
    /// Another writer moved the record while platforms were being called.
    #[error("Content {id} changed during dispatch (now {actual})")]
    Conflict { id: ContentId, actual: ContentStatus },
    #[error(transparent)]
    Platform(#[from] PublishError),
    #[error(transparent)]
    Transition(TransitionError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<TransitionError> for DispatchError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::NotFound(id) => DispatchError::NotFound(id),
            TransitionError::Conflict { id, actual, .. } => DispatchError::Conflict { id, actual },
            TransitionError::Repo(e) => DispatchError::Repo(e),
            other => DispatchError::Transition(other),
        }
    }
}

/// Publishes a record to a set of platforms.
pub struct PublishContent {
    lifecycle: Arc<ContentLifecycle>,
    adapters: Arc<AdapterRegistry>,
    settings: DispatchSettings,
}

impl PublishContent {
    pub fn new(
        lifecycle: Arc<ContentLifecycle>,
        adapters: Arc<AdapterRegistry>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            lifecycle,
            adapters,
            settings,
        }
    }

    /// Dispatch a record to `platforms`.
    ///
    /// A `draft` or `scheduled` record is settled to `published` or `failed`.
    /// A record that is already `published` is dispatched again without a
    /// status change; only its per-platform results are merged.
    pub async fn execute(
        &self,
        content_id: ContentId,
        platforms: &[Platform],
    ) -> Result<DispatchReport, DispatchError> {
        self.dispatch(content_id, platforms, None).await
    }

    /// Dispatch a record the scheduler found due.
    ///
    /// Fails with `Conflict` unless the record is still `scheduled`, so a
    /// record published in the meantime is not dispatched a second time.
    pub async fn execute_scheduled(
        &self,
        content_id: ContentId,
        platforms: &[Platform],
    ) -> Result<DispatchReport, DispatchError> {
        self.dispatch(content_id, platforms, Some(ContentStatus::Scheduled))
            .await
    }

    async fn dispatch(
        &self,
        content_id: ContentId,
        platforms: &[Platform],
        required: Option<ContentStatus>,
    ) -> Result<DispatchReport, DispatchError> {
        let targets: BTreeSet<Platform> = platforms.iter().copied().collect();
        if targets.is_empty() {
            return Err(DispatchError::Validation(
                "at least one platform is required".to_string(),
            ));
        }

        let content = self.lifecycle.get(content_id).await?;
        let from = content.status;
        if required.is_some_and(|required| required != from) {
            return Err(DispatchError::Conflict {
                id: content_id,
                actual: from,
            });
        }
        let redispatch = from == ContentStatus::Published;
        if !redispatch && !from.is_publishable() {
            return Err(DispatchError::NotPublishable {
                id: content_id,
                status: from,
            });
        }

        tracing::info!(
            content_id = %content_id,
            platforms = ?targets,
            redispatch,
            "Dispatching content"
        );

        let attempts = targets
            .iter()
            .map(|&platform| self.dispatch_one(&content, platform));
        let results: BTreeMap<Platform, PublishResult> = join_all(attempts)
            .await
            .into_iter()
            .map(|r| (r.platform, r))
            .collect();

        let succeeded = results.values().filter(|r| r.success).count();
        let settled = if redispatch {
            self.lifecycle
                .record_publish_results(content_id, from, results.values().cloned().collect())
                .await
        } else {
            let (to, detail) = if succeeded > 0 {
                (ContentStatus::Published, TransitionDetail::new())
            } else {
                (
                    ContentStatus::Failed,
                    TransitionDetail::new().with_error("all platforms failed"),
                )
            };
            self.lifecycle
                .transition(
                    content_id,
                    from,
                    to,
                    detail.with_publish_results(results.values().cloned()),
                )
                .await
        };
        let updated = settled.inspect_err(|e| {
            tracing::warn!(
                content_id = %content_id,
                error = %e,
                "Dispatch results discarded"
            );
        })?;

        tracing::info!(
            content_id = %content_id,
            status = %updated.status,
            succeeded,
            total = results.len(),
            "Dispatch settled"
        );

        Ok(DispatchReport {
            content_id,
            status: updated.status,
            results,
        })
    }

    async fn dispatch_one(&self, content: &Content, platform: Platform) -> PublishResult {
        if !self.settings.allow_redispatch {
            if let Some(previous) = content.publish_result(platform).filter(|r| r.is_live()) {
                tracing::debug!(
                    content_id = %content.id,
                    platform = %platform,
                    "Keeping existing post"
                );
                return previous;
            }
        }

        let Some(adapter) = self.adapters.get(&platform) else {
            return PublishResult::failed(
                platform,
                PublishError::NotConfigured(platform).to_string(),
                0,
                self.lifecycle.now(),
            );
        };

        let post = PostRequest::for_platform(content, platform);
        let timeout = self.settings.adapter_timeout;
        let operation = format!("publish.{}", platform);
        let outcome = with_retry(
            &self.settings.retry,
            &operation,
            PublishError::is_retryable,
            || async {
                tokio::time::timeout(timeout, adapter.create_post(&post))
                    .await
                    .unwrap_or_else(|_| {
                        Err(PublishError::transient(
                            platform,
                            format!("timed out after {}s", timeout.as_secs()),
                        ))
                    })
            },
        )
        .await;

        let now = self.lifecycle.now();
        match outcome {
            Ok(done) => PublishResult::succeeded(
                platform,
                done.value.external_id,
                done.value.external_url,
                done.attempts,
                now,
            ),
            Err(failure) => {
                PublishResult::failed(platform, failure.error.to_string(), failure.attempts, now)
            }
        }
    }
}
