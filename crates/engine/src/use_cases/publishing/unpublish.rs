//! Remove a published post from one platform.

use std::sync::Arc;

use quillcast_domain::{ContentId, Platform, PublishResult};

use super::{AdapterRegistry, DispatchError, DispatchSettings};
use crate::infrastructure::ports::PublishError;
use crate::infrastructure::retry::with_retry;
use crate::use_cases::content::ContentLifecycle;

/// Deletes the external post and stamps `deleted_at` on the stored result.
///
/// The record's status is left as it is.
pub struct UnpublishContent {
    lifecycle: Arc<ContentLifecycle>,
    adapters: Arc<AdapterRegistry>,
    settings: DispatchSettings,
}

impl UnpublishContent {
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

    pub async fn execute(
        &self,
        content_id: ContentId,
        platform: Platform,
    ) -> Result<PublishResult, DispatchError> {
        let content = self.lifecycle.get(content_id).await?;

        let (mut result, external_id) = match content.publish_result(platform) {
            Some(result) if result.is_live() => match result.external_id.clone() {
                Some(external_id) => (result, external_id),
                None => {
                    return Err(DispatchError::Validation(format!(
                        "{} result for content {} has no external id",
                        platform, content_id
                    )))
                }
            },
            _ => {
                return Err(DispatchError::Validation(format!(
                    "content {} has no live {} post",
                    content_id, platform
                )))
            }
        };

        let adapter = self
            .adapters
            .get(&platform)
            .ok_or(PublishError::NotConfigured(platform))?;

        let timeout = self.settings.adapter_timeout;
        let operation = format!("unpublish.{}", platform);
        with_retry(
            &self.settings.retry,
            &operation,
            PublishError::is_retryable,
            || async {
                tokio::time::timeout(timeout, adapter.delete_post(&external_id))
                    .await
                    .unwrap_or_else(|_| {
                        Err(PublishError::transient(
                            platform,
                            format!("timed out after {}s", timeout.as_secs()),
                        ))
                    })
            },
        )
        .await
        .map_err(|failure| DispatchError::Platform(failure.error))?;

        result.deleted_at = Some(self.lifecycle.now());
        self.lifecycle
            .record_publish_results(content_id, content.status, vec![result.clone()])
            .await?;

        tracing::info!(
            content_id = %content_id,
            platform = %platform,
            external_id = %external_id,
            "Post removed"
        );
        Ok(result)
    }
}
