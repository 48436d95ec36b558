//! Content lifecycle use case.
//!
//! Every status change in the engine goes through `ContentLifecycle::transition`,
//! which checks the lifecycle table and writes with a conditional update
//! keyed on the status the caller observed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use quillcast_domain::{
    Content, ContentId, ContentStatus, DomainError, Platform, PublishResult, UserId,
};

use crate::infrastructure::ports::{ClockPort, ContentRepo, RepoError};

/// Field updates applied together with a status change.
#[derive(Debug, Clone, Default)]
pub struct TransitionDetail {
    body: Option<String>,
    error: Option<String>,
    scheduled_for: Option<DateTime<Utc>>,
    scheduled_platforms: Option<Vec<Platform>>,
    publish_results: Vec<PublishResult>,
}

impl TransitionDetail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Final body. Only accepted when leaving `generating`.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_schedule(mut self, at: DateTime<Utc>, platforms: Vec<Platform>) -> Self {
        self.scheduled_for = Some(at);
        self.scheduled_platforms = Some(platforms);
        self
    }

    pub fn with_publish_results(
        mut self,
        results: impl IntoIterator<Item = PublishResult>,
    ) -> Self {
        self.publish_results.extend(results);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("Content not found: {0}")]
    NotFound(ContentId),
    #[error("Illegal transition {from} -> {to}")]
    Illegal {
        from: ContentStatus,
        to: ContentStatus,
    },
    /// The record is no longer in the status the caller expected.
    #[error("Content {id} is {actual}, expected {expected}")]
    Conflict {
        id: ContentId,
        expected: ContentStatus,
        actual: ContentStatus,
    },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Owns the content state machine.
pub struct ContentLifecycle {
    repo: Arc<dyn ContentRepo>,
    clock: Arc<dyn ClockPort>,
}

impl ContentLifecycle {
    pub fn new(repo: Arc<dyn ContentRepo>, clock: Arc<dyn ClockPort>) -> Self {
        Self { repo, clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Persist a new record. Records enter the lifecycle as `queued` or `generating`.
    pub async fn create(&self, content: Content) -> Result<Content, TransitionError> {
        if !matches!(
            content.status,
            ContentStatus::Queued | ContentStatus::Generating
        ) {
            return Err(DomainError::invalid_state_transition(format!(
                "new content cannot start in {}",
                content.status
            ))
            .into());
        }
        self.repo.insert(&content).await?;
        tracing::debug!(content_id = %content.id, status = %content.status, "Content created");
        Ok(content)
    }

    pub async fn get(&self, id: ContentId) -> Result<Content, TransitionError> {
        self.repo
            .get(id)
            .await?
            .ok_or(TransitionError::NotFound(id))
    }

    /// Load a record owned by `owner`. Other users' records read as not found.
    pub async fn get_owned(
        &self,
        id: ContentId,
        owner: UserId,
    ) -> Result<Content, TransitionError> {
        let content = self.get(id).await?;
        if content.owner_id != owner {
            return Err(TransitionError::NotFound(id));
        }
        Ok(content)
    }

    /// Move a record from `from` to `to`, applying `detail` in the same write.
    ///
    /// Fails with `Conflict` when the stored status is not `from`, including
    /// when another writer moved it between the read and the write.
    pub async fn transition(
        &self,
        id: ContentId,
        from: ContentStatus,
        to: ContentStatus,
        detail: TransitionDetail,
    ) -> Result<Content, TransitionError> {
        if !from.can_transition_to(to) {
            return Err(TransitionError::Illegal { from, to });
        }

        let mut content = self.get(id).await?;
        if content.status != from {
            return Err(TransitionError::Conflict {
                id,
                expected: from,
                actual: content.status,
            });
        }

        if let Some(body) = detail.body {
            content.set_body(body)?;
        }
        if let Some(error) = detail.error {
            content.record_error(error);
        }
        if let Some(at) = detail.scheduled_for {
            content.scheduled_for = Some(at);
        }
        if let Some(platforms) = detail.scheduled_platforms {
            content.set_scheduled_platforms(&platforms);
        }
        for result in &detail.publish_results {
            content.record_publish_result(result);
        }
        content.move_to(to, self.clock.now())?;

        self.write(content, from).await.inspect(|content| {
            tracing::info!(
                content_id = %content.id,
                from = %from,
                to = %to,
                "Content transitioned"
            );
        })
    }

    /// Merge per-platform publish results without a status change.
    ///
    /// The merge is atomic in the store, so concurrent callers touching
    /// different platforms keep each other's entries.
    pub async fn record_publish_results(
        &self,
        id: ContentId,
        expected: ContentStatus,
        results: Vec<PublishResult>,
    ) -> Result<Content, TransitionError> {
        if let Some(content) = self
            .repo
            .merge_publish_results(id, expected, &results, self.clock.now())
            .await?
        {
            return Ok(content);
        }

        match self.repo.get(id).await? {
            Some(current) => Err(TransitionError::Conflict {
                id,
                expected,
                actual: current.status,
            }),
            None => Err(TransitionError::NotFound(id)),
        }
    }

    async fn write(
        &self,
        content: Content,
        expected: ContentStatus,
    ) -> Result<Content, TransitionError> {
        if self.repo.update_if_status(&content, expected).await? {
            return Ok(content);
        }

        match self.repo.get(content.id).await? {
            Some(current) => {
                tracing::debug!(
                    content_id = %content.id,
                    expected = %expected,
                    actual = %current.status,
                    "Lost conditional update"
                );
                Err(TransitionError::Conflict {
                    id: content.id,
                    expected,
                    actual: current.status,
                })
            }
            None => Err(TransitionError::NotFound(content.id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::memory_store::InMemoryContentRepo;
    use crate::infrastructure::ports::MockContentRepo;
    use quillcast_domain::ContentType;

    fn lifecycle(repo: Arc<dyn ContentRepo>) -> ContentLifecycle {
        ContentLifecycle::new(repo, Arc::new(SystemClock::new()))
    }

    async fn draft(lifecycle: &ContentLifecycle) -> Content {
        let content = lifecycle
            .create(Content::generating(
                UserId::new(),
                ContentType::BlogPost,
                Utc::now(),
            ))
            .await
            .unwrap();
        lifecycle
            .transition(
                content.id,
                ContentStatus::Generating,
                ContentStatus::Draft,
                TransitionDetail::new().with_body("Hello"),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn generating_to_draft_stores_body() {
        let lifecycle = lifecycle(Arc::new(InMemoryContentRepo::new()));
        let content = draft(&lifecycle).await;

        let stored = lifecycle.get(content.id).await.unwrap();
        assert_eq!(stored.status, ContentStatus::Draft);
        assert_eq!(stored.body, "Hello");
    }

    #[tokio::test]
    async fn body_is_rejected_outside_generating() {
        let lifecycle = lifecycle(Arc::new(InMemoryContentRepo::new()));
        let content = draft(&lifecycle).await;

        let err = lifecycle
            .transition(
                content.id,
                ContentStatus::Draft,
                ContentStatus::Published,
                TransitionDetail::new().with_body("rewritten"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::Domain(_)));
        assert_eq!(lifecycle.get(content.id).await.unwrap().body, "Hello");
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected_before_reading() {
        let lifecycle = lifecycle(Arc::new(MockContentRepo::new()));
        let err = lifecycle
            .transition(
                ContentId::new(),
                ContentStatus::Published,
                ContentStatus::Draft,
                TransitionDetail::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransitionError::Illegal {
                from: ContentStatus::Published,
                to: ContentStatus::Draft
            }
        ));
    }

    #[tokio::test]
    async fn stale_status_is_a_conflict() {
        let lifecycle = lifecycle(Arc::new(InMemoryContentRepo::new()));
        let content = draft(&lifecycle).await;

        let err = lifecycle
            .transition(
                content.id,
                ContentStatus::Scheduled,
                ContentStatus::Published,
                TransitionDetail::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransitionError::Conflict {
                expected: ContentStatus::Scheduled,
                actual: ContentStatus::Draft,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn lost_write_reports_current_status() {
        let mut stored = Content::generating(UserId::new(), ContentType::Email, Utc::now());
        stored.move_to(ContentStatus::Draft, Utc::now()).unwrap();
        let mut moved = stored.clone();
        moved.move_to(ContentStatus::Archived, Utc::now()).unwrap();

        let mut repo = MockContentRepo::new();
        let mut reads = vec![Some(moved), Some(stored.clone())];
        repo.expect_get().times(2).returning(move |_| Ok(reads.pop().flatten()));
        repo.expect_update_if_status()
            .times(1)
            .returning(|_, _| Ok(false));

        let err = lifecycle(Arc::new(repo))
            .transition(
                stored.id,
                ContentStatus::Draft,
                ContentStatus::Published,
                TransitionDetail::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransitionError::Conflict {
                actual: ContentStatus::Archived,
                ..
            }
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_transitions_have_one_winner() {
        let lifecycle = Arc::new(lifecycle(Arc::new(InMemoryContentRepo::new())));
        let content = draft(&lifecycle).await;

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let lifecycle = lifecycle.clone();
                tokio::spawn(async move {
                    lifecycle
                        .transition(
                            content.id,
                            ContentStatus::Draft,
                            ContentStatus::Published,
                            TransitionDetail::new(),
                        )
                        .await
                })
            })
            .collect();

        let mut wins = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => wins += 1,
                Err(TransitionError::Conflict { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn published_at_is_stamped_once() {
        let lifecycle = lifecycle(Arc::new(InMemoryContentRepo::new()));
        let content = draft(&lifecycle).await;

        let published = lifecycle
            .transition(
                content.id,
                ContentStatus::Draft,
                ContentStatus::Published,
                TransitionDetail::new(),
            )
            .await
            .unwrap();
        let stamped = published.published_at;
        assert!(stamped.is_some());

        let archived = lifecycle
            .transition(
                content.id,
                ContentStatus::Published,
                ContentStatus::Archived,
                TransitionDetail::new(),
            )
            .await
            .unwrap();
        assert_eq!(archived.published_at, stamped);
    }

    #[tokio::test]
    async fn create_rejects_records_past_generation() {
        let lifecycle = lifecycle(Arc::new(InMemoryContentRepo::new()));
        let mut content = Content::generating(UserId::new(), ContentType::Email, Utc::now());
        content.move_to(ContentStatus::Draft, Utc::now()).unwrap();
        assert!(lifecycle.create(content).await.is_err());
    }

    #[tokio::test]
    async fn publish_results_merge_requires_expected_status() {
        let lifecycle = lifecycle(Arc::new(InMemoryContentRepo::new()));
        let content = draft(&lifecycle).await;
        let result = PublishResult::succeeded(Platform::Email, "msg-1", None, 1, Utc::now());

        let err = lifecycle
            .record_publish_results(content.id, ContentStatus::Published, vec![result.clone()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransitionError::Conflict {
                actual: ContentStatus::Draft,
                ..
            }
        ));

        let updated = lifecycle
            .record_publish_results(content.id, ContentStatus::Draft, vec![result])
            .await
            .unwrap();
        assert_eq!(updated.status, ContentStatus::Draft);
        assert!(updated.publish_result(Platform::Email).is_some());

        assert!(matches!(
            lifecycle
                .record_publish_results(ContentId::new(), ContentStatus::Draft, vec![])
                .await,
            Err(TransitionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn other_owners_see_not_found() {
        let lifecycle = lifecycle(Arc::new(InMemoryContentRepo::new()));
        let content = draft(&lifecycle).await;
        assert!(matches!(
            lifecycle.get_owned(content.id, UserId::new()).await,
            Err(TransitionError::NotFound(_))
        ));
        assert!(lifecycle.get_owned(content.id, content.owner_id).await.is_ok());
    }
}
