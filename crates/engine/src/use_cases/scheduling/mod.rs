//! Scheduled publication.
//!
//! `ScheduleContent` parks a draft until a due time; `SchedulerSweep` picks up
//! due records on each tick and hands them to the dispatcher.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use quillcast_domain::{Content, ContentId, ContentStatus, Platform};

use crate::infrastructure::ports::{ClockPort, ContentRepo, RepoError};
use crate::use_cases::content::{ContentLifecycle, TransitionDetail};
use crate::use_cases::publishing::{DispatchError, PublishContent};

/// Moves a draft to `scheduled`.
pub struct ScheduleContent {
    lifecycle: Arc<ContentLifecycle>,
}

impl ScheduleContent {
    pub fn new(lifecycle: Arc<ContentLifecycle>) -> Self {
        Self { lifecycle }
    }

    pub async fn execute(
        &self,
        content_id: ContentId,
        scheduled_for: DateTime<Utc>,
        platforms: Vec<Platform>,
    ) -> Result<Content, DispatchError> {
        if platforms.is_empty() {
            return Err(DispatchError::Validation(
                "at least one platform is required".to_string(),
            ));
        }
        if scheduled_for <= self.lifecycle.now() {
            return Err(DispatchError::Validation(
                "scheduled time must be in the future".to_string(),
            ));
        }

        let mut platforms = platforms;
        platforms.sort();
        platforms.dedup();

        let content = self
            .lifecycle
            .transition(
                content_id,
                ContentStatus::Draft,
                ContentStatus::Scheduled,
                TransitionDetail::new().with_schedule(scheduled_for, platforms),
            )
            .await?;

        tracing::info!(
            content_id = %content_id,
            scheduled_for = %scheduled_for,
            "Content scheduled"
        );
        Ok(content)
    }
}

/// Outcome counts for one sweep tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub dispatched: usize,
    pub failed_without_platforms: usize,
    pub skipped: usize,
}

/// Dispatches scheduled records whose time has come.
pub struct SchedulerSweep {
    repo: Arc<dyn ContentRepo>,
    lifecycle: Arc<ContentLifecycle>,
    publish: Arc<PublishContent>,
    clock: Arc<dyn ClockPort>,
}

impl SchedulerSweep {
    pub fn new(
        repo: Arc<dyn ContentRepo>,
        lifecycle: Arc<ContentLifecycle>,
        publish: Arc<PublishContent>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            repo,
            lifecycle,
            publish,
            clock,
        }
    }

    /// Process every record due at the current clock time.
    ///
    /// A record another writer already moved (for example a manual publish)
    /// is skipped; the conditional update in the dispatcher guarantees it is
    /// dispatched at most once per transition out of `scheduled`.
    pub async fn tick(&self) -> Result<SweepSummary, RepoError> {
        let now = self.clock.now();
        let due = self.repo.list_due(now).await?;
        let mut summary = SweepSummary::default();

        for content in due {
            let platforms = content.scheduled_platforms();
            if platforms.is_empty() {
                match self
                    .lifecycle
                    .transition(
                        content.id,
                        ContentStatus::Scheduled,
                        ContentStatus::Failed,
                        TransitionDetail::new().with_error("no platforms configured"),
                    )
                    .await
                {
                    Ok(_) => {
                        tracing::warn!(
                            content_id = %content.id,
                            "Scheduled content has no platforms"
                        );
                        summary.failed_without_platforms += 1;
                    }
                    Err(e) => {
                        tracing::debug!(
                            content_id = %content.id,
                            error = %e,
                            "Skipping scheduled content"
                        );
                        summary.skipped += 1;
                    }
                }
                continue;
            }

            match self.publish.execute_scheduled(content.id, &platforms).await {
                Ok(report) => {
                    tracing::info!(
                        content_id = %content.id,
                        status = %report.status,
                        "Scheduled dispatch finished"
                    );
                    summary.dispatched += 1;
                }
                Err(DispatchError::Conflict { .. } | DispatchError::NotPublishable { .. }) => {
                    tracing::debug!(content_id = %content.id, "Scheduled content already handled");
                    summary.skipped += 1;
                }
                Err(e) => {
                    tracing::error!(
                        content_id = %content.id,
                        error = %e,
                        "Scheduled dispatch failed"
                    );
                    summary.skipped += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Run `tick` forever on a fixed interval.
    pub async fn run(self: Arc<Self>, every: Duration) {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match self.tick().await {
                Ok(summary) if summary != SweepSummary::default() => {
                    tracing::info!(
                        dispatched = summary.dispatched,
                        failed = summary.failed_without_platforms,
                        skipped = summary.skipped,
                        "Scheduler sweep complete"
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Scheduler sweep failed"),
            }
        }
    }
}
