//! Record store port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quillcast_domain::{Content, ContentId, ContentStatus, PublishResult};

use super::error::RepoError;

/// Durable storage for content records.
///
/// Status changes go through `update_if_status`, which only writes when the
/// stored status still matches the caller's expectation. That check is the
/// sole guard against two writers moving the same record.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentRepo: Send + Sync {
    async fn get(&self, id: ContentId) -> Result<Option<Content>, RepoError>;

    /// Insert a new record. Fails if the id is already taken.
    async fn insert(&self, content: &Content) -> Result<(), RepoError>;

    /// Replace the stored record if its status is still `expected`.
    ///
    /// Returns `false` without writing when the status moved underneath the
    /// caller or the record is gone.
    async fn update_if_status(
        &self,
        content: &Content,
        expected: ContentStatus,
    ) -> Result<bool, RepoError>;

    /// Merge per-platform results into the record's metadata in one atomic
    /// write, if its status is still `expected`.
    ///
    /// Entries for other platforms are left untouched. Returns the updated
    /// record, or `None` when the status moved or the record is gone.
    async fn merge_publish_results(
        &self,
        id: ContentId,
        expected: ContentStatus,
        results: &[PublishResult],
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Content>, RepoError>;

    /// Records in `scheduled` whose `scheduled_for` is at or before `now`.
    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Content>, RepoError>;
}
