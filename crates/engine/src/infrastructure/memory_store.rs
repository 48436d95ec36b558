//! In-memory record store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use quillcast_domain::{Content, ContentId, ContentStatus, PublishResult};

use crate::infrastructure::ports::{ContentRepo, RepoError};

/// Process-local store. Records are lost on restart.
#[derive(Default)]
pub struct InMemoryContentRepo {
    records: DashMap<ContentId, Content>,
}

impl InMemoryContentRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ContentRepo for InMemoryContentRepo {
    async fn get(&self, id: ContentId) -> Result<Option<Content>, RepoError> {
        Ok(self.records.get(&id).map(|r| r.value().clone()))
    }

    async fn insert(&self, content: &Content) -> Result<(), RepoError> {
        match self.records.entry(content.id) {
            Entry::Occupied(_) => Err(RepoError::database(
                "content.insert",
                format!("duplicate id {}", content.id),
            )),
            Entry::Vacant(slot) => {
                slot.insert(content.clone());
                Ok(())
            }
        }
    }

    async fn update_if_status(
        &self,
        content: &Content,
        expected: ContentStatus,
    ) -> Result<bool, RepoError> {
        // The shard write lock makes check-and-replace atomic per record.
        let Some(mut stored) = self.records.get_mut(&content.id) else {
            return Ok(false);
        };
        if stored.status != expected {
            return Ok(false);
        }
        *stored = content.clone();
        Ok(true)
    }

    async fn merge_publish_results(
        &self,
        id: ContentId,
        expected: ContentStatus,
        results: &[PublishResult],
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Content>, RepoError> {
        let Some(mut stored) = self.records.get_mut(&id) else {
            return Ok(None);
        };
        if stored.status != expected {
            return Ok(None);
        }
        for result in results {
            stored.record_publish_result(result);
        }
        stored.updated_at = updated_at;
        Ok(Some(stored.clone()))
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Content>, RepoError> {
        let mut due: Vec<Content> = self
            .records
            .iter()
            .filter(|r| {
                r.status == ContentStatus::Scheduled
                    && r.scheduled_for.is_some_and(|at| at <= now)
            })
            .map(|r| r.value().clone())
            .collect();
        due.sort_by_key(|c| c.scheduled_for);
        Ok(due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quillcast_domain::{ContentType, Platform, UserId};

    fn draft() -> Content {
        let mut content = Content::generating(UserId::new(), ContentType::BlogPost, Utc::now());
        content.move_to(ContentStatus::Draft, Utc::now()).unwrap();
        content
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_ids() {
        let repo = InMemoryContentRepo::new();
        let content = draft();
        repo.insert(&content).await.unwrap();
        assert!(repo.insert(&content).await.is_err());
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn update_requires_expected_status() {
        let repo = InMemoryContentRepo::new();
        let content = draft();
        repo.insert(&content).await.unwrap();

        let mut published = content.clone();
        published.move_to(ContentStatus::Published, Utc::now()).unwrap();

        assert!(!repo
            .update_if_status(&published, ContentStatus::Scheduled)
            .await
            .unwrap());
        assert!(repo
            .update_if_status(&published, ContentStatus::Draft)
            .await
            .unwrap());
        assert!(!repo
            .update_if_status(&published, ContentStatus::Draft)
            .await
            .unwrap());

        let stored = repo.get(content.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ContentStatus::Published);
    }

    #[tokio::test]
    async fn update_of_missing_record_is_a_no_op() {
        let repo = InMemoryContentRepo::new();
        assert!(!repo
            .update_if_status(&draft(), ContentStatus::Draft)
            .await
            .unwrap());
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn merge_keeps_other_platforms() {
        let repo = InMemoryContentRepo::new();
        let now = Utc::now();
        let mut content = draft();
        content.record_publish_result(&PublishResult::succeeded(
            Platform::Wordpress,
            "wp-1",
            None,
            1,
            now,
        ));
        repo.insert(&content).await.unwrap();

        let tweet = PublishResult::succeeded(Platform::Twitter, "t-1", None, 1, now);
        assert!(repo
            .merge_publish_results(content.id, ContentStatus::Published, &[tweet.clone()], now)
            .await
            .unwrap()
            .is_none());

        let merged = repo
            .merge_publish_results(content.id, ContentStatus::Draft, &[tweet], now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(merged.publish_results().len(), 2);
        assert_eq!(repo.get(content.id).await.unwrap().unwrap(), merged);
    }

    #[tokio::test]
    async fn list_due_returns_only_past_scheduled_records() {
        let repo = InMemoryContentRepo::new();
        let now = Utc::now();

        let mut due = draft();
        due.move_to(ContentStatus::Scheduled, now).unwrap();
        due.scheduled_for = Some(now - Duration::minutes(5));

        let mut later = draft();
        later.move_to(ContentStatus::Scheduled, now).unwrap();
        later.scheduled_for = Some(now + Duration::minutes(5));

        let mut unscheduled_draft = draft();
        unscheduled_draft.scheduled_for = Some(now - Duration::minutes(5));

        for c in [&due, &later, &unscheduled_draft] {
            repo.insert(c).await.unwrap();
        }

        let listed = repo.list_due(now).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, due.id);
    }
}
