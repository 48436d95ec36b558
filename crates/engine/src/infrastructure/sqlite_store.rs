//! SQLite-backed record store.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use quillcast_domain::{
    Content, ContentId, ContentStatus, Metadata, PublishResult, PUBLISH_RESULTS_KEY,
};

use crate::infrastructure::ports::{ContentRepo, RepoError};

/// SQLite implementation of the content record store.
///
/// Timestamps are stored as fixed-width RFC 3339 UTC strings so they compare
/// lexicographically in SQL.
pub struct SqliteContentRepo {
    pool: SqlitePool,
}

impl SqliteContentRepo {
    pub async fn new(db_path: &str) -> Result<Self, RepoError> {
        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", db_path))
            .await
            .map_err(|e| RepoError::database("content.connect", e))?;
        Self::with_pool(pool).await
    }

    /// Private in-memory database on a single connection.
    pub async fn in_memory() -> Result<Self, RepoError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| RepoError::database("content.connect", e))?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, RepoError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS content (
                id TEXT PRIMARY KEY NOT NULL,
                owner_id TEXT NOT NULL,
                campaign_id TEXT,
                content_type TEXT NOT NULL,
                title TEXT,
                body TEXT NOT NULL,
                status TEXT NOT NULL,
                metadata_json TEXT NOT NULL,
                scheduled_for TEXT,
                published_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| RepoError::database("content.migrate", e))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_content_due ON content (status, scheduled_for)",
        )
        .execute(&pool)
        .await
        .map_err(|e| RepoError::database("content.migrate", e))?;

        Ok(Self { pool })
    }
}

fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, RepoError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepoError::serialization(format!("timestamp '{}': {}", raw, e)))
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepoError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| RepoError::serialization(format!("column {}: {}", name, e)))
}

fn row_to_content(row: &SqliteRow) -> Result<Content, RepoError> {
    let parse_err = |e: quillcast_domain::DomainError| RepoError::serialization(e);

    let metadata_json: String = column(row, "metadata_json")?;
    let metadata: Metadata =
        serde_json::from_str(&metadata_json).map_err(RepoError::serialization)?;

    let id: String = column(row, "id")?;
    let owner_id: String = column(row, "owner_id")?;
    let campaign_id: Option<String> = column(row, "campaign_id")?;
    let content_type: String = column(row, "content_type")?;
    let status: String = column(row, "status")?;
    let scheduled_for: Option<String> = column(row, "scheduled_for")?;
    let published_at: Option<String> = column(row, "published_at")?;
    let created_at: String = column(row, "created_at")?;
    let updated_at: String = column(row, "updated_at")?;

    Ok(Content {
        id: id.parse().map_err(parse_err)?,
        owner_id: owner_id.parse().map_err(parse_err)?,
        campaign_id: campaign_id
            .map(|c| c.parse())
            .transpose()
            .map_err(parse_err)?,
        content_type: content_type.parse().map_err(parse_err)?,
        title: column(row, "title")?,
        body: column(row, "body")?,
        status: status.parse().map_err(parse_err)?,
        metadata,
        scheduled_for: scheduled_for.as_deref().map(parse_ts).transpose()?,
        published_at: published_at.as_deref().map(parse_ts).transpose()?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

#[async_trait]
impl ContentRepo for SqliteContentRepo {
    async fn get(&self, id: ContentId) -> Result<Option<Content>, RepoError> {
        let row = sqlx::query("SELECT * FROM content WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("content.get", e))?;

        row.as_ref().map(row_to_content).transpose()
    }

    async fn insert(&self, content: &Content) -> Result<(), RepoError> {
        let metadata =
            serde_json::to_string(&content.metadata).map_err(RepoError::serialization)?;

        sqlx::query(
            r#"
            INSERT INTO content (
                id, owner_id, campaign_id, content_type, title, body, status,
                metadata_json, scheduled_for, published_at, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(content.id.to_string())
        .bind(content.owner_id.to_string())
        .bind(content.campaign_id.map(|c| c.to_string()))
        .bind(content.content_type.as_str())
        .bind(content.title.as_deref())
        .bind(content.body.as_str())
        .bind(content.status.as_str())
        .bind(metadata)
        .bind(content.scheduled_for.map(ts))
        .bind(content.published_at.map(ts))
        .bind(ts(content.created_at))
        .bind(ts(content.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("content.insert", e))?;

        Ok(())
    }

    async fn update_if_status(
        &self,
        content: &Content,
        expected: ContentStatus,
    ) -> Result<bool, RepoError> {
        let metadata =
            serde_json::to_string(&content.metadata).map_err(RepoError::serialization)?;

        let result = sqlx::query(
            r#"
            UPDATE content SET
                campaign_id = ?, title = ?, body = ?, status = ?, metadata_json = ?,
                scheduled_for = ?, published_at = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(content.campaign_id.map(|c| c.to_string()))
        .bind(content.title.as_deref())
        .bind(content.body.as_str())
        .bind(content.status.as_str())
        .bind(metadata)
        .bind(content.scheduled_for.map(ts))
        .bind(content.published_at.map(ts))
        .bind(ts(content.updated_at))
        .bind(content.id.to_string())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("content.update", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn merge_publish_results(
        &self,
        id: ContentId,
        expected: ContentStatus,
        results: &[PublishResult],
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Content>, RepoError> {
        if results.is_empty() {
            return Ok(self.get(id).await?.filter(|c| c.status == expected));
        }

        // One statement, so concurrent merges for different platforms cannot
        // overwrite each other.
        let root = format!("$.{}", PUBLISH_RESULTS_KEY);
        let entries = vec!["?, json(?)"; results.len()].join(", ");
        let sql = format!(
            r#"
            UPDATE content SET
                metadata_json = json_set(
                    json_set(
                        metadata_json,
                        ?,
                        json(coalesce(json_extract(metadata_json, ?), '{{}}'))
                    ),
                    {entries}
                ),
                updated_at = ?
            WHERE id = ? AND status = ?
            RETURNING *
            "#
        );

        let mut query = sqlx::query(&sql).bind(root.as_str()).bind(root.as_str());
        for result in results {
            let value = serde_json::to_string(result).map_err(RepoError::serialization)?;
            query = query
                .bind(format!("{}.{}", root, result.platform.as_str()))
                .bind(value);
        }
        let row = query
            .bind(ts(updated_at))
            .bind(id.to_string())
            .bind(expected.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("content.merge_publish_results", e))?;

        row.as_ref().map(row_to_content).transpose()
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Content>, RepoError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM content
            WHERE status = ? AND scheduled_for IS NOT NULL AND scheduled_for <= ?
            ORDER BY scheduled_for
            "#,
        )
        .bind(ContentStatus::Scheduled.as_str())
        .bind(ts(now))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("content.list_due", e))?;

        rows.iter().map(row_to_content).collect()
    }
}
