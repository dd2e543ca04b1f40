//! Photo repository for database operations
//!
//! Implements the `PhotoGateway` port with conditional updates for status
//! transitions and a fixed, COALESCE-bound statement for structured
//! updates instead of string-built column lists.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::gateway::PhotoGateway;
use crate::models::{Photo, PhotoChanges, PhotoMetadata, PhotoStatus};

const PHOTO_COLUMNS: &str = "id, session_id, filename, variant_urls, file_size, tags, status, \
                             view_count, download_count, metadata, created_at, updated_at";

fn photo_from_row(row: &PgRow) -> Result<Photo> {
    let status: String = row.get("status");
    Ok(Photo {
        id: row.get("id"),
        session_id: row.get("session_id"),
        filename: row.get("filename"),
        variant_urls: row
            .get::<Json<BTreeMap<String, String>>, _>("variant_urls")
            .0,
        file_size: row.get("file_size"),
        tags: row.get::<Json<Vec<String>>, _>("tags").0,
        status: status.parse().map_err(|e: String| anyhow!(e))?,
        view_count: row.get("view_count"),
        download_count: row.get("download_count"),
        metadata: row.get::<Json<PhotoMetadata>, _>("metadata").0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Filters for the session photo listing
#[derive(Debug, Clone)]
pub struct PhotoListFilter {
    pub status: Option<PhotoStatus>,
    /// Photos must carry every requested tag
    pub tags: Vec<String>,
    pub page: u32,
    pub limit: u32,
    pub sort_desc: bool,
}

/// Photo repository for database operations
#[derive(Clone)]
pub struct PhotoRepository {
    pool: PgPool,
}

impl PhotoRepository {
    /// Create a new photo repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List photos of a session with pagination, tag filtering, and
    /// created_at ordering. Returns the page plus the total match count.
    pub async fn list(
        &self,
        session_id: Uuid,
        filter: &PhotoListFilter,
    ) -> Result<(Vec<Photo>, i64)> {
        let page = filter.page.max(1);
        let limit = filter.limit.clamp(1, 100);
        let offset = (page - 1) as i64 * limit as i64;

        let status = filter.status.map(|s| s.as_str().to_string());
        let tags = if filter.tags.is_empty() {
            None
        } else {
            Some(Json(filter.tags.clone()))
        };

        let rows = sqlx::query(&format!(
            r#"
            SELECT {PHOTO_COLUMNS}
            FROM photos
            WHERE session_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::jsonb IS NULL OR tags @> $3)
            ORDER BY
              CASE WHEN $4 THEN created_at END DESC,
              CASE WHEN NOT $4 THEN created_at END ASC
            LIMIT $5 OFFSET $6
            "#
        ))
        .bind(session_id)
        .bind(&status)
        .bind(&tags)
        .bind(filter.sort_desc)
        .bind(limit as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM photos
            WHERE session_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::jsonb IS NULL OR tags @> $3)
            "#,
        )
        .bind(session_id)
        .bind(&status)
        .bind(&tags)
        .fetch_one(&self.pool)
        .await?;

        let photos = rows
            .iter()
            .map(photo_from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok((photos, total))
    }

    /// Bump the view counter. Monotonic, never decremented.
    pub async fn record_view(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE photos SET view_count = view_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Bump the download counter. Monotonic, never decremented.
    pub async fn record_download(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE photos SET download_count = download_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PhotoGateway for PhotoRepository {
    async fn insert(&self, photo: &Photo) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO photos (id, session_id, filename, variant_urls, file_size, tags,
                                status, view_count, download_count, metadata,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(photo.id)
        .bind(photo.session_id)
        .bind(&photo.filename)
        .bind(Json(&photo.variant_urls))
        .bind(photo.file_size)
        .bind(Json(&photo.tags))
        .bind(photo.status.as_str())
        .bind(photo.view_count)
        .bind(photo.download_count)
        .bind(Json(&photo.metadata))
        .bind(photo.created_at)
        .bind(photo.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Photo>> {
        let row = sqlx::query(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(photo_from_row).transpose()
    }

    async fn update(&self, id: Uuid, changes: &PhotoChanges) -> Result<Option<Photo>> {
        let tags = changes.tags.as_ref().map(Json);
        let status = changes.status.map(|s| s.as_str().to_string());

        let row = sqlx::query(&format!(
            r#"
            UPDATE photos
            SET tags = COALESCE($2::jsonb, tags),
                status = COALESCE($3::text, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PHOTO_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(tags)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(photo_from_row).transpose()
    }

    async fn list_by_ids(&self, session_id: Uuid, ids: &[Uuid]) -> Result<Vec<Photo>> {
        let rows = sqlx::query(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE session_id = $1 AND id = ANY($2)"
        ))
        .bind(session_id)
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(photo_from_row).collect()
    }

    async fn approve_pending(&self, session_id: Uuid, ids: &[Uuid]) -> Result<Vec<Photo>> {
        let rows = sqlx::query(&format!(
            r#"
            UPDATE photos
            SET status = 'published', updated_at = NOW()
            WHERE session_id = $1 AND id = ANY($2) AND status = 'pending'
            RETURNING {PHOTO_COLUMNS}
            "#
        ))
        .bind(session_id)
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(photo_from_row).collect()
    }

    async fn reject_pending(&self, session_id: Uuid, ids: &[Uuid]) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE photos
            SET status = 'rejected', updated_at = NOW()
            WHERE session_id = $1 AND id = ANY($2) AND status = 'pending'
            "#,
        )
        .bind(session_id)
        .bind(ids.to_vec())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_photos(&self, session_id: Uuid, ids: &[Uuid]) -> Result<Vec<Photo>> {
        let rows = sqlx::query(&format!(
            r#"
            DELETE FROM photos
            WHERE session_id = $1 AND id = ANY($2)
            RETURNING {PHOTO_COLUMNS}
            "#
        ))
        .bind(session_id)
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(photo_from_row).collect()
    }
}
