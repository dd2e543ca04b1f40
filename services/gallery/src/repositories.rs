//! Repositories for database operations

use anyhow::{Result, anyhow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{Session, WatermarkConfig};

pub mod access_log;
pub mod photo;

/// Session repository for database operations
#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    /// Create a new session repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a session by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Session>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_id, visibility, access_code, status, review_mode,
                   auto_tag, watermark_config, max_file_size, allowed_extensions,
                   created_at, updated_at
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let visibility: String = row.get("visibility");
                let status: String = row.get("status");
                let watermark_config: Option<Json<WatermarkConfig>> =
                    row.get("watermark_config");

                let session = Session {
                    id: row.get("id"),
                    owner_id: row.get("owner_id"),
                    visibility: visibility.parse().map_err(|e: String| anyhow!(e))?,
                    access_code: row.get("access_code"),
                    status: status.parse().map_err(|e: String| anyhow!(e))?,
                    review_mode: row.get("review_mode"),
                    auto_tag: row.get("auto_tag"),
                    watermark_config: watermark_config.map(|json| json.0),
                    max_file_size: row.get("max_file_size"),
                    allowed_extensions: row
                        .get::<Json<Vec<String>>, _>("allowed_extensions")
                        .0,
                    created_at: row.get("created_at"),
                    updated_at: row.get("updated_at"),
                };
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }
}
