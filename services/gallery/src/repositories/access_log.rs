//! Access log repository
//!
//! Append-only sink for access attempts evaluated by the gate. Entries are
//! never updated or deleted by this service.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::access::AccessAudit;
use crate::models::NewAccessLogEntry;

/// Access log repository for database operations
#[derive(Clone)]
pub struct AccessLogRepository {
    pool: PgPool,
}

impl AccessLogRepository {
    /// Create a new access log repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessAudit for AccessLogRepository {
    async fn record(&self, entry: NewAccessLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO access_log_entries
                (id, session_id, actor_ip, actor_agent, access_code_used,
                 granted, client_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.session_id)
        .bind(&entry.actor_ip)
        .bind(&entry.actor_agent)
        .bind(&entry.access_code_used)
        .bind(entry.granted)
        .bind(entry.client_type.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
