//! Persistence port for photo records
//!
//! The ingestion pipeline and the moderation workflow talk to this trait
//! instead of a concrete backend. The sqlx repository implements it in
//! production; unit tests use an in-memory double.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Photo, PhotoChanges};

#[async_trait]
pub trait PhotoGateway: Send + Sync {
    /// Insert a new photo record.
    async fn insert(&self, photo: &Photo) -> Result<()>;

    /// Fetch a single photo.
    async fn find(&self, id: Uuid) -> Result<Option<Photo>>;

    /// Apply a structured update (field -> optional new value), returning
    /// the updated row if it exists.
    async fn update(&self, id: Uuid, changes: &PhotoChanges) -> Result<Option<Photo>>;

    /// Fetch the subset of `ids` that belong to `session_id`.
    async fn list_by_ids(&self, session_id: Uuid, ids: &[Uuid]) -> Result<Vec<Photo>>;

    /// Conditionally move matching `pending` photos to `published`,
    /// returning the rows actually transitioned. Ids not currently pending
    /// are skipped, not errors.
    async fn approve_pending(&self, session_id: Uuid, ids: &[Uuid]) -> Result<Vec<Photo>>;

    /// Conditionally move matching `pending` photos to `rejected`,
    /// returning the affected-row count.
    async fn reject_pending(&self, session_id: Uuid, ids: &[Uuid]) -> Result<u64>;

    /// Remove matching photos regardless of status, returning the removed
    /// rows so callers can clean up their blobs.
    async fn delete_photos(&self, session_id: Uuid, ids: &[Uuid]) -> Result<Vec<Photo>>;
}
