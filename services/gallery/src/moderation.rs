//! Moderation workflow: publication state transitions and batch operations
//!
//! `pending -> published` (approve) and `pending -> rejected` (reject) are
//! the only transitions; both rely on the persistence layer's conditional
//! update so concurrent calls cannot double-transition a photo. Deletion is
//! a destructive operation over any status. Tag operations never publish
//! events.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::fanout::{Publisher, SessionEvent, session_channel};
use crate::gateway::PhotoGateway;
use crate::models::{
    Photo, PhotoAnnouncement, PhotoChanges, VariantKind, subtract_tags, union_tags,
};
use crate::storage::{ObjectStore, variant_path};

/// Batch actions accepted by the moderation endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchAction {
    AddTags,
    RemoveTags,
    SetTags,
    Approve,
    Reject,
    Delete,
}

/// Result of one batch call
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    /// Rows actually affected; ids skipped by the conditional predicate do
    /// not count.
    pub affected: u64,
}

/// Governs photo status transitions and destructive cleanup
pub struct ModerationWorkflow {
    photos: Arc<dyn PhotoGateway>,
    store: Arc<dyn ObjectStore>,
    publisher: Arc<dyn Publisher>,
    path_prefix: String,
}

impl ModerationWorkflow {
    pub fn new(
        photos: Arc<dyn PhotoGateway>,
        store: Arc<dyn ObjectStore>,
        publisher: Arc<dyn Publisher>,
        path_prefix: String,
    ) -> Self {
        Self {
            photos,
            store,
            publisher,
            path_prefix,
        }
    }

    /// Apply a batch action to photos of one session. Ids that do not match
    /// the action's predicate are silently skipped.
    pub async fn transition(
        &self,
        session_id: Uuid,
        photo_ids: &[Uuid],
        action: BatchAction,
        tags: Option<Vec<String>>,
    ) -> Result<BatchResult, ApiError> {
        match action {
            BatchAction::Approve => self.approve(session_id, photo_ids).await,
            BatchAction::Reject => self.reject(session_id, photo_ids).await,
            BatchAction::Delete => self.delete(session_id, photo_ids).await,
            BatchAction::AddTags | BatchAction::RemoveTags | BatchAction::SetTags => {
                let tags = tags.ok_or_else(|| {
                    ApiError::Validation("tag actions require a tags list".to_string())
                })?;
                self.apply_tags(session_id, photo_ids, action, tags).await
            }
        }
    }

    async fn approve(&self, session_id: Uuid, photo_ids: &[Uuid]) -> Result<BatchResult, ApiError> {
        let mut published = self
            .photos
            .approve_pending(session_id, photo_ids)
            .await
            .map_err(|e| ApiError::Persistence(e.to_string()))?;

        // Fire events in the order the caller listed the ids.
        published.sort_by_key(|photo| {
            photo_ids
                .iter()
                .position(|id| *id == photo.id)
                .unwrap_or(usize::MAX)
        });

        let channel = session_channel(session_id);
        for photo in &published {
            self.publisher
                .publish(
                    &channel,
                    SessionEvent::PhotoPublished(PhotoAnnouncement::from_photo(photo)),
                )
                .await;
        }

        info!(
            "Approved {} of {} photos in session {}",
            published.len(),
            photo_ids.len(),
            session_id
        );

        Ok(BatchResult {
            affected: published.len() as u64,
        })
    }

    async fn reject(&self, session_id: Uuid, photo_ids: &[Uuid]) -> Result<BatchResult, ApiError> {
        let affected = self
            .photos
            .reject_pending(session_id, photo_ids)
            .await
            .map_err(|e| ApiError::Persistence(e.to_string()))?;

        Ok(BatchResult { affected })
    }

    async fn delete(&self, session_id: Uuid, photo_ids: &[Uuid]) -> Result<BatchResult, ApiError> {
        let removed = self
            .photos
            .delete_photos(session_id, photo_ids)
            .await
            .map_err(|e| ApiError::Persistence(e.to_string()))?;

        // The rows are already gone at this point. Blob cleanup and fanout
        // are best-effort per photo: a failed variant delete must not fail
        // the request or suppress events for the other removed photos.
        let channel = session_channel(session_id);
        for photo in &removed {
            self.delete_variants(photo).await;
            self.publisher
                .publish(&channel, SessionEvent::PhotoDeleted { id: photo.id })
                .await;
        }

        info!(
            "Deleted {} photos from session {}",
            removed.len(),
            session_id
        );

        Ok(BatchResult {
            affected: removed.len() as u64,
        })
    }

    /// Remove every variant path present in the record's URL map.
    async fn delete_variants(&self, photo: &Photo) {
        for name in photo.variant_urls.keys() {
            let kind: VariantKind = match name.parse() {
                Ok(kind) => kind,
                Err(e) => {
                    warn!("Skipping unknown variant on photo {}: {e}", photo.id);
                    continue;
                }
            };
            let path = variant_path(&self.path_prefix, photo.session_id, photo.id, kind);
            if let Err(e) = self.store.delete(&path).await {
                warn!("Failed to clean up variant {path}: {e:#}");
            }
        }
    }

    async fn apply_tags(
        &self,
        session_id: Uuid,
        photo_ids: &[Uuid],
        action: BatchAction,
        tags: Vec<String>,
    ) -> Result<BatchResult, ApiError> {
        let photos = self
            .photos
            .list_by_ids(session_id, photo_ids)
            .await
            .map_err(|e| ApiError::Persistence(e.to_string()))?;

        let mut affected = 0;
        for photo in &photos {
            let next = match action {
                BatchAction::AddTags => union_tags(&photo.tags, &tags),
                BatchAction::RemoveTags => subtract_tags(&photo.tags, &tags),
                BatchAction::SetTags => union_tags(&tags, &[]),
                _ => unreachable!("non-tag action routed to apply_tags"),
            };
            let changes = PhotoChanges {
                tags: Some(next),
                status: None,
            };
            self.photos
                .update(photo.id, &changes)
                .await
                .map_err(|e| ApiError::Persistence(e.to_string()))?;
            affected += 1;
        }

        Ok(BatchResult { affected })
    }
}
