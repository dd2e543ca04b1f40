//! Domain models for sessions, photos, and access logging

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod access_log;
pub mod photo;
pub mod session;

pub use access_log::{ClientType, NewAccessLogEntry};
pub use photo::{
    Photo, PhotoChanges, PhotoMetadata, PhotoStatus, VariantKind, subtract_tags, union_tags,
};
pub use session::{Session, SessionStatus, SessionVisibility, WatermarkConfig, WatermarkPosition};

/// Role carried by an authenticated actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Photographer,
    Viewer,
}

/// The identity a request acts under. Anonymous requests become viewer
/// actors with no id so public sessions work without a token.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Option<Uuid>,
    pub role: Role,
}

impl Actor {
    pub fn anonymous() -> Self {
        Self {
            id: None,
            role: Role::Viewer,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn owns(&self, session: &Session) -> bool {
        self.id == Some(session.owner_id)
    }
}

/// Payload fanned out for `new_photo` and `photo_published` events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhotoAnnouncement {
    pub id: Uuid,
    pub thumbnail_url: Option<String>,
    pub webp_url: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl PhotoAnnouncement {
    pub fn from_photo(photo: &Photo) -> Self {
        Self {
            id: photo.id,
            thumbnail_url: photo.variant_url(VariantKind::Thumbnail),
            webp_url: photo.variant_url(VariantKind::Webp),
            tags: photo.tags.clone(),
            created_at: photo.created_at,
        }
    }
}
