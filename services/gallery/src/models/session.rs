//! Session model: a bounded live event scoping a set of photos

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionVisibility {
    Public,
    Private,
}

impl std::str::FromStr for SessionVisibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(SessionVisibility::Public),
            "private" => Ok(SessionVisibility::Private),
            other => Err(format!("unknown session visibility: {other}")),
        }
    }
}

/// Session lifecycle status. Transitions are managed outside this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Draft,
    Active,
    Paused,
    Ended,
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(SessionStatus::Draft),
            "active" => Ok(SessionStatus::Active),
            "paused" => Ok(SessionStatus::Paused),
            "ended" => Ok(SessionStatus::Ended),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// Corner a watermark overlay is anchored to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Watermark configuration stored on the session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatermarkConfig {
    pub text: String,
    pub position: WatermarkPosition,
    /// Overlay opacity in [0.0, 1.0]
    pub opacity: f32,
}

/// Session entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub visibility: SessionVisibility,
    /// Shared secret for private sessions; immutable once issued
    #[serde(skip_serializing)]
    pub access_code: Option<String>,
    pub status: SessionStatus,
    /// When true, uploads land as `pending` until moderated
    pub review_mode: bool,
    /// Session default for tag derivation on upload
    pub auto_tag: bool,
    pub watermark_config: Option<WatermarkConfig>,
    /// Maximum accepted upload size in bytes
    pub max_file_size: i64,
    pub allowed_extensions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn is_public(&self) -> bool {
        self.visibility == SessionVisibility::Public
    }

    pub fn has_ended(&self) -> bool {
        self.status == SessionStatus::Ended
    }

    /// Extension allowed for upload into this session. Comparison is
    /// case-insensitive, stored extensions have no leading dot.
    pub fn allows_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
    }
}
