//! Photo model and the structured update description

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Publication state of a photo. Only the ingestion pipeline (initial
/// assignment) and the moderation workflow ever set this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoStatus {
    Pending,
    Published,
    Rejected,
}

impl PhotoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoStatus::Pending => "pending",
            PhotoStatus::Published => "published",
            PhotoStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for PhotoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PhotoStatus::Pending),
            "published" => Ok(PhotoStatus::Published),
            "rejected" => Ok(PhotoStatus::Rejected),
            other => Err(format!("unknown photo status: {other}")),
        }
    }
}

/// One transcoded rendition of an uploaded image
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantKind {
    Original,
    Medium,
    Thumbnail,
    Webp,
}

impl VariantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantKind::Original => "original",
            VariantKind::Medium => "medium",
            VariantKind::Thumbnail => "thumbnail",
            VariantKind::Webp => "webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            VariantKind::Webp => "webp",
            _ => "jpg",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            VariantKind::Webp => "image/webp",
            _ => "image/jpeg",
        }
    }
}

impl std::str::FromStr for VariantKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "original" => Ok(VariantKind::Original),
            "medium" => Ok(VariantKind::Medium),
            "thumbnail" => Ok(VariantKind::Thumbnail),
            "webp" => Ok(VariantKind::Webp),
            other => Err(format!("unknown variant: {other}")),
        }
    }
}

/// Upload provenance stored alongside the photo record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoMetadata {
    pub uploader_id: Uuid,
    pub original_filename: String,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Photo entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub id: Uuid,
    pub session_id: Uuid,
    pub filename: String,
    /// Variant name -> URL. Written once at ingestion, never mutated.
    pub variant_urls: BTreeMap<String, String>,
    /// Size in bytes of the `original` variant
    pub file_size: i64,
    /// Deduplicated tag set, first-occurrence order irrelevant
    pub tags: Vec<String>,
    pub status: PhotoStatus,
    pub view_count: i64,
    pub download_count: i64,
    pub metadata: PhotoMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Photo {
    pub fn variant_url(&self, kind: VariantKind) -> Option<String> {
        self.variant_urls.get(kind.as_str()).cloned()
    }
}

/// Structured update description: field -> optional new value, interpreted
/// by the persistence layer instead of string-built column lists.
#[derive(Debug, Clone, Default)]
pub struct PhotoChanges {
    pub tags: Option<Vec<String>>,
    pub status: Option<PhotoStatus>,
}

/// Union two tag lists, collapsing duplicates by exact string match while
/// keeping first-occurrence order.
pub fn union_tags(base: &[String], extra: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(base.len() + extra.len());
    for tag in base.iter().chain(extra.iter()) {
        if !out.iter().any(|t| t == tag) {
            out.push(tag.clone());
        }
    }
    out
}

/// Subtract `remove` from `base` by exact string match.
pub fn subtract_tags(base: &[String], remove: &[String]) -> Vec<String> {
    base.iter()
        .filter(|t| !remove.contains(t))
        .cloned()
        .collect()
}
