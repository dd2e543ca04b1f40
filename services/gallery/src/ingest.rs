//! Ingestion pipeline: raw upload -> validated, transcoded, persisted photo
//!
//! Files in a batch are independent units of work: one file failing
//! validation or processing never aborts its siblings. The temporary spool
//! file for each run is removed on every exit path. Events are published
//! only after the record and its variants are durably stored.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::fanout::{Publisher, SessionEvent, session_channel};
use crate::gateway::PhotoGateway;
use crate::models::{
    Photo, PhotoAnnouncement, PhotoMetadata, PhotoStatus, Session, WatermarkPosition, union_tags,
};
use crate::storage::{ObjectStore, variant_path};

pub mod variants;
pub mod watermark;

use watermark::WatermarkFont;

/// Default overlay placement when only ad-hoc watermark text is given
const DEFAULT_WATERMARK_POSITION: WatermarkPosition = WatermarkPosition::BottomRight;
const DEFAULT_WATERMARK_OPACITY: f32 = 0.5;

/// Per-request ingestion options
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub tags: Vec<String>,
    pub watermark_text: Option<String>,
    pub auto_tag: bool,
    pub review_required: bool,
}

/// One file of a multipart upload
pub struct UploadFile {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Per-file error report for a batch
#[derive(Debug, Clone, serde::Serialize)]
pub struct FileFailure {
    pub filename: String,
    pub error: String,
}

/// Successes and per-file failures of one upload request
pub struct BatchOutcome {
    pub uploaded: Vec<Photo>,
    pub failed: Vec<FileFailure>,
}

/// Turns raw uploads into persisted photo variants plus a record. Callers
/// must have already passed the upload through the access-control gate.
pub struct IngestionPipeline {
    photos: Arc<dyn PhotoGateway>,
    store: Arc<dyn ObjectStore>,
    publisher: Arc<dyn Publisher>,
    path_prefix: String,
    spool_dir: PathBuf,
    webp_enabled: bool,
    watermark_font: Option<Arc<WatermarkFont>>,
}

impl IngestionPipeline {
    pub fn new(
        photos: Arc<dyn PhotoGateway>,
        store: Arc<dyn ObjectStore>,
        publisher: Arc<dyn Publisher>,
        path_prefix: String,
        spool_dir: PathBuf,
        webp_enabled: bool,
        watermark_font: Option<Arc<WatermarkFont>>,
    ) -> Self {
        Self {
            photos,
            store,
            publisher,
            path_prefix,
            spool_dir,
            webp_enabled,
            watermark_font,
        }
    }

    /// Process a batch of files independently. Processing is sequential so
    /// `new_photo` events fire in submission order.
    pub async fn ingest_batch(
        &self,
        session: &Session,
        uploader_id: Uuid,
        options: &IngestOptions,
        files: Vec<UploadFile>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            uploaded: Vec::new(),
            failed: Vec::new(),
        };

        for file in files {
            let filename = file.filename.clone();
            match self.ingest(session, uploader_id, options, file).await {
                Ok(photo) => outcome.uploaded.push(photo),
                Err(err) => {
                    warn!("Upload of {} failed: {}", filename, err);
                    outcome.failed.push(FileFailure {
                        filename,
                        error: err.to_string(),
                    });
                }
            }
        }

        outcome
    }

    /// Run the full pipeline for one file.
    pub async fn ingest(
        &self,
        session: &Session,
        uploader_id: Uuid,
        options: &IngestOptions,
        file: UploadFile,
    ) -> Result<Photo, ApiError> {
        self.validate(session, &file)?;

        // Spool the raw upload; the temp file is removed when this guard
        // drops, on every exit path below.
        let mut spool = tempfile::Builder::new()
            .prefix("upload_")
            .tempfile_in(&self.spool_dir)
            .map_err(|e| ApiError::Processing(format!("failed to spool upload: {e}")))?;
        spool
            .write_all(&file.bytes)
            .map_err(|e| ApiError::Processing(format!("failed to spool upload: {e}")))?;

        let mut img = image::ImageReader::open(spool.path())
            .map_err(|e| ApiError::Processing(format!("failed to open upload: {e}")))?
            .with_guessed_format()
            .map_err(|e| ApiError::Processing(format!("unrecognized image format: {e}")))?
            .decode()
            .map_err(|e| ApiError::Processing(format!("failed to decode image: {e}")))?;

        if let Some((text, position, opacity)) = effective_watermark(session, options) {
            let font = self.watermark_font.as_ref().ok_or_else(|| {
                ApiError::Processing("watermark requested but no font is configured".to_string())
            })?;
            let mut base = img.to_rgba8();
            font.draw(&mut base, &text, position, opacity);
            img = image::DynamicImage::ImageRgba8(base);
        }

        let encoded = variants::derive_variants(&img, self.webp_enabled)
            .map_err(|e| ApiError::Processing(format!("failed to transcode image: {e}")))?;

        let photo_id = Uuid::new_v4();
        let mut variant_urls = std::collections::BTreeMap::new();
        let mut uploads = Vec::with_capacity(encoded.len());
        let mut original_size = file.bytes.len() as i64;
        for variant in &encoded {
            let path = variant_path(&self.path_prefix, session.id, photo_id, variant.kind);
            variant_urls.insert(variant.kind.as_str().to_string(), self.store.url_for(&path));
            if variant.kind == crate::models::VariantKind::Original {
                original_size = variant.bytes.len() as i64;
            }
            uploads.push((path, variant));
        }

        let status = if session.review_mode || options.review_required {
            PhotoStatus::Pending
        } else {
            PhotoStatus::Published
        };

        let tags = assemble_tags(
            &options.tags,
            options.auto_tag || session.auto_tag,
            &file.filename,
            img.width(),
            img.height(),
        );

        let now = Utc::now();
        let photo = Photo {
            id: photo_id,
            session_id: session.id,
            filename: file.filename.clone(),
            variant_urls,
            file_size: original_size,
            tags,
            status,
            view_count: 0,
            download_count: 0,
            metadata: PhotoMetadata {
                uploader_id,
                original_filename: file.filename.clone(),
                mime_type: file.mime_type.clone(),
                uploaded_at: now,
            },
            created_at: now,
            updated_at: now,
        };

        // Record first, blobs second: a half-written photo is compensated
        // away below instead of leaving orphaned blobs behind.
        self.photos
            .insert(&photo)
            .await
            .map_err(|e| ApiError::Persistence(format!("failed to persist photo record: {e}")))?;

        let mut written: Vec<String> = Vec::with_capacity(uploads.len());
        for (path, variant) in &uploads {
            match self
                .store
                .put(variant.bytes.clone(), path, variant.kind.content_type())
                .await
            {
                Ok(_) => written.push(path.clone()),
                Err(e) => {
                    self.compensate(session.id, photo_id, &written).await;
                    return Err(ApiError::Persistence(format!(
                        "failed to store variant {}: {e}",
                        variant.kind.as_str()
                    )));
                }
            }
        }

        info!(
            "Ingested photo {} into session {} as {}",
            photo.id,
            session.id,
            photo.status.as_str()
        );

        if photo.status == PhotoStatus::Published {
            self.publisher
                .publish(
                    &session_channel(session.id),
                    SessionEvent::NewPhoto(PhotoAnnouncement::from_photo(&photo)),
                )
                .await;
        }

        Ok(photo)
    }

    fn validate(&self, session: &Session, file: &UploadFile) -> Result<(), ApiError> {
        let extension_ok = file
            .filename
            .rsplit_once('.')
            .map(|(_, ext)| session.allows_extension(ext))
            .unwrap_or(false);
        let mime_ok = file.mime_type.starts_with("image/");

        if !extension_ok && !mime_ok {
            return Err(ApiError::Validation(format!(
                "file type of {} is not allowed for this session",
                file.filename
            )));
        }

        if file.bytes.len() as i64 > session.max_file_size {
            return Err(ApiError::Validation(format!(
                "{} exceeds the session limit of {} bytes",
                file.filename, session.max_file_size
            )));
        }

        Ok(())
    }

    /// Undo a partially ingested photo: remove blobs written so far, then
    /// the record itself.
    async fn compensate(&self, session_id: Uuid, photo_id: Uuid, written: &[String]) {
        for path in written {
            if let Err(e) = self.store.delete(path).await {
                warn!("Failed to clean up variant {path}: {e:#}");
            }
        }
        if let Err(e) = self.photos.delete_photos(session_id, &[photo_id]).await {
            warn!("Failed to remove photo record {photo_id}: {e:#}");
        }
    }
}

/// Effective watermark for one upload: session config wins for placement
/// and opacity, request text overrides the configured text.
fn effective_watermark(
    session: &Session,
    options: &IngestOptions,
) -> Option<(String, WatermarkPosition, f32)> {
    match (&session.watermark_config, &options.watermark_text) {
        (Some(cfg), Some(text)) => Some((text.clone(), cfg.position, cfg.opacity)),
        (Some(cfg), None) => Some((cfg.text.clone(), cfg.position, cfg.opacity)),
        (None, Some(text)) => Some((
            text.clone(),
            DEFAULT_WATERMARK_POSITION,
            DEFAULT_WATERMARK_OPACITY,
        )),
        (None, None) => None,
    }
}

/// Final tag set: explicit tags unioned with derived ones when auto-tagging
/// is on. Duplicates collapse by exact string match.
fn assemble_tags(
    explicit: &[String],
    auto_tag: bool,
    filename: &str,
    width: u32,
    height: u32,
) -> Vec<String> {
    if !auto_tag {
        return union_tags(explicit, &[]);
    }

    let mut derived = Vec::with_capacity(2);
    if let Some((_, ext)) = filename.rsplit_once('.') {
        derived.push(ext.to_ascii_lowercase());
    }
    derived.push(orientation_tag(width, height).to_string());

    union_tags(explicit, &derived)
}

fn orientation_tag(width: u32, height: u32) -> &'static str {
    if width > height {
        "landscape"
    } else if height > width {
        "portrait"
    } else {
        "square"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SessionVisibility, VariantKind, WatermarkConfig};
    use crate::test_support::{
        FailingObjectStore, MemoryObjectStore, MemoryPhotoGateway, RecordingPublisher, png_upload,
        test_session,
    };

    fn pipeline(
        photos: Arc<MemoryPhotoGateway>,
        store: Arc<dyn ObjectStore>,
        publisher: Arc<RecordingPublisher>,
        webp: bool,
    ) -> IngestionPipeline {
        IngestionPipeline::new(
            photos,
            store,
            publisher,
            "photos".to_string(),
            std::env::temp_dir(),
            webp,
            None,
        )
    }

    fn harness() -> (
        Arc<MemoryPhotoGateway>,
        Arc<MemoryObjectStore>,
        Arc<RecordingPublisher>,
        IngestionPipeline,
    ) {
        let photos = Arc::new(MemoryPhotoGateway::new());
        let store = Arc::new(MemoryObjectStore::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let p = pipeline(photos.clone(), store.clone(), publisher.clone(), false);
        (photos, store, publisher, p)
    }

    #[tokio::test]
    async fn published_upload_emits_events_in_submission_order() {
        let (photos, store, publisher, pipeline) = harness();
        let session = test_session(SessionVisibility::Public);
        let files = vec![
            png_upload("one.png", 64, 48),
            png_upload("two.png", 64, 48),
            png_upload("three.png", 64, 48),
        ];

        let outcome = pipeline
            .ingest_batch(&session, Uuid::new_v4(), &IngestOptions::default(), files)
            .await;

        assert_eq!(outcome.uploaded.len(), 3);
        assert!(outcome.failed.is_empty());
        assert!(outcome
            .uploaded
            .iter()
            .all(|p| p.status == PhotoStatus::Published));
        // original + medium + thumbnail per photo
        assert_eq!(store.len(), 9);

        let events = publisher.events();
        assert_eq!(events.len(), 3);
        for (event, photo) in events.iter().zip(&outcome.uploaded) {
            assert_eq!(event.0, session_channel(session.id));
            match &event.1 {
                SessionEvent::NewPhoto(a) => assert_eq!(a.id, photo.id),
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(photos.len(), 3);
    }

    #[tokio::test]
    async fn review_mode_forces_pending_and_suppresses_events() {
        let (_, _, publisher, pipeline) = harness();

        let mut session = test_session(SessionVisibility::Public);
        session.review_mode = true;

        let options = IngestOptions {
            review_required: false,
            ..Default::default()
        };
        let photo = pipeline
            .ingest(
                &session,
                Uuid::new_v4(),
                &options,
                png_upload("a.png", 32, 32),
            )
            .await
            .unwrap();

        assert_eq!(photo.status, PhotoStatus::Pending);
        assert!(publisher.events().is_empty());
    }

    #[tokio::test]
    async fn review_required_option_forces_pending_without_session_policy() {
        let (_, _, _, pipeline) = harness();
        let session = test_session(SessionVisibility::Public);
        let options = IngestOptions {
            review_required: true,
            ..Default::default()
        };

        let photo = pipeline
            .ingest(
                &session,
                Uuid::new_v4(),
                &options,
                png_upload("a.png", 32, 32),
            )
            .await
            .unwrap();
        assert_eq!(photo.status, PhotoStatus::Pending);
    }

    #[tokio::test]
    async fn one_bad_file_does_not_abort_siblings() {
        let (_, _, _, pipeline) = harness();
        let session = test_session(SessionVisibility::Public);

        let files = vec![
            png_upload("good.png", 32, 32),
            UploadFile {
                filename: "notes.txt".to_string(),
                mime_type: "text/plain".to_string(),
                bytes: b"not an image".to_vec(),
            },
            UploadFile {
                filename: "broken.png".to_string(),
                mime_type: "image/png".to_string(),
                bytes: vec![0u8; 64],
            },
            png_upload("also-good.png", 32, 32),
        ];

        let outcome = pipeline
            .ingest_batch(&session, Uuid::new_v4(), &IngestOptions::default(), files)
            .await;

        assert_eq!(outcome.uploaded.len(), 2);
        assert_eq!(outcome.failed.len(), 2);
        assert_eq!(outcome.failed[0].filename, "notes.txt");
        assert_eq!(outcome.failed[1].filename, "broken.png");
    }

    #[tokio::test]
    async fn oversized_files_fail_validation() {
        let (_, store, _, pipeline) = harness();
        let mut session = test_session(SessionVisibility::Public);
        session.max_file_size = 16;

        let result = pipeline
            .ingest(
                &session,
                Uuid::new_v4(),
                &IngestOptions::default(),
                png_upload("big.png", 64, 64),
            )
            .await;

        assert!(matches!(result, Err(ApiError::Validation(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn mime_prefix_rescues_unlisted_extension() {
        let (_, _, _, pipeline) = harness();
        let session = test_session(SessionVisibility::Public);
        let mut file = png_upload("photo.heic", 32, 32);
        file.mime_type = "image/heic".to_string();
        // Decoding will still fail (the bytes are png but that is fine),
        // validation itself must pass via the mime prefix.
        let err = pipeline
            .ingest(&session, Uuid::new_v4(), &IngestOptions::default(), file)
            .await;
        assert!(err.is_ok());
    }

    #[tokio::test]
    async fn upload_failure_compensates_record_and_blobs() {
        let photos = Arc::new(MemoryPhotoGateway::new());
        let store = Arc::new(FailingObjectStore::failing_on("medium"));
        let publisher = Arc::new(RecordingPublisher::new());
        let pipeline = pipeline(photos.clone(), store.clone(), publisher.clone(), false);
        let session = test_session(SessionVisibility::Public);

        let result = pipeline
            .ingest(
                &session,
                Uuid::new_v4(),
                &IngestOptions::default(),
                png_upload("a.png", 32, 32),
            )
            .await;

        assert!(matches!(result, Err(ApiError::Persistence(_))));
        assert_eq!(photos.len(), 0, "record must be compensated away");
        assert!(store.stored_paths().is_empty(), "blobs must be cleaned up");
        assert!(publisher.events().is_empty(), "no event for a failed ingest");
    }

    #[tokio::test]
    async fn insert_failure_leaves_no_blobs() {
        let photos = Arc::new(MemoryPhotoGateway::new());
        photos.fail_inserts(true);
        let store = Arc::new(MemoryObjectStore::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let pipeline = pipeline(photos.clone(), store.clone(), publisher, false);
        let session = test_session(SessionVisibility::Public);

        let result = pipeline
            .ingest(
                &session,
                Uuid::new_v4(),
                &IngestOptions::default(),
                png_upload("a.png", 32, 32),
            )
            .await;

        assert!(matches!(result, Err(ApiError::Persistence(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn temp_spool_is_cleaned_after_batch() {
        let spool = tempfile::tempdir().unwrap();
        let photos = Arc::new(MemoryPhotoGateway::new());
        let store = Arc::new(MemoryObjectStore::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let pipeline = IngestionPipeline::new(
            photos,
            store,
            publisher,
            "photos".to_string(),
            spool.path().to_path_buf(),
            false,
            None,
        );
        let session = test_session(SessionVisibility::Public);

        let files = vec![
            png_upload("ok.png", 32, 32),
            UploadFile {
                filename: "broken.png".to_string(),
                mime_type: "image/png".to_string(),
                bytes: vec![0u8; 16],
            },
        ];
        pipeline
            .ingest_batch(&session, Uuid::new_v4(), &IngestOptions::default(), files)
            .await;

        let leftovers = std::fs::read_dir(spool.path()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn webp_variant_recorded_when_enabled() {
        let photos = Arc::new(MemoryPhotoGateway::new());
        let store = Arc::new(MemoryObjectStore::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let pipeline = pipeline(photos, store.clone(), publisher, true);
        let session = test_session(SessionVisibility::Public);

        let photo = pipeline
            .ingest(
                &session,
                Uuid::new_v4(),
                &IngestOptions::default(),
                png_upload("a.png", 32, 32),
            )
            .await
            .unwrap();

        assert!(photo.variant_url(VariantKind::Webp).is_some());
        assert_eq!(store.len(), 4);
    }

    #[tokio::test]
    async fn watermark_without_font_is_a_processing_error() {
        let (_, _, _, pipeline) = harness();
        let mut session = test_session(SessionVisibility::Public);
        session.watermark_config = Some(WatermarkConfig {
            text: "© Snapframe".to_string(),
            position: WatermarkPosition::BottomRight,
            opacity: 0.4,
        });

        let result = pipeline
            .ingest(
                &session,
                Uuid::new_v4(),
                &IngestOptions::default(),
                png_upload("a.png", 32, 32),
            )
            .await;
        assert!(matches!(result, Err(ApiError::Processing(_))));
    }

    #[test]
    fn tag_assembly_unions_and_dedups() {
        let explicit = vec!["wedding".to_string(), "jpg".to_string()];
        let tags = assemble_tags(&explicit, true, "IMG_0001.JPG", 400, 300);
        assert_eq!(tags, vec!["wedding", "jpg", "landscape"]);

        let no_auto = assemble_tags(&explicit, false, "IMG_0001.JPG", 400, 300);
        assert_eq!(no_auto, vec!["wedding", "jpg"]);
    }

    #[test]
    fn orientation_tags() {
        assert_eq!(orientation_tag(400, 300), "landscape");
        assert_eq!(orientation_tag(300, 400), "portrait");
        assert_eq!(orientation_tag(300, 300), "square");
    }

    #[test]
    fn session_watermark_position_wins_over_request_text() {
        let mut session = test_session(SessionVisibility::Public);
        session.watermark_config = Some(WatermarkConfig {
            text: "studio".to_string(),
            position: WatermarkPosition::TopLeft,
            opacity: 0.8,
        });
        let options = IngestOptions {
            watermark_text: Some("override".to_string()),
            ..Default::default()
        };

        let (text, position, opacity) = effective_watermark(&session, &options).unwrap();
        assert_eq!(text, "override");
        assert_eq!(position, WatermarkPosition::TopLeft);
        assert_eq!(opacity, 0.8);
    }

    #[test]
    fn no_watermark_when_neither_source_provides_one() {
        let session = test_session(SessionVisibility::Public);
        assert!(effective_watermark(&session, &IngestOptions::default()).is_none());
    }
}
