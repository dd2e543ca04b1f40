//! In-memory doubles and factories shared by unit tests

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::fanout::{Publisher, SessionEvent};
use crate::gateway::PhotoGateway;
use crate::ingest::UploadFile;
use crate::models::{
    Photo, PhotoChanges, PhotoMetadata, PhotoStatus, Session, SessionStatus, SessionVisibility,
};
use crate::storage::ObjectStore;

/// Session factory with permissive defaults
pub fn test_session(visibility: SessionVisibility) -> Session {
    Session {
        id: Uuid::new_v4(),
        owner_id: Uuid::new_v4(),
        visibility,
        access_code: match visibility {
            SessionVisibility::Private => Some("secret".to_string()),
            SessionVisibility::Public => None,
        },
        status: SessionStatus::Active,
        review_mode: false,
        auto_tag: false,
        watermark_config: None,
        max_file_size: 10 * 1024 * 1024,
        allowed_extensions: vec!["jpg".into(), "jpeg".into(), "png".into()],
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Encode a solid PNG as an upload payload
pub fn png_upload(filename: &str, width: u32, height: u32) -> UploadFile {
    let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
        width,
        height,
        image::Rgba([20, 140, 90, 255]),
    ));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png)
        .expect("png encode");
    UploadFile {
        filename: filename.to_string(),
        mime_type: "image/png".to_string(),
        bytes: bytes.into_inner(),
    }
}

/// Insert a minimal photo record into the gateway double
pub async fn stored_photo(
    gateway: &MemoryPhotoGateway,
    session_id: Uuid,
    status: PhotoStatus,
) -> Photo {
    let id = Uuid::new_v4();
    let mut variant_urls = BTreeMap::new();
    for name in ["original", "medium", "thumbnail"] {
        variant_urls.insert(
            name.to_string(),
            format!("memory://photos/sessions/{session_id}/{id}/{name}.jpg"),
        );
    }
    let now = Utc::now();
    let photo = Photo {
        id,
        session_id,
        filename: format!("{id}.jpg"),
        variant_urls,
        file_size: 1024,
        tags: Vec::new(),
        status,
        view_count: 0,
        download_count: 0,
        metadata: PhotoMetadata {
            uploader_id: Uuid::new_v4(),
            original_filename: format!("{id}.jpg"),
            mime_type: "image/jpeg".to_string(),
            uploaded_at: now,
        },
        created_at: now,
        updated_at: now,
    };
    gateway.insert(&photo).await.expect("insert test photo");
    photo
}

/// Hash-map backed photo gateway
#[derive(Default)]
pub struct MemoryPhotoGateway {
    photos: Mutex<HashMap<Uuid, Photo>>,
    fail_inserts: AtomicBool,
}

impl MemoryPhotoGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.photos.lock().unwrap().len()
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub async fn status_of(&self, id: Uuid) -> Option<PhotoStatus> {
        self.photos.lock().unwrap().get(&id).map(|p| p.status)
    }

    pub async fn tags_of(&self, id: Uuid) -> Option<Vec<String>> {
        self.photos.lock().unwrap().get(&id).map(|p| p.tags.clone())
    }
}

#[async_trait]
impl PhotoGateway for MemoryPhotoGateway {
    async fn insert(&self, photo: &Photo) -> Result<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            bail!("simulated insert failure");
        }
        self.photos.lock().unwrap().insert(photo.id, photo.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Photo>> {
        Ok(self.photos.lock().unwrap().get(&id).cloned())
    }

    async fn update(&self, id: Uuid, changes: &PhotoChanges) -> Result<Option<Photo>> {
        let mut photos = self.photos.lock().unwrap();
        Ok(photos.get_mut(&id).map(|photo| {
            if let Some(tags) = &changes.tags {
                photo.tags = tags.clone();
            }
            if let Some(status) = changes.status {
                photo.status = status;
            }
            photo.updated_at = Utc::now();
            photo.clone()
        }))
    }

    async fn list_by_ids(&self, session_id: Uuid, ids: &[Uuid]) -> Result<Vec<Photo>> {
        let photos = self.photos.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| photos.get(id))
            .filter(|p| p.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn approve_pending(&self, session_id: Uuid, ids: &[Uuid]) -> Result<Vec<Photo>> {
        let mut photos = self.photos.lock().unwrap();
        let mut transitioned = Vec::new();
        for id in ids {
            if let Some(photo) = photos.get_mut(id) {
                if photo.session_id == session_id && photo.status == PhotoStatus::Pending {
                    photo.status = PhotoStatus::Published;
                    photo.updated_at = Utc::now();
                    transitioned.push(photo.clone());
                }
            }
        }
        Ok(transitioned)
    }

    async fn reject_pending(&self, session_id: Uuid, ids: &[Uuid]) -> Result<u64> {
        let mut photos = self.photos.lock().unwrap();
        let mut affected = 0;
        for id in ids {
            if let Some(photo) = photos.get_mut(id) {
                if photo.session_id == session_id && photo.status == PhotoStatus::Pending {
                    photo.status = PhotoStatus::Rejected;
                    photo.updated_at = Utc::now();
                    affected += 1;
                }
            }
        }
        Ok(affected)
    }

    async fn delete_photos(&self, session_id: Uuid, ids: &[Uuid]) -> Result<Vec<Photo>> {
        let mut photos = self.photos.lock().unwrap();
        let mut removed = Vec::new();
        for id in ids {
            let matches = photos
                .get(id)
                .map(|p| p.session_id == session_id)
                .unwrap_or(false);
            if matches {
                removed.push(photos.remove(id).unwrap());
            }
        }
        Ok(removed)
    }
}

/// Publisher that records instead of delivering
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<(String, SessionEvent)>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, SessionEvent)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, channel: &str, event: SessionEvent) {
        self.events
            .lock()
            .unwrap()
            .push((channel.to_string(), event));
    }
}

/// Hash-map backed object store
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.lock().unwrap().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn paths(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, bytes: Vec<u8>, path: &str, _content_type: &str) -> Result<String> {
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes);
        Ok(self.url_for(path))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.objects.lock().unwrap().remove(path);
        Ok(())
    }

    fn url_for(&self, path: &str) -> String {
        format!("memory://{path}")
    }
}

/// Object store that fails puts whose path contains a marker substring,
/// or every delete when constructed with [`FailingObjectStore::failing_deletes`].
pub struct FailingObjectStore {
    inner: MemoryObjectStore,
    fail_marker: Option<String>,
    fail_deletes: bool,
}

impl FailingObjectStore {
    pub fn failing_on(marker: &str) -> Self {
        Self {
            inner: MemoryObjectStore::new(),
            fail_marker: Some(marker.to_string()),
            fail_deletes: false,
        }
    }

    pub fn failing_deletes() -> Self {
        Self {
            inner: MemoryObjectStore::new(),
            fail_marker: None,
            fail_deletes: true,
        }
    }

    pub fn stored_paths(&self) -> Vec<String> {
        self.inner.paths()
    }
}

#[async_trait]
impl ObjectStore for FailingObjectStore {
    async fn put(&self, bytes: Vec<u8>, path: &str, content_type: &str) -> Result<String> {
        if let Some(marker) = &self.fail_marker {
            if path.contains(marker) {
                bail!("simulated store failure for {path}");
            }
        }
        self.inner.put(bytes, path, content_type).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        if self.fail_deletes {
            bail!("simulated delete failure for {path}");
        }
        self.inner.delete(path).await
    }

    fn url_for(&self, path: &str) -> String {
        self.inner.url_for(path)
    }
}
