//! Object storage behind a path-keyed put/delete interface

use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::{Client, primitives::ByteStream};
use tracing::info;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::models::VariantKind;

/// Path-addressed blob store. `put` and `delete` are idempotent per path.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write bytes under `path`, returning the public URL.
    async fn put(&self, bytes: Vec<u8>, path: &str, content_type: &str) -> Result<String>;

    /// Remove the object at `path`. Removing a missing object is not an error.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Public URL an object at `path` is served from.
    fn url_for(&self, path: &str) -> String;
}

/// Session-scoped object path for one photo variant
pub fn variant_path(prefix: &str, session_id: Uuid, photo_id: Uuid, kind: VariantKind) -> String {
    format!(
        "{prefix}/sessions/{session_id}/{photo_id}/{}.{}",
        kind.as_str(),
        kind.extension()
    )
}

/// S3-backed object store
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, config: &StorageConfig) -> Self {
        Self {
            client,
            bucket: config.bucket.clone(),
            public_base_url: config.public_base_url.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, bytes: Vec<u8>, path: &str, content_type: &str) -> Result<String> {
        info!("Uploading object to S3: {}", path);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await?;

        Ok(self.url_for(path))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        info!("Deleting object from S3: {}", path);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await?;

        Ok(())
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryObjectStore;

    #[test]
    fn variant_paths_are_session_scoped() {
        let session = Uuid::new_v4();
        let photo = Uuid::new_v4();
        let path = variant_path("photos", session, photo, VariantKind::Thumbnail);
        assert_eq!(
            path,
            format!("photos/sessions/{session}/{photo}/thumbnail.jpg")
        );
        let webp = variant_path("photos", session, photo, VariantKind::Webp);
        assert!(webp.ends_with("webp.webp"));
    }

    #[tokio::test]
    async fn memory_store_put_delete_round_trip() {
        let store = MemoryObjectStore::new();
        let url = store
            .put(vec![1, 2, 3], "photos/a/b/original.jpg", "image/jpeg")
            .await
            .unwrap();
        assert_eq!(url, "memory://photos/a/b/original.jpg");
        assert!(store.contains("photos/a/b/original.jpg"));

        store.delete("photos/a/b/original.jpg").await.unwrap();
        assert!(!store.contains("photos/a/b/original.jpg"));
        // Deleting again is a no-op, not an error.
        store.delete("photos/a/b/original.jpg").await.unwrap();
    }
}
