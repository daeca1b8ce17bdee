//! Profile image storage.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::shared::AppError;

pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/png", "image/jpeg", "image/gif", "image/webp"];

/// Where an uploaded file ended up
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub id: String,
    pub url: String,
}

/// An image received from a multipart form
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.bytes.is_empty() {
            return Err(AppError::BadRequest("Uploaded image is empty".to_string()));
        }
        if !ALLOWED_IMAGE_TYPES.contains(&self.content_type.as_str()) {
            return Err(AppError::BadRequest(
                "Not an image! Please upload only images.".to_string(),
            ));
        }
        Ok(())
    }

    pub fn extension(&self) -> &'static str {
        match self.content_type.as_str() {
            "image/jpeg" => "jpg",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "png",
        }
    }
}

/// Encodes a buffer as a `data:` URI
pub fn to_data_uri(content_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", content_type, STANDARD.encode(bytes))
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn upload(&self, upload: &ImageUpload) -> Result<StoredFile, AppError>;
    async fn delete(&self, id: &str) -> Result<(), AppError>;
}

/// Writes uploads under a local directory
pub struct DiskFileStore {
    root: PathBuf,
}

impl DiskFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl FileStore for DiskFileStore {
    #[instrument(skip(self, upload), fields(content_type = %upload.content_type, size = upload.bytes.len()))]
    async fn upload(&self, upload: &ImageUpload) -> Result<StoredFile, AppError> {
        let id = format!("{}.{}", Uuid::new_v4(), upload.extension());

        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            warn!(error = %e, "Failed to create upload directory");
            AppError::StorageError(e.to_string())
        })?;
        tokio::fs::write(self.root.join(&id), &upload.bytes)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to write upload");
                AppError::StorageError(e.to_string())
            })?;

        debug!(file_id = %id, "Stored upload on disk");
        Ok(StoredFile {
            url: format!("/uploads/{}", id),
            id,
        })
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<(), AppError> {
        match tokio::fs::remove_file(self.root.join(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(error = %e, "Failed to delete upload");
                Err(AppError::StorageError(e.to_string()))
            }
        }
    }
}

/// Keeps uploads as data URIs in memory
#[derive(Default)]
pub struct InMemoryFileStore {
    files: RwLock<HashMap<String, String>>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
        }
    }

    pub async fn file_count(&self) -> usize {
        self.files.read().await.len()
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn upload(&self, upload: &ImageUpload) -> Result<StoredFile, AppError> {
        let id = Uuid::new_v4().to_string();
        let url = to_data_uri(&upload.content_type, &upload.bytes);

        self.files.write().await.insert(id.clone(), url.clone());
        Ok(StoredFile { id, url })
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.files.write().await.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png() -> ImageUpload {
        ImageUpload {
            content_type: "image/png".to_string(),
            bytes: vec![0x89, b'P', b'N', b'G'],
        }
    }

    #[test]
    fn test_to_data_uri() {
        assert_eq!(to_data_uri("image/png", b"hi"), "data:image/png;base64,aGk=");
    }

    #[test]
    fn test_validate_rejects_non_images() {
        let upload = ImageUpload {
            content_type: "application/pdf".to_string(),
            bytes: vec![1, 2, 3],
        };
        assert!(matches!(upload.validate(), Err(AppError::BadRequest(_))));

        let empty = ImageUpload {
            bytes: Vec::new(),
            ..png()
        };
        assert!(empty.validate().is_err());
        assert!(png().validate().is_ok());
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryFileStore::new();
        let stored = store.upload(&png()).await.unwrap();

        assert!(stored.url.starts_with("data:image/png;base64,"));
        assert_eq!(store.file_count().await, 1);

        store.delete(&stored.id).await.unwrap();
        store.delete(&stored.id).await.unwrap();
        assert_eq!(store.file_count().await, 0);
    }

    #[tokio::test]
    async fn test_disk_store_round_trip() {
        let root = std::env::temp_dir().join(format!("storefront-uploads-{}", Uuid::new_v4()));
        let store = DiskFileStore::new(&root);

        let stored = store.upload(&png()).await.unwrap();
        assert!(stored.id.ends_with(".png"));
        assert!(root.join(&stored.id).exists());

        store.delete(&stored.id).await.unwrap();
        assert!(!root.join(&stored.id).exists());

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
