use std::sync::Arc;

use bytes::Bytes;
use tracing::info;

use crate::application::error::ServiceError;
use crate::application::input::required;
use crate::application::repos::{BlobError, BlobStore};
use crate::domain::entities::StoredBlob;

#[derive(Clone)]
pub struct UploadService {
    blobs: Arc<dyn BlobStore>,
    max_bytes: u64,
}

impl UploadService {
    pub fn new(blobs: Arc<dyn BlobStore>, max_bytes: u64) -> Self {
        Self { blobs, max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub async fn upload(&self, filename: &str, data: Bytes) -> Result<StoredBlob, ServiceError> {
        let filename = required(filename, "filename")?;
        if data.is_empty() {
            return Err(BlobError::EmptyPayload.into());
        }
        if data.len() as u64 > self.max_bytes {
            return Err(BlobError::TooLarge {
                limit: self.max_bytes,
            }
            .into());
        }

        let stored = self.blobs.upload(&filename, data).await?;
        info!(
            target = "marketdesk::uploads",
            path = %stored.path,
            size_bytes = stored.size_bytes,
            content_type = %stored.content_type,
            "upload stored"
        );
        Ok(stored)
    }

    pub async fn read(&self, path: &str) -> Result<Bytes, ServiceError> {
        Ok(self.blobs.read(path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::uploads::FilesystemBlobStore;

    fn service(dir: &tempfile::TempDir, max_bytes: u64) -> UploadService {
        let store = FilesystemBlobStore::new(dir.path().to_path_buf(), "http://cdn.test/files")
            .expect("blob store");
        UploadService::new(Arc::new(store), max_bytes)
    }

    #[tokio::test]
    async fn stores_and_reads_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = service(&dir, 1024);

        let stored = service
            .upload("Hero Banner.PNG", Bytes::from_static(b"png-bytes"))
            .await
            .expect("upload");
        assert!(stored.path.ends_with("hero-banner.png"));
        assert_eq!(stored.content_type, "image/png");
        assert_eq!(stored.public_url, format!("http://cdn.test/files/{}", stored.path));

        let data = service.read(&stored.path).await.expect("read");
        assert_eq!(&data[..], b"png-bytes");
    }

    #[tokio::test]
    async fn rejects_empty_and_oversized_payloads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = service(&dir, 4);

        assert!(matches!(
            service.upload("a.txt", Bytes::new()).await,
            Err(ServiceError::Blob(BlobError::EmptyPayload))
        ));
        assert!(matches!(
            service.upload("a.txt", Bytes::from_static(b"12345")).await,
            Err(ServiceError::Blob(BlobError::TooLarge { limit: 4 }))
        ));
        assert!(matches!(
            service.upload(" ", Bytes::from_static(b"1")).await,
            Err(ServiceError::Validation(_))
        ));
    }
}
