use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{DeleteStatus, MediaTransport, UploadedMedia};
use crate::error::{MemorialError, Result};
use crate::registry::MediaKind;

/// In-process media host
#[derive(Clone)]
pub struct MemoryTransport {
    folder_root: String,
    objects: Arc<RwLock<HashMap<(MediaKind, String), Bytes>>>,
}

impl MemoryTransport {
    pub fn new(folder_root: impl Into<String>) -> Self {
        Self {
            folder_root: folder_root.into(),
            objects: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn contains(&self, external_id: &str, kind: MediaKind) -> bool {
        self.objects
            .read()
            .await
            .contains_key(&(kind, external_id.to_string()))
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new("kora")
    }
}

#[async_trait]
impl MediaTransport for MemoryTransport {
    async fn upload(&self, data: Bytes, kind: MediaKind) -> Result<UploadedMedia> {
        if data.is_empty() {
            return Err(MemorialError::Transport("empty upload".to_string()));
        }

        let external_id = format!(
            "{}/{}/{}",
            self.folder_root,
            kind.collection(),
            Uuid::new_v4().simple()
        );
        let size_bytes = data.len() as u64;

        self.objects
            .write()
            .await
            .insert((kind, external_id.clone()), data);
        debug!("Stored {} {} in memory ({} bytes)", kind, external_id, size_bytes);

        Ok(UploadedMedia {
            locator: format!("memory://{}", external_id),
            external_id,
            size_bytes,
        })
    }

    async fn delete(&self, external_id: &str, kind: MediaKind) -> Result<DeleteStatus> {
        let removed = self
            .objects
            .write()
            .await
            .remove(&(kind, external_id.to_string()));

        Ok(match removed {
            Some(_) => DeleteStatus::Ok,
            None => DeleteStatus::NotFound,
        })
    }

    async fn list_objects(&self, kind: MediaKind) -> Result<Vec<String>> {
        let objects = self.objects.read().await;
        let mut ids: Vec<String> = objects
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_and_delete() {
        let transport = MemoryTransport::new("kora");
        let uploaded = transport
            .upload(Bytes::from_static(b"photo-bytes"), MediaKind::Photo)
            .await
            .unwrap();

        assert_eq!(uploaded.size_bytes, 11);
        assert!(uploaded.external_id.starts_with("kora/photos/"));
        assert!(transport.contains(&uploaded.external_id, MediaKind::Photo).await);

        let status = transport.delete(&uploaded.external_id, MediaKind::Photo).await.unwrap();
        assert_eq!(status, DeleteStatus::Ok);

        let status = transport.delete(&uploaded.external_id, MediaKind::Photo).await.unwrap();
        assert_eq!(status, DeleteStatus::NotFound);
        assert_eq!(transport.object_count().await, 0);
    }

    #[tokio::test]
    async fn test_list_objects_by_kind() {
        let transport = MemoryTransport::new("kora");
        let photo = transport.upload(Bytes::from_static(b"p"), MediaKind::Photo).await.unwrap();
        transport.upload(Bytes::from_static(b"v"), MediaKind::Video).await.unwrap();

        let photos = transport.list_objects(MediaKind::Photo).await.unwrap();
        assert_eq!(photos, vec![photo.external_id]);
        assert_eq!(transport.list_objects(MediaKind::Video).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_upload_fails() {
        let transport = MemoryTransport::default();
        let err = transport.upload(Bytes::new(), MediaKind::Video).await.unwrap_err();
        assert!(matches!(err, MemorialError::Transport(_)));
    }
}
