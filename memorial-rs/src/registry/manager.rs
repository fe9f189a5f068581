//! Media registry operations over the document store

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use super::types::{MediaItem, MediaKind};
use crate::error::{MemorialError, Result};
use crate::quota::QuotaPolicy;
use crate::store::DocumentStore;

/// Ordered photo/video collections of a profile
#[derive(Clone)]
pub struct MediaRegistry {
    store: Arc<dyn DocumentStore>,
    policy: QuotaPolicy,
}

impl MediaRegistry {
    pub fn new(store: Arc<dyn DocumentStore>, policy: QuotaPolicy) -> Self {
        Self { store, policy }
    }

    /// Append an item. Assigns `created_at` if absent, strictly after the
    /// newest item already in the collection.
    pub async fn add(&self, profile_id: &str, kind: MediaKind, mut item: MediaItem) -> Result<MediaItem> {
        if item.size_bytes == 0 {
            return Err(MemorialError::Validation(
                "media item size must be positive".to_string(),
            ));
        }

        if item.created_at.is_none() {
            let newest = self
                .list(profile_id, kind)
                .await?
                .iter()
                .filter_map(|i| i.created_at)
                .max();

            let now = Utc::now();
            item.created_at = Some(match newest {
                Some(newest) if newest >= now => newest + Duration::microseconds(1),
                _ => now,
            });
        }

        let inserted = self.store.add_to_set(profile_id, kind, &item).await?;
        if !inserted {
            return Err(MemorialError::Validation(format!(
                "{} {} is already registered",
                kind.label(),
                item.external_id
            )));
        }

        info!(
            "Registered {} {} ({} bytes) for profile {}",
            kind, item.external_id, item.size_bytes, profile_id
        );
        Ok(item)
    }

    /// Remove the item matching `external_id` and `kind`.
    ///
    /// Returns `None` when the item was already absent, so retried
    /// deletions are harmless.
    pub async fn remove(
        &self,
        profile_id: &str,
        kind: MediaKind,
        external_id: &str,
    ) -> Result<Option<MediaItem>> {
        let removed = self.store.remove_from_set(profile_id, kind, external_id).await?;

        match &removed {
            Some(item) => info!(
                "Removed {} {} ({} bytes) from profile {}",
                kind, external_id, item.size_bytes, profile_id
            ),
            None => debug!("{} {} already absent from profile {}", kind, external_id, profile_id),
        }

        Ok(removed)
    }

    /// Replace only the description of an item. Oversized values are
    /// rejected and leave the item unchanged.
    pub async fn update_description(
        &self,
        profile_id: &str,
        kind: MediaKind,
        external_id: &str,
        description: &str,
    ) -> Result<MediaItem> {
        self.policy.validate_description(description)?;

        let description = description.trim();
        let description = (!description.is_empty()).then_some(description);

        let updated = self
            .store
            .update_description(profile_id, kind, external_id, description)
            .await?;
        if !updated {
            return Err(MemorialError::NotFound(format!("{} {}", kind.label(), external_id)));
        }

        self.find(profile_id, kind, external_id)
            .await?
            .ok_or_else(|| MemorialError::NotFound(format!("{} {}", kind.label(), external_id)))
    }

    pub async fn find(
        &self,
        profile_id: &str,
        kind: MediaKind,
        external_id: &str,
    ) -> Result<Option<MediaItem>> {
        Ok(self
            .list(profile_id, kind)
            .await?
            .into_iter()
            .find(|i| i.external_id == external_id))
    }

    /// Items of one kind in insertion order
    pub async fn list(&self, profile_id: &str, kind: MediaKind) -> Result<Vec<MediaItem>> {
        Ok(self
            .store
            .get(profile_id)
            .await?
            .map(|mut doc| std::mem::take(doc.items_mut(kind)))
            .unwrap_or_default())
    }

    /// Items of one kind for display: newest first, undated items skipped
    pub async fn timeline(&self, profile_id: &str, kind: MediaKind) -> Result<Vec<MediaItem>> {
        let mut items: Vec<MediaItem> = self
            .list(profile_id, kind)
            .await?
            .into_iter()
            .filter(|i| i.created_at.is_some())
            .collect();

        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    /// Sum of recorded sizes across photos and videos
    pub async fn total_bytes(&self, profile_id: &str) -> Result<u64> {
        Ok(self
            .store
            .get(profile_id)
            .await?
            .map(|doc| doc.media_bytes())
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDocumentStore;

    fn registry() -> MediaRegistry {
        MediaRegistry::new(Arc::new(MemoryDocumentStore::new()), QuotaPolicy::default())
    }

    fn item(id: &str, size: u64) -> MediaItem {
        MediaItem::new(format!("https://cdn.test/{}", id), id.to_string(), size)
    }

    #[tokio::test]
    async fn test_add_assigns_created_at() {
        let registry = registry();
        let added = registry.add("public", MediaKind::Photo, item("p1", 10)).await.unwrap();
        assert!(added.created_at.is_some());
    }

    #[tokio::test]
    async fn test_add_timestamps_strictly_increase() {
        let registry = registry();
        let mut last = None;
        for i in 0..20 {
            let added = registry
                .add("public", MediaKind::Photo, item(&format!("p{}", i), 1))
                .await
                .unwrap();
            assert!(added.created_at > last);
            last = added.created_at;
        }
    }

    #[tokio::test]
    async fn test_add_rejects_zero_size() {
        let registry = registry();
        let err = registry.add("public", MediaKind::Photo, item("p1", 0)).await.unwrap_err();
        assert!(matches!(err, MemorialError::Validation(_)));
    }

    #[tokio::test]
    async fn test_add_then_remove_restores_registry() {
        let registry = registry();
        registry.add("public", MediaKind::Video, item("v0", 5)).await.unwrap();
        let before = registry.list("public", MediaKind::Video).await.unwrap();

        registry.add("public", MediaKind::Video, item("v1", 20)).await.unwrap();
        registry.remove("public", MediaKind::Video, "v1").await.unwrap();

        assert_eq!(registry.list("public", MediaKind::Video).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = registry();
        registry.add("public", MediaKind::Photo, item("p1", 10)).await.unwrap();

        assert!(registry.remove("public", MediaKind::Photo, "p1").await.unwrap().is_some());
        let after_first = registry.list("public", MediaKind::Photo).await.unwrap();

        assert!(registry.remove("public", MediaKind::Photo, "p1").await.unwrap().is_none());
        assert_eq!(registry.list("public", MediaKind::Photo).await.unwrap(), after_first);
    }

    #[tokio::test]
    async fn test_update_description_rejects_oversized() {
        let registry = registry();
        registry
            .add("public", MediaKind::Photo, item("p1", 10).with_description("original"))
            .await
            .unwrap();

        let err = registry
            .update_description("public", MediaKind::Photo, "p1", &"x".repeat(501))
            .await
            .unwrap_err();
        assert!(matches!(err, MemorialError::Validation(_)));

        let stored = registry.find("public", MediaKind::Photo, "p1").await.unwrap().unwrap();
        assert_eq!(stored.description.as_deref(), Some("original"));
    }

    #[tokio::test]
    async fn test_update_description_keeps_size() {
        let registry = registry();
        registry.add("public", MediaKind::Photo, item("p1", 1234)).await.unwrap();

        let updated = registry
            .update_description("public", MediaKind::Photo, "p1", "  En la playa  ")
            .await
            .unwrap();
        assert_eq!(updated.description.as_deref(), Some("En la playa"));
        assert_eq!(updated.size_bytes, 1234);

        let cleared = registry
            .update_description("public", MediaKind::Photo, "p1", "")
            .await
            .unwrap();
        assert!(cleared.description.is_none());
    }

    #[tokio::test]
    async fn test_update_description_missing_item() {
        let registry = registry();
        let err = registry
            .update_description("public", MediaKind::Video, "nope", "hola")
            .await
            .unwrap_err();
        assert!(matches!(err, MemorialError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_timeline_newest_first() {
        let registry = registry();
        for id in ["first", "second", "third"] {
            registry.add("public", MediaKind::Photo, item(id, 1)).await.unwrap();
        }

        let ids: Vec<_> = registry
            .timeline("public", MediaKind::Photo)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.external_id)
            .collect();
        assert_eq!(ids, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_total_bytes() {
        let registry = registry();
        assert_eq!(registry.total_bytes("public").await.unwrap(), 0);

        registry.add("public", MediaKind::Photo, item("p", 10)).await.unwrap();
        registry.add("public", MediaKind::Video, item("v", 32)).await.unwrap();
        assert_eq!(registry.total_bytes("public").await.unwrap(), 42);
    }
}
