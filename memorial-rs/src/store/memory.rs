use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{DocumentStore, IncrementOutcome, ProfileDocument, ProfileField, UsageRecompute};
use crate::error::Result;
use crate::registry::{MediaItem, MediaKind};

/// In-memory document store
///
/// All mutations happen under a single write lock, which makes the
/// additive update and set removal atomic.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    profiles: Arc<RwLock<HashMap<String, ProfileDocument>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored profiles
    pub async fn profile_count(&self) -> usize {
        self.profiles.read().await.len()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, profile_id: &str) -> Result<Option<ProfileDocument>> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(profile_id).cloned())
    }

    async fn ensure_profile(&self, profile_id: &str) -> Result<()> {
        let mut profiles = self.profiles.write().await;
        profiles
            .entry(profile_id.to_string())
            .or_insert_with(|| ProfileDocument::new(profile_id));
        Ok(())
    }

    async fn set_field(&self, profile_id: &str, field: ProfileField) -> Result<()> {
        let mut profiles = self.profiles.write().await;
        let doc = profiles
            .entry(profile_id.to_string())
            .or_insert_with(|| ProfileDocument::new(profile_id));

        match field {
            ProfileField::Biography(biography) => doc.biography = biography,
        }
        Ok(())
    }

    async fn add_to_set(
        &self,
        profile_id: &str,
        kind: MediaKind,
        item: &MediaItem,
    ) -> Result<bool> {
        let mut profiles = self.profiles.write().await;
        let doc = profiles
            .entry(profile_id.to_string())
            .or_insert_with(|| ProfileDocument::new(profile_id));

        let items = doc.items_mut(kind);
        if items.iter().any(|i| i.external_id == item.external_id) {
            return Ok(false);
        }
        items.push(item.clone());
        Ok(true)
    }

    async fn remove_from_set(
        &self,
        profile_id: &str,
        kind: MediaKind,
        external_id: &str,
    ) -> Result<Option<MediaItem>> {
        let mut profiles = self.profiles.write().await;
        let Some(doc) = profiles.get_mut(profile_id) else {
            return Ok(None);
        };

        let items = doc.items_mut(kind);
        let position = items.iter().position(|i| i.external_id == external_id);
        Ok(position.map(|idx| items.remove(idx)))
    }

    async fn update_description(
        &self,
        profile_id: &str,
        kind: MediaKind,
        external_id: &str,
        description: Option<&str>,
    ) -> Result<bool> {
        let mut profiles = self.profiles.write().await;
        let Some(doc) = profiles.get_mut(profile_id) else {
            return Ok(false);
        };

        match doc
            .items_mut(kind)
            .iter_mut()
            .find(|i| i.external_id == external_id)
        {
            Some(item) => {
                item.description = description.map(str::to_string);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn atomic_increment(&self, profile_id: &str, delta: i64) -> Result<IncrementOutcome> {
        let mut profiles = self.profiles.write().await;
        let doc = profiles
            .entry(profile_id.to_string())
            .or_insert_with(|| ProfileDocument::new(profile_id));

        doc.storage_version += 1;
        let outcome = IncrementOutcome::apply(doc.storage_used.unwrap_or(0), delta, doc.storage_version);
        doc.storage_used = Some(outcome.value);
        Ok(outcome)
    }

    async fn recompute_usage(&self, profile_id: &str) -> Result<UsageRecompute> {
        let mut profiles = self.profiles.write().await;
        let doc = profiles
            .entry(profile_id.to_string())
            .or_insert_with(|| ProfileDocument::new(profile_id));

        let previous = doc.storage_used;
        let value = doc.media_bytes();
        doc.storage_used = Some(value);
        doc.storage_version += 1;

        Ok(UsageRecompute {
            previous,
            value,
            version: doc.storage_version,
        })
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
