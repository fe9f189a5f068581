use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::timeline::{merge_timeline, TimelineEntry};
use crate::comments::CommentManager;
use crate::error::{MemorialError, Result};
use crate::ledger::UsageLedger;
use crate::quota::{QuotaPolicy, UsageSnapshot};
use crate::registry::{MediaItem, MediaKind, MediaRegistry};
use crate::security::Identity;
use crate::store::{DocumentStore, ProfileField};

/// Public view of the memorial page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileView {
    pub id: String,
    pub biography: String,
    /// Newest first
    pub photos: Vec<MediaItem>,
    /// Newest first
    pub videos: Vec<MediaItem>,
    pub usage: UsageSnapshot,
}

/// Profile reads and biography edits
#[derive(Clone)]
pub struct ProfileService {
    profile_id: String,
    store: Arc<dyn DocumentStore>,
    registry: MediaRegistry,
    ledger: UsageLedger,
    comments: CommentManager,
    policy: QuotaPolicy,
}

impl ProfileService {
    pub fn new(
        profile_id: impl Into<String>,
        store: Arc<dyn DocumentStore>,
        registry: MediaRegistry,
        ledger: UsageLedger,
        comments: CommentManager,
        policy: QuotaPolicy,
    ) -> Self {
        Self {
            profile_id: profile_id.into(),
            store,
            registry,
            ledger,
            comments,
            policy,
        }
    }

    /// Load the profile, creating it with defaulted fields on first access
    pub async fn get_profile(&self) -> Result<ProfileView> {
        self.store.ensure_profile(&self.profile_id).await?;

        let doc = self
            .store
            .get(&self.profile_id)
            .await?
            .ok_or_else(|| MemorialError::NotFound(format!("profile {}", self.profile_id)))?;

        let view = ProfileView {
            id: doc.id,
            biography: doc.biography,
            photos: self.registry.timeline(&self.profile_id, MediaKind::Photo).await?,
            videos: self.registry.timeline(&self.profile_id, MediaKind::Video).await?,
            usage: self.ledger.snapshot(&self.profile_id).await?,
        };

        debug!(
            "Loaded profile {} ({} photos, {} videos)",
            view.id,
            view.photos.len(),
            view.videos.len()
        );
        Ok(view)
    }

    /// Photos, videos and comments in one list, newest first
    pub async fn timeline(&self) -> Result<Vec<TimelineEntry>> {
        let entries = merge_timeline(
            self.registry.list(&self.profile_id, MediaKind::Photo).await?,
            self.registry.list(&self.profile_id, MediaKind::Video).await?,
            self.comments.list().await?,
        );
        debug!("Timeline of {} has {} entries", self.profile_id, entries.len());
        Ok(entries)
    }

    pub async fn update_biography(&self, identity: &Identity, biography: &str) -> Result<String> {
        identity.require_admin()?;
        self.policy.validate_biography(biography)?;

        let biography = biography.trim().to_string();
        self.store
            .set_field(&self.profile_id, ProfileField::Biography(biography.clone()))
            .await?;

        info!(
            "Biography of {} updated by {} ({} chars)",
            self.profile_id,
            identity.subject,
            biography.chars().count()
        );
        Ok(biography)
    }
}
