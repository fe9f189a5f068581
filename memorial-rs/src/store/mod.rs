//! Document store abstraction for profile documents
//!
//! The profile is a single document holding the biography, the photo and
//! video collections and the storage usage field. Backends must provide an
//! atomic additive update for the usage field so that concurrent sessions
//! never lose increments.
//!
//! - [`memory`]: in-process store (tests, development)
//! - [`sqlite`]: SQLite-backed store via `sqlx`

pub mod memory;
pub mod sqlite;

pub use memory::MemoryDocumentStore;
pub use sqlite::{open_pool, SqliteDocumentStore};

use crate::error::Result;
use crate::registry::{MediaItem, MediaKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Persisted shape of a profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDocument {
    pub id: String,
    pub biography: String,
    pub photos: Vec<MediaItem>,
    pub videos: Vec<MediaItem>,
    /// `None` until the usage field has been written once
    pub storage_used: Option<u64>,
    /// Bumped by every write of `storage_used`
    pub storage_version: u64,
}

impl ProfileDocument {
    pub fn new(id: impl Into<String>) -> Self {
        ProfileDocument {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn items(&self, kind: MediaKind) -> &[MediaItem] {
        match kind {
            MediaKind::Photo => &self.photos,
            MediaKind::Video => &self.videos,
        }
    }

    pub fn items_mut(&mut self, kind: MediaKind) -> &mut Vec<MediaItem> {
        match kind {
            MediaKind::Photo => &mut self.photos,
            MediaKind::Video => &mut self.videos,
        }
    }

    /// Sum of recorded sizes across both collections
    pub fn media_bytes(&self) -> u64 {
        self.photos
            .iter()
            .chain(self.videos.iter())
            .fold(0u64, |acc, item| acc.saturating_add(item.size_bytes))
    }
}

/// Scalar profile fields that can be written directly (merge semantics).
/// The usage field is only written through [`DocumentStore::atomic_increment`]
/// and [`DocumentStore::recompute_usage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileField {
    Biography(String),
}

/// Result of an atomic additive update of the usage field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncrementOutcome {
    pub previous: u64,
    pub value: u64,
    /// The raw result was negative and the stored value was clamped to zero
    pub clamped: bool,
    /// Usage version written together with `value`
    pub version: u64,
}

impl IncrementOutcome {
    /// Clamp `previous + delta` at zero. `version` is the version of the
    /// write that stores the result.
    pub fn apply(previous: u64, delta: i64, version: u64) -> Self {
        let raw = i128::from(previous) + i128::from(delta);
        let (value, clamped) = if raw < 0 {
            (0, true)
        } else {
            (u64::try_from(raw).unwrap_or(u64::MAX), false)
        };

        IncrementOutcome {
            previous,
            value,
            clamped,
            version,
        }
    }
}

/// Result of overwriting the usage field with the registry sum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageRecompute {
    /// Value before the write; `None` if the field was absent
    pub previous: Option<u64>,
    pub value: u64,
    pub version: u64,
}

/// Profile document store
///
/// Every write creates the profile with defaulted fields when it does not
/// exist yet.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a profile document
    async fn get(&self, profile_id: &str) -> Result<Option<ProfileDocument>>;

    /// Create the profile with defaulted fields if absent
    async fn ensure_profile(&self, profile_id: &str) -> Result<()>;

    /// Write a scalar field, merging into the existing document
    async fn set_field(&self, profile_id: &str, field: ProfileField) -> Result<()>;

    /// Append an item to a collection. Returns `false` if an item with the
    /// same external identifier is already present.
    async fn add_to_set(&self, profile_id: &str, kind: MediaKind, item: &MediaItem)
        -> Result<bool>;

    /// Remove the item matching `external_id` in the `kind` collection.
    /// Returns the removed item, or `None` when it was already absent.
    async fn remove_from_set(
        &self,
        profile_id: &str,
        kind: MediaKind,
        external_id: &str,
    ) -> Result<Option<MediaItem>>;

    /// Replace the description of one item. Returns `false` if absent.
    async fn update_description(
        &self,
        profile_id: &str,
        kind: MediaKind,
        external_id: &str,
        description: Option<&str>,
    ) -> Result<bool>;

    /// Atomically add `delta` to the usage field, clamping at zero
    async fn atomic_increment(&self, profile_id: &str, delta: i64) -> Result<IncrementOutcome>;

    /// Overwrite the usage field with the sum of both collections, in the
    /// same atomic step that reads them
    async fn recompute_usage(&self, profile_id: &str) -> Result<UsageRecompute>;

    /// Verify the backend is reachable
    async fn health_check(&self) -> Result<()>;
}
