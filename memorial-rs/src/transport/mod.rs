//! Media host transport
//!
//! Binary storage is delegated to an external media host. The workflow needs
//! upload (returning a size-bearing result) and an idempotent delete; purge
//! also lists what the host holds so that orphaned objects are removed.
//!
//! - [`cloudinary`]: signed REST calls to Cloudinary
//! - [`memory`]: in-process host for development and tests

pub mod cloudinary;
pub mod memory;

pub use cloudinary::CloudinaryTransport;
pub use memory::MemoryTransport;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::registry::MediaKind;

/// What the media host reports for a stored object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedMedia {
    pub locator: String,
    pub external_id: String,
    pub size_bytes: u64,
}

/// Delete result. `NotFound` counts as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStatus {
    Ok,
    NotFound,
}

/// Media host transport trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Store `data` as `kind`. Fails with `MemorialError::Transport`.
    async fn upload(&self, data: Bytes, kind: MediaKind) -> Result<UploadedMedia>;

    /// Remove an object. Missing objects yield `DeleteStatus::NotFound`.
    async fn delete(&self, external_id: &str, kind: MediaKind) -> Result<DeleteStatus>;

    /// External identifiers of every object the host stores for `kind`
    async fn list_objects(&self, kind: MediaKind) -> Result<Vec<String>>;

    /// Transport name for logs and health output
    fn name(&self) -> &'static str;
}
