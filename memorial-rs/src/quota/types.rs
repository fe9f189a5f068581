use crate::registry::MediaKind;
use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

/// Business limits for a profile's storage and text fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaLimits {
    /// Aggregate storage limit for all media in bytes
    pub storage_limit: u64,
    /// Maximum size of a single photo in bytes
    pub max_photo_size: u64,
    /// Maximum size of a single video in bytes
    pub max_video_size: u64,
    /// Maximum biography length in characters
    pub max_biography_len: usize,
    /// Maximum photo/video description length in characters
    pub max_description_len: usize,
    /// Maximum comment author name length in characters
    pub max_comment_author_len: usize,
    /// Maximum comment message length in characters
    pub max_comment_message_len: usize,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        QuotaLimits {
            storage_limit: 400 * MIB, // 400MB per profile
            max_photo_size: 10 * MIB,
            max_video_size: 100 * MIB,
            max_biography_len: 10_000,
            max_description_len: 500,
            max_comment_author_len: 50,
            max_comment_message_len: 500,
        }
    }
}

impl QuotaLimits {
    /// Per-file cap for the given media kind
    pub fn max_file_size(&self, kind: MediaKind) -> u64 {
        match kind {
            MediaKind::Photo => self.max_photo_size,
            MediaKind::Video => self.max_video_size,
        }
    }
}

/// Upload admission outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaStatus {
    Ok,
    EmptyFile,
    FileTooLarge,
    StorageExceeded,
}

impl QuotaStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, QuotaStatus::Ok)
    }
}

/// Derived view of the ledger: never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub used_bytes: u64,
    pub limit_bytes: u64,
    /// `min(round(used / limit * 100), 100)`
    pub percentage: u8,
}

impl UsageSnapshot {
    pub fn new(used_bytes: u64, limit_bytes: u64) -> Self {
        UsageSnapshot {
            used_bytes,
            limit_bytes,
            percentage: usage_percentage(used_bytes, limit_bytes),
        }
    }

    /// Upload controls should be disabled; advisory only
    pub fn is_full(&self) -> bool {
        self.percentage >= 100
    }

    /// Dashboard warning threshold
    pub fn is_near_limit(&self) -> bool {
        self.percentage >= 90
    }

    /// Remaining capacity in bytes
    pub fn remaining_bytes(&self) -> u64 {
        self.limit_bytes.saturating_sub(self.used_bytes)
    }
}

/// Rounded (half up) and clamped usage percentage
fn usage_percentage(used_bytes: u64, limit_bytes: u64) -> u8 {
    if limit_bytes == 0 {
        return 100;
    }
    let used = u128::from(used_bytes);
    let limit = u128::from(limit_bytes);
    let rounded = (used * 100 + limit / 2) / limit;
    rounded.min(100) as u8
}
