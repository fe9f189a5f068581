//! Admission rules evaluated before any call to the media host

use super::types::{QuotaLimits, QuotaStatus};
use crate::error::{MemorialError, Result};
use crate::registry::MediaKind;

/// Admit iff `used + candidate <= limit`. The boundary is inclusive.
pub fn can_admit(used_bytes: u64, candidate_bytes: u64, limit_bytes: u64) -> bool {
    match used_bytes.checked_add(candidate_bytes) {
        Some(total) => total <= limit_bytes,
        None => false,
    }
}

/// Quota policy bound to a set of limits
#[derive(Debug, Clone, Default)]
pub struct QuotaPolicy {
    limits: QuotaLimits,
}

impl QuotaPolicy {
    pub fn new(limits: QuotaLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &QuotaLimits {
        &self.limits
    }

    /// Check a candidate upload against the per-kind cap, then against remaining capacity
    pub fn check_upload(&self, used_bytes: u64, kind: MediaKind, size_bytes: u64) -> QuotaStatus {
        if size_bytes == 0 {
            return QuotaStatus::EmptyFile;
        }

        if size_bytes > self.limits.max_file_size(kind) {
            return QuotaStatus::FileTooLarge;
        }

        if !can_admit(used_bytes, size_bytes, self.limits.storage_limit) {
            return QuotaStatus::StorageExceeded;
        }

        QuotaStatus::Ok
    }

    /// Same as [`check_upload`](Self::check_upload), mapped onto the error taxonomy
    pub fn admit_upload(&self, used_bytes: u64, kind: MediaKind, size_bytes: u64) -> Result<()> {
        match self.check_upload(used_bytes, kind, size_bytes) {
            QuotaStatus::Ok => Ok(()),
            QuotaStatus::EmptyFile => Err(MemorialError::Validation(format!(
                "{} file is empty",
                kind.label()
            ))),
            QuotaStatus::FileTooLarge => Err(MemorialError::Validation(format!(
                "{} of {} bytes exceeds the {} byte limit",
                kind.label(),
                size_bytes,
                self.limits.max_file_size(kind)
            ))),
            QuotaStatus::StorageExceeded => Err(MemorialError::QuotaExceeded {
                used: used_bytes,
                requested: size_bytes,
                limit: self.limits.storage_limit,
            }),
        }
    }

    pub fn validate_biography(&self, biography: &str) -> Result<()> {
        check_length("biography", biography, self.limits.max_biography_len)
    }

    pub fn validate_description(&self, description: &str) -> Result<()> {
        check_length("description", description, self.limits.max_description_len)
    }

    /// Comment fields must be non-blank and within bounds
    pub fn validate_comment(&self, author: &str, message: &str) -> Result<()> {
        if author.trim().is_empty() || message.trim().is_empty() {
            return Err(MemorialError::Validation(
                "comment author and message are required".to_string(),
            ));
        }
        check_length("comment author", author, self.limits.max_comment_author_len)?;
        check_length("comment message", message, self.limits.max_comment_message_len)
    }

    pub fn validate_comment_message(&self, message: &str) -> Result<()> {
        if message.trim().is_empty() {
            return Err(MemorialError::Validation(
                "comment message is required".to_string(),
            ));
        }
        check_length("comment message", message, self.limits.max_comment_message_len)
    }
}

fn check_length(field: &str, value: &str, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len > max {
        return Err(MemorialError::Validation(format!(
            "{} is {} characters, maximum is {}",
            field, len, max
        )));
    }
    Ok(())
}
