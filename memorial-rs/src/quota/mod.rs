/// Storage quota rules for a memorial profile
///
/// This module provides:
/// - The admission rule for prospective uploads
/// - Per-kind file size caps
/// - Bounded text lengths (biography, descriptions, comments)
/// - The derived usage snapshot shown by the quota bar

pub mod policy;
pub mod types;

pub use policy::{can_admit, QuotaPolicy};
pub use types::{QuotaLimits, QuotaStatus, UsageSnapshot};
