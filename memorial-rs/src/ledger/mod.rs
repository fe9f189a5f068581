/// Usage ledger: the authoritative running total of stored bytes
///
/// The persisted usage field is the source of truth for the quota bar and
/// for admission. It changes only through atomic additive updates paired
/// with media registry changes, or through an explicit reconciliation that
/// recomputes it from the registry.

pub mod manager;
pub mod types;

pub use manager::UsageLedger;
pub use types::{Reconciliation, ReconciliationWarning};
