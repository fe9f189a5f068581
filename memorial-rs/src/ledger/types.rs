use serde::Serialize;
use std::fmt;

/// Non-fatal signal that the ledger disagrees with the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconciliationWarning {
    /// A decrement asked for more bytes than the ledger held
    Underflow {
        profile_id: String,
        requested: u64,
        available: u64,
    },
    /// The ledger total differs from the registry sum
    Drift {
        profile_id: String,
        ledger: u64,
        registry: u64,
    },
}

impl fmt::Display for ReconciliationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Underflow {
                profile_id,
                requested,
                available,
            } => write!(
                f,
                "ledger underflow on {}: decrement of {} bytes with {} bytes recorded",
                profile_id, requested, available
            ),
            Self::Drift {
                profile_id,
                ledger,
                registry,
            } => write!(
                f,
                "ledger drift on {}: ledger holds {} bytes, registry sums to {} bytes",
                profile_id, ledger, registry
            ),
        }
    }
}

/// Outcome of recomputing the ledger from the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Ledger value before the repair; `None` if the field was absent
    pub previous: Option<u64>,
    /// Registry sum now stored in the ledger
    pub recomputed: u64,
}

impl Reconciliation {
    pub fn changed(&self) -> bool {
        self.previous != Some(self.recomputed)
    }
}
