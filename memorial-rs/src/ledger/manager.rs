use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::types::{Reconciliation, ReconciliationWarning};
use crate::error::{MemorialError, Result};
use crate::observer::{UsageObserver, UsageSubscription};
use crate::quota::UsageSnapshot;
use crate::registry::MediaRegistry;
use crate::store::DocumentStore;

/// Usage ledger for stored media bytes
#[derive(Clone)]
pub struct UsageLedger {
    store: Arc<dyn DocumentStore>,
    registry: MediaRegistry,
    observer: UsageObserver,
}

impl UsageLedger {
    pub fn new(store: Arc<dyn DocumentStore>, registry: MediaRegistry, observer: UsageObserver) -> Self {
        Self {
            store,
            registry,
            observer,
        }
    }

    pub fn observer(&self) -> &UsageObserver {
        &self.observer
    }

    /// Current total. An absent field is initialized to zero.
    pub async fn used_bytes(&self, profile_id: &str) -> Result<u64> {
        Ok(self.persisted(profile_id).await?.0)
    }

    /// Persisted total and the version it was written at
    async fn persisted(&self, profile_id: &str) -> Result<(u64, u64)> {
        if let Some(doc) = self.store.get(profile_id).await? {
            if let Some(used) = doc.storage_used {
                return Ok((used, doc.storage_version));
            }
        }

        // Zero-delta additive update: initializes the field without racing writers
        let outcome = self.store.atomic_increment(profile_id, 0).await?;
        debug!("Initialized usage field of {} to {}", profile_id, outcome.value);
        Ok((outcome.value, outcome.version))
    }

    pub async fn snapshot(&self, profile_id: &str) -> Result<UsageSnapshot> {
        let used = self.used_bytes(profile_id).await?;
        Ok(UsageSnapshot::new(used, self.observer.limit_bytes()))
    }

    /// Live view seeded with the persisted value
    pub async fn subscribe(&self, profile_id: &str) -> Result<UsageSubscription> {
        let (used, version) = self.persisted(profile_id).await?;
        Ok(self.observer.subscribe(profile_id, used, version).await)
    }

    /// Add `delta_bytes` after the matching registry append was acknowledged
    pub async fn increment(&self, profile_id: &str, delta_bytes: u64) -> Result<u64> {
        let delta = signed_delta(delta_bytes)?;
        let outcome = self.store.atomic_increment(profile_id, delta).await?;

        info!(
            "Ledger {} +{} bytes: {} -> {}",
            profile_id, delta_bytes, outcome.previous, outcome.value
        );
        self.observer
            .publish(profile_id, outcome.value, outcome.version)
            .await;
        Ok(outcome.value)
    }

    /// Subtract `delta_bytes`, clamping at zero.
    ///
    /// An underflow is not an error: it is logged and a repair from the
    /// registry is scheduled in the background.
    pub async fn decrement(&self, profile_id: &str, delta_bytes: u64) -> Result<u64> {
        let delta = signed_delta(delta_bytes)?;
        let outcome = self.store.atomic_increment(profile_id, -delta).await?;

        info!(
            "Ledger {} -{} bytes: {} -> {}",
            profile_id, delta_bytes, outcome.previous, outcome.value
        );
        self.observer
            .publish(profile_id, outcome.value, outcome.version)
            .await;

        if outcome.clamped {
            let warning = ReconciliationWarning::Underflow {
                profile_id: profile_id.to_string(),
                requested: delta_bytes,
                available: outcome.previous,
            };
            warn!("{}", warning);
            self.schedule_reconcile(profile_id);
        }

        Ok(outcome.value)
    }

    /// Recompute the total as the sum of registry item sizes.
    ///
    /// This is the only operation that writes the total directly. The sum and
    /// the write happen in one store transaction, so increments committed
    /// around it are never lost. An upload whose registry append landed but
    /// whose increment has not yet committed is counted twice once that
    /// increment arrives; the next reconciliation corrects it.
    pub async fn reconcile(&self, profile_id: &str) -> Result<Reconciliation> {
        let recompute = self.store.recompute_usage(profile_id).await?;
        let (previous, recomputed) = (recompute.previous, recompute.value);

        self.observer
            .publish(profile_id, recomputed, recompute.version)
            .await;

        let reconciliation = Reconciliation {
            previous,
            recomputed,
        };
        if let Some(ledger) = previous.filter(|&p| p != recomputed) {
            warn!(
                "{}; repaired",
                ReconciliationWarning::Drift {
                    profile_id: profile_id.to_string(),
                    ledger,
                    registry: recomputed,
                }
            );
        } else {
            info!("Ledger {} reconciled at {} bytes", profile_id, recomputed);
        }

        Ok(reconciliation)
    }

    /// Compare ledger and registry without repairing
    pub async fn check_drift(&self, profile_id: &str) -> Result<Option<ReconciliationWarning>> {
        let ledger = self.used_bytes(profile_id).await?;
        let registry = self.registry.total_bytes(profile_id).await?;

        Ok((ledger != registry).then(|| ReconciliationWarning::Drift {
            profile_id: profile_id.to_string(),
            ledger,
            registry,
        }))
    }

    fn schedule_reconcile(&self, profile_id: &str) {
        let ledger = self.clone();
        let profile_id = profile_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = ledger.reconcile(&profile_id).await {
                error!("Background reconciliation of {} failed: {}", profile_id, e);
            }
        });
    }
}

fn signed_delta(delta_bytes: u64) -> Result<i64> {
    if delta_bytes == 0 {
        return Err(MemorialError::Validation(
            "ledger delta must be positive".to_string(),
        ));
    }
    i64::try_from(delta_bytes)
        .map_err(|_| MemorialError::Validation(format!("ledger delta {} too large", delta_bytes)))
}
