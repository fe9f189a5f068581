//! Live usage view for presentation layers
//!
//! Every committed ledger change is pushed to subscribers through a
//! `tokio::sync::watch` channel per profile. Each value carries the usage
//! version of the write that produced it; a value older than the one held
//! by the channel is dropped, so publishes that race each other still leave
//! the channel on the latest committed value. Snapshots are advisory: the
//! authoritative gate is the quota policy evaluated at upload time.

use futures::stream::{self, Stream, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::debug;

use crate::quota::UsageSnapshot;

#[derive(Debug, Clone, Copy)]
struct Published {
    version: u64,
    snapshot: UsageSnapshot,
}

impl Published {
    /// Replace `current` if `self` is newer
    fn apply_to(self, current: &mut Published) -> bool {
        if self.version > current.version {
            *current = self;
            true
        } else {
            false
        }
    }
}

/// Fan-out of usage snapshots per profile
#[derive(Clone)]
pub struct UsageObserver {
    limit_bytes: u64,
    channels: Arc<RwLock<HashMap<String, watch::Sender<Published>>>>,
}

impl UsageObserver {
    pub fn new(limit_bytes: u64) -> Self {
        Self {
            limit_bytes,
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn limit_bytes(&self) -> u64 {
        self.limit_bytes
    }

    /// Publish the ledger value written at `version` to all subscribers of
    /// `profile_id`. Returns `false` when a newer value was already published.
    pub async fn publish(&self, profile_id: &str, used_bytes: u64, version: u64) -> bool {
        let update = Published {
            version,
            snapshot: UsageSnapshot::new(used_bytes, self.limit_bytes),
        };

        let channels = self.channels.read().await;
        if let Some(sender) = channels.get(profile_id) {
            let applied = sender.send_if_modified(|current| update.apply_to(current));
            if applied {
                debug!(
                    "Published usage {} bytes ({}%) to {} subscriber(s) of {}",
                    used_bytes,
                    update.snapshot.percentage,
                    sender.receiver_count(),
                    profile_id
                );
            } else {
                debug!("Dropped stale usage {} (version {}) for {}", used_bytes, version, profile_id);
            }
            return applied;
        }
        drop(channels);

        // Keep the value so that later subscribers start from it
        let mut channels = self.channels.write().await;
        match channels.get(profile_id) {
            Some(sender) => sender.send_if_modified(|current| update.apply_to(current)),
            None => {
                channels.insert(profile_id.to_string(), watch::channel(update).0);
                true
            }
        }
    }

    /// Subscribe to a profile, seeded with the persisted value read at
    /// `version` unless something newer was published already
    pub async fn subscribe(&self, profile_id: &str, initial_used: u64, version: u64) -> UsageSubscription {
        let seed = Published {
            version,
            snapshot: UsageSnapshot::new(initial_used, self.limit_bytes),
        };

        let mut channels = self.channels.write().await;
        let sender = channels
            .entry(profile_id.to_string())
            .or_insert_with(|| watch::channel(seed).0);
        sender.send_if_modified(|current| seed.apply_to(current));

        UsageSubscription {
            rx: sender.subscribe(),
        }
    }

    /// Most recently published snapshot, if any
    pub async fn latest(&self, profile_id: &str) -> Option<UsageSnapshot> {
        let channels = self.channels.read().await;
        channels.get(profile_id).map(|sender| sender.borrow().snapshot)
    }

    pub async fn subscriber_count(&self, profile_id: &str) -> usize {
        let channels = self.channels.read().await;
        channels
            .get(profile_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

/// A live handle on one profile's usage
pub struct UsageSubscription {
    rx: watch::Receiver<Published>,
}

impl UsageSubscription {
    /// Current value without waiting
    pub fn current(&self) -> UsageSnapshot {
        self.rx.borrow().snapshot
    }

    /// Wait for the next published value. `None` once the observer is gone.
    pub async fn changed(&mut self) -> Option<UsageSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().snapshot)
    }

    /// Current value followed by every subsequent change
    pub fn into_stream(mut self) -> impl Stream<Item = UsageSnapshot> + Send + 'static {
        let first = self.rx.borrow_and_update().snapshot;
        stream::once(async move { first }).chain(stream::unfold(self, |mut sub| async move {
            let next = sub.changed().await?;
            Some((next, sub))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_subscriber_receives_push() {
        let observer = UsageObserver::new(1000);
        let mut sub = observer.subscribe("public", 100, 1).await;
        assert_eq!(sub.current().used_bytes, 100);
        assert_eq!(sub.current().percentage, 10);

        observer.publish("public", 500, 2).await;
        let next = tokio::time::timeout(Duration::from_secs(1), sub.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.used_bytes, 500);
        assert_eq!(next.percentage, 50);
    }

    #[tokio::test]
    async fn test_publish_before_subscribe_is_kept() {
        let observer = UsageObserver::new(1000);
        observer.publish("public", 990, 5).await;

        // seed value is ignored once something was published
        let sub = observer.subscribe("public", 0, 3).await;
        assert_eq!(sub.current().used_bytes, 990);
        assert_eq!(observer.latest("public").await.unwrap().percentage, 99);
    }

    #[tokio::test]
    async fn test_percentage_clamped_on_overrun() {
        let observer = UsageObserver::new(1000);
        observer.publish("public", 2500, 1).await;
        let snapshot = observer.latest("public").await.unwrap();
        assert_eq!(snapshot.percentage, 100);
        assert!(snapshot.is_full());
    }

    #[tokio::test]
    async fn test_profiles_are_isolated() {
        let observer = UsageObserver::new(100);
        let sub_a = observer.subscribe("a", 0, 0).await;
        observer.publish("b", 50, 1).await;
        assert_eq!(sub_a.current().used_bytes, 0);
        assert_eq!(observer.subscriber_count("a").await, 1);
        assert_eq!(observer.subscriber_count("b").await, 0);
    }

    #[tokio::test]
    async fn test_stream_yields_current_then_changes() {
        let observer = UsageObserver::new(100);
        let stream = observer.subscribe("public", 10, 1).await.into_stream();
        tokio::pin!(stream);

        assert_eq!(stream.next().await.unwrap().used_bytes, 10);
        observer.publish("public", 40, 2).await;
        let next = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.used_bytes, 40);
    }

    #[tokio::test]
    async fn test_out_of_order_publish_keeps_newest() {
        let observer = UsageObserver::new(1000);
        let sub = observer.subscribe("public", 0, 0).await;

        assert!(observer.publish("public", 900, 2).await);
        assert!(!observer.publish("public", 400, 1).await);

        assert_eq!(sub.current().used_bytes, 900);
        assert_eq!(observer.latest("public").await.unwrap().used_bytes, 900);
    }

    #[tokio::test]
    async fn test_stale_seed_does_not_overwrite() {
        let observer = UsageObserver::new(1000);
        observer.publish("public", 700, 4).await;

        let sub = observer.subscribe("public", 300, 2).await;
        assert_eq!(sub.current().used_bytes, 700);

        let sub = observer.subscribe("public", 750, 6).await;
        assert_eq!(sub.current().used_bytes, 750);
    }
}
