use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{MemorialError, Result};
use crate::ledger::UsageLedger;
use crate::quota::{QuotaPolicy, UsageSnapshot};
use crate::registry::{MediaItem, MediaKind, MediaRegistry};
use crate::security::Identity;
use crate::transport::{DeleteStatus, MediaTransport};

/// Result of a delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub status: DeleteStatus,
    /// Bytes released from the ledger by this call
    pub released_bytes: u64,
}

/// Result of a purge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeSummary {
    pub removed: usize,
    pub released_bytes: u64,
    /// Host objects with no registry entry that were deleted
    pub orphans_removed: usize,
    pub failed: usize,
    /// Ledger value after the closing reconciliation
    pub used_bytes: u64,
}

/// Upload and delete workflow for one profile
#[derive(Clone)]
pub struct MediaService {
    profile_id: String,
    policy: QuotaPolicy,
    registry: MediaRegistry,
    ledger: UsageLedger,
    transport: Arc<dyn MediaTransport>,
}

impl MediaService {
    pub fn new(
        profile_id: impl Into<String>,
        policy: QuotaPolicy,
        registry: MediaRegistry,
        ledger: UsageLedger,
        transport: Arc<dyn MediaTransport>,
    ) -> Self {
        Self {
            profile_id: profile_id.into(),
            policy,
            registry,
            ledger,
            transport,
        }
    }

    pub fn profile_id(&self) -> &str {
        &self.profile_id
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Store a new photo or video.
    ///
    /// Nothing is mutated unless the media host accepted the file. The
    /// ledger grows by the size the host reported.
    pub async fn upload(
        &self,
        identity: &Identity,
        kind: MediaKind,
        data: Bytes,
        description: Option<&str>,
    ) -> Result<MediaItem> {
        identity.require_admin()?;
        if let Some(description) = description {
            self.policy.validate_description(description)?;
        }

        let size = data.len() as u64;
        let used = self.ledger.used_bytes(&self.profile_id).await?;
        self.policy.admit_upload(used, kind, size)?;

        debug!(
            "Admitted {} of {} bytes for {} ({} bytes used)",
            kind, size, self.profile_id, used
        );

        let uploaded = self.transport.upload(data, kind).await?;

        let mut item = MediaItem::new(uploaded.locator, uploaded.external_id, uploaded.size_bytes);
        if let Some(description) = description {
            item = item.with_description(description.trim());
        }

        let item = match self.registry.add(&self.profile_id, kind, item.clone()).await {
            Ok(item) => item,
            Err(e) => {
                error!("Registering {} {} failed: {}", kind, item.external_id, e);
                self.discard_remote(kind, &item.external_id).await;
                return Err(e);
            }
        };

        self.ledger.increment(&self.profile_id, item.size_bytes).await?;
        info!(
            "{} uploaded by {}: {} ({} bytes)",
            kind.label(),
            identity.subject,
            item.external_id,
            item.size_bytes
        );
        Ok(item)
    }

    /// Delete a stored item.
    ///
    /// The ledger is decremented by the size recorded at upload, and only by
    /// the call that actually removed the registry entry.
    pub async fn delete(
        &self,
        identity: &Identity,
        kind: MediaKind,
        external_id: &str,
    ) -> Result<DeleteOutcome> {
        identity.require_admin()?;

        let Some(recorded) = self.registry.find(&self.profile_id, kind, external_id).await? else {
            debug!("{} {} is not registered, nothing to delete", kind, external_id);
            return Ok(DeleteOutcome {
                status: DeleteStatus::NotFound,
                released_bytes: 0,
            });
        };

        let status = self.transport.delete(&recorded.external_id, kind).await?;
        if status == DeleteStatus::NotFound {
            warn!("{} {} was already gone from the media host", kind, external_id);
        }

        let released_bytes = match self.registry.remove(&self.profile_id, kind, external_id).await? {
            Some(removed) => {
                self.ledger.decrement(&self.profile_id, removed.size_bytes).await?;
                removed.size_bytes
            }
            // A concurrent delete got there first and already decremented
            None => {
                return Ok(DeleteOutcome {
                    status: DeleteStatus::NotFound,
                    released_bytes: 0,
                })
            }
        };

        info!(
            "{} deleted by {}: {} ({} bytes released)",
            kind.label(),
            identity.subject,
            external_id,
            released_bytes
        );
        Ok(DeleteOutcome {
            status: DeleteStatus::Ok,
            released_bytes,
        })
    }

    pub async fn update_description(
        &self,
        identity: &Identity,
        kind: MediaKind,
        external_id: &str,
        description: &str,
    ) -> Result<MediaItem> {
        identity.require_admin()?;
        self.registry
            .update_description(&self.profile_id, kind, external_id, description)
            .await
    }

    /// Delete every photo and video, then rebuild the ledger from the registry.
    ///
    /// After the registered items, whatever the host still stores under the
    /// media folders is deleted too. An upload in flight during a purge can
    /// lose its remote object this way.
    pub async fn purge(&self, identity: &Identity) -> Result<PurgeSummary> {
        identity.require_admin()?;
        let mut summary = PurgeSummary::default();

        for kind in MediaKind::ALL {
            for item in self.registry.list(&self.profile_id, kind).await? {
                match self.delete(identity, kind, &item.external_id).await {
                    Ok(outcome) if outcome.status == DeleteStatus::Ok => {
                        summary.removed += 1;
                        summary.released_bytes += outcome.released_bytes;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Purge could not delete {} {}: {}", kind, item.external_id, e);
                        summary.failed += 1;
                    }
                }
            }
            self.sweep_orphans(kind, &mut summary).await;
        }

        summary.used_bytes = self.ledger.reconcile(&self.profile_id).await?.recomputed;
        info!(
            "Purge by {}: {} item(s) and {} orphan(s) removed, {} failed, {} bytes left",
            identity.subject, summary.removed, summary.orphans_removed, summary.failed, summary.used_bytes
        );
        Ok(summary)
    }

    /// Items of one kind for display, newest first
    pub async fn timeline(&self, kind: MediaKind) -> Result<Vec<MediaItem>> {
        self.registry.timeline(&self.profile_id, kind).await
    }

    pub async fn usage(&self) -> Result<UsageSnapshot> {
        self.ledger.snapshot(&self.profile_id).await
    }

    /// Delete host objects of `kind` that the registry does not know about
    async fn sweep_orphans(&self, kind: MediaKind, summary: &mut PurgeSummary) {
        let remote = match self.transport.list_objects(kind).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Purge could not list {} objects on media host: {}", kind, e);
                summary.failed += 1;
                return;
            }
        };

        for external_id in remote {
            match self.registry.find(&self.profile_id, kind, &external_id).await {
                Ok(None) => {}
                Ok(Some(_)) => continue,
                Err(e) => {
                    warn!("Purge skipped {} {}: {}", kind, external_id, e);
                    summary.failed += 1;
                    continue;
                }
            }

            match self.transport.delete(&external_id, kind).await {
                Ok(DeleteStatus::Ok) => {
                    debug!("Purged orphaned {} {}", kind, external_id);
                    summary.orphans_removed += 1;
                }
                Ok(DeleteStatus::NotFound) => {}
                Err(e) => {
                    warn!("Purge could not delete orphaned {} {}: {}", kind, external_id, e);
                    summary.failed += 1;
                }
            }
        }
    }

    /// Best effort: an orphaned remote object only costs storage on the host
    async fn discard_remote(&self, kind: MediaKind, external_id: &str) {
        match self.transport.delete(external_id, kind).await {
            Ok(_) => debug!("Discarded orphaned {} {}", kind, external_id),
            Err(e) => warn!("Orphaned {} {} left on media host: {}", kind, external_id, e),
        }
    }
}

/// Decode a `data:<mime>;base64,<payload>` URI or a bare base64 payload
pub fn decode_data_uri(input: &str) -> Result<Bytes> {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    let payload = match input.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest.split_once(',').ok_or_else(|| {
                MemorialError::Validation("malformed data URI: missing ','".to_string())
            })?;
            if !header.ends_with(";base64") {
                return Err(MemorialError::Validation(
                    "data URI must be base64 encoded".to_string(),
                ));
            }
            payload
        }
        None => input,
    };

    Ok(Bytes::from(BASE64.decode(payload.trim())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::UsageObserver;
    use crate::store::{DocumentStore, MemoryDocumentStore};
    use crate::transport::{MemoryTransport, MockMediaTransport, UploadedMedia};

    const MIB: u64 = 1024 * 1024;
    const PROFILE: &str = "public";

    struct Fixture {
        service: MediaService,
        registry: MediaRegistry,
        ledger: UsageLedger,
    }

    fn fixture_with(transport: Arc<dyn MediaTransport>) -> Fixture {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let policy = QuotaPolicy::default();
        let registry = MediaRegistry::new(store.clone(), policy.clone());
        let ledger = UsageLedger::new(
            store,
            registry.clone(),
            UsageObserver::new(policy.limits().storage_limit),
        );
        let service = MediaService::new(PROFILE, policy, registry.clone(), ledger.clone(), transport);
        Fixture {
            service,
            registry,
            ledger,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(MemoryTransport::default()))
    }

    fn admin() -> Identity {
        Identity::admin("kora")
    }

    fn payload(size: u64) -> Bytes {
        Bytes::from(vec![7u8; size as usize])
    }

    /// Seed an item that is recorded but was never uploaded through the host
    async fn seed(f: &Fixture, kind: MediaKind, id: &str, size: u64) {
        f.registry
            .add(PROFILE, kind, MediaItem::new(format!("memory://{}", id), id.to_string(), size))
            .await
            .unwrap();
        f.ledger.increment(PROFILE, size).await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_records_item_and_usage() {
        let f = fixture();
        let item = f
            .service
            .upload(&admin(), MediaKind::Photo, payload(1234), Some("  Summer 1998 "))
            .await
            .unwrap();

        assert_eq!(item.size_bytes, 1234);
        assert_eq!(item.description.as_deref(), Some("Summer 1998"));
        assert!(item.created_at.is_some());
        assert_eq!(f.ledger.used_bytes(PROFILE).await.unwrap(), 1234);
        assert_eq!(f.service.timeline(MediaKind::Photo).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_visitor_cannot_mutate() {
        let f = fixture();
        let visitor = Identity::visitor("guest");

        let err = f
            .service
            .upload(&visitor, MediaKind::Photo, payload(10), None)
            .await
            .unwrap_err();
        assert!(matches!(err, MemorialError::Forbidden(_)));
        assert!(matches!(
            f.service.delete(&visitor, MediaKind::Photo, "x").await,
            Err(MemorialError::Forbidden(_))
        ));
        assert!(matches!(f.service.purge(&visitor).await, Err(MemorialError::Forbidden(_))));
        assert_eq!(f.ledger.used_bytes(PROFILE).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fill_to_limit_then_deny() {
        let f = fixture();
        seed(&f, MediaKind::Video, "kora/videos/big", 390 * MIB).await;

        f.service
            .upload(&admin(), MediaKind::Photo, payload(10 * MIB), None)
            .await
            .unwrap();

        let usage = f.service.usage().await.unwrap();
        assert_eq!(usage.used_bytes, 400 * MIB);
        assert_eq!(usage.percentage, 100);

        let err = f
            .service
            .upload(&admin(), MediaKind::Photo, payload(1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, MemorialError::QuotaExceeded { .. }));
        assert_eq!(f.ledger.used_bytes(PROFILE).await.unwrap(), 400 * MIB);
    }

    #[tokio::test]
    async fn test_delete_releases_recorded_size() {
        let f = fixture();
        seed(&f, MediaKind::Photo, "kora/photos/a", 30 * MIB).await;
        seed(&f, MediaKind::Video, "kora/videos/b", 20 * MIB).await;

        let outcome = f
            .service
            .delete(&admin(), MediaKind::Video, "kora/videos/b")
            .await
            .unwrap();

        // seeded items never reached the host, which reports not found; the
        // registry entry is still removed
        assert_eq!(outcome.status, DeleteStatus::Ok);
        assert_eq!(outcome.released_bytes, 20 * MIB);
        assert_eq!(f.ledger.used_bytes(PROFILE).await.unwrap(), 30 * MIB);
        assert!(f
            .registry
            .find(PROFILE, MediaKind::Video, "kora/videos/b")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_oversized_description_leaves_item_unchanged() {
        let f = fixture();
        let item = f
            .service
            .upload(&admin(), MediaKind::Photo, payload(10), Some("original"))
            .await
            .unwrap();

        let err = f
            .service
            .update_description(&admin(), MediaKind::Photo, &item.external_id, &"x".repeat(501))
            .await
            .unwrap_err();
        assert!(matches!(err, MemorialError::Validation(_)));

        let stored = f
            .registry
            .find(PROFILE, MediaKind::Photo, &item.external_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.description.as_deref(), Some("original"));
    }

    #[tokio::test]
    async fn test_repeated_delete_is_not_found() {
        let f = fixture();
        let item = f
            .service
            .upload(&admin(), MediaKind::Photo, payload(500), None)
            .await
            .unwrap();
        seed(&f, MediaKind::Photo, "kora/photos/keep", 100).await;

        let first = f
            .service
            .delete(&admin(), MediaKind::Photo, &item.external_id)
            .await
            .unwrap();
        assert_eq!(first.status, DeleteStatus::Ok);

        let second = f
            .service
            .delete(&admin(), MediaKind::Photo, &item.external_id)
            .await
            .unwrap();
        assert_eq!(second.status, DeleteStatus::NotFound);
        assert_eq!(second.released_bytes, 0);
        assert_eq!(f.ledger.used_bytes(PROFILE).await.unwrap(), 100);
        assert_eq!(f.registry.list(PROFILE, MediaKind::Photo).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_deletes_decrement_once() {
        let f = fixture();
        let item = f
            .service
            .upload(&admin(), MediaKind::Photo, payload(64), None)
            .await
            .unwrap();
        seed(&f, MediaKind::Photo, "kora/photos/keep", 36).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = f.service.clone();
            let id = item.external_id.clone();
            handles.push(tokio::spawn(async move {
                service.delete(&admin(), MediaKind::Photo, &id).await.unwrap()
            }));
        }

        let mut released = 0;
        for handle in handles {
            released += handle.await.unwrap().released_bytes;
        }
        assert_eq!(released, 64);
        assert_eq!(f.ledger.used_bytes(PROFILE).await.unwrap(), 36);
    }

    #[tokio::test]
    async fn test_validation_happens_before_transport() {
        let mut transport = MockMediaTransport::new();
        transport.expect_upload().never();
        let f = fixture_with(Arc::new(transport));

        let empty = f.service.upload(&admin(), MediaKind::Photo, Bytes::new(), None).await;
        assert!(matches!(empty, Err(MemorialError::Validation(_))));

        let too_big = f
            .service
            .upload(&admin(), MediaKind::Photo, payload(10 * MIB + 1), None)
            .await;
        assert!(matches!(too_big, Err(MemorialError::Validation(_))));

        let long_caption = "x".repeat(501);
        let captioned = f
            .service
            .upload(&admin(), MediaKind::Photo, payload(1), Some(&long_caption))
            .await;
        assert!(matches!(captioned, Err(MemorialError::Validation(_))));
    }

    #[tokio::test]
    async fn test_transport_failure_mutates_nothing() {
        let mut transport = MockMediaTransport::new();
        transport
            .expect_upload()
            .times(1)
            .returning(|_, _| Err(MemorialError::Transport("timed out".to_string())));
        let f = fixture_with(Arc::new(transport));

        let err = f
            .service
            .upload(&admin(), MediaKind::Video, payload(2048), None)
            .await
            .unwrap_err();
        assert!(matches!(err, MemorialError::Transport(_)));
        assert_eq!(f.ledger.used_bytes(PROFILE).await.unwrap(), 0);
        assert!(f.registry.list(PROFILE, MediaKind::Video).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_remote_delete_keeps_item() {
        let mut transport = MockMediaTransport::new();
        transport
            .expect_delete()
            .returning(|_, _| Err(MemorialError::Transport("503".to_string())));
        let f = fixture_with(Arc::new(transport));
        seed(&f, MediaKind::Photo, "kora/photos/a", 10).await;

        assert!(f
            .service
            .delete(&admin(), MediaKind::Photo, "kora/photos/a")
            .await
            .is_err());
        assert_eq!(f.ledger.used_bytes(PROFILE).await.unwrap(), 10);
        assert_eq!(f.registry.list(PROFILE, MediaKind::Photo).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_registry_failure_discards_remote_object() {
        let mut transport = MockMediaTransport::new();
        transport.expect_upload().returning(|data, _| {
            Ok(UploadedMedia {
                locator: "https://cdn.test/dup".to_string(),
                external_id: "kora/photos/dup".to_string(),
                size_bytes: data.len() as u64,
            })
        });
        transport
            .expect_delete()
            .withf(|id, _| id.to_string() == "kora/photos/dup")
            .times(1)
            .returning(|_, _| Ok(DeleteStatus::Ok));
        let f = fixture_with(Arc::new(transport));
        seed(&f, MediaKind::Photo, "kora/photos/dup", 5).await;

        // the host handed back an id that is already registered
        let err = f
            .service
            .upload(&admin(), MediaKind::Photo, payload(7), None)
            .await
            .unwrap_err();
        assert!(matches!(err, MemorialError::Validation(_)));
        assert_eq!(f.ledger.used_bytes(PROFILE).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_purge_removes_everything() {
        let f = fixture();
        for i in 0..3 {
            f.service
                .upload(&admin(), MediaKind::Photo, payload(100 + i), None)
                .await
                .unwrap();
        }
        f.service
            .upload(&admin(), MediaKind::Video, payload(1000), None)
            .await
            .unwrap();

        let summary = f.service.purge(&admin()).await.unwrap();
        assert_eq!(summary.removed, 4);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.released_bytes, 1303);
        assert_eq!(summary.used_bytes, 0);
        assert!(f.service.timeline(MediaKind::Photo).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_purge_sweeps_host_orphans() {
        let transport = MemoryTransport::new("kora");
        let f = fixture_with(Arc::new(transport.clone()));

        f.service
            .upload(&admin(), MediaKind::Video, payload(300), None)
            .await
            .unwrap();
        // stored on the host but never registered
        transport.upload(payload(40), MediaKind::Photo).await.unwrap();
        transport.upload(payload(50), MediaKind::Video).await.unwrap();
        assert_eq!(transport.object_count().await, 3);

        let summary = f.service.purge(&admin()).await.unwrap();
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.orphans_removed, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.used_bytes, 0);
        assert_eq!(transport.object_count().await, 0);
    }

    #[test]
    fn test_decode_data_uri() {
        assert_eq!(
            decode_data_uri("data:image/png;base64,aGVsbG8=").unwrap(),
            Bytes::from_static(b"hello")
        );
        assert_eq!(decode_data_uri("aGVsbG8=").unwrap(), Bytes::from_static(b"hello"));
        assert!(decode_data_uri("data:text/plain,hello").is_err());
        assert!(matches!(
            decode_data_uri("data:image/png;base64,@@@"),
            Err(MemorialError::Base64(_))
        ));
    }
}
