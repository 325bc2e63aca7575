//! Staleness signals from the data path.
//!
//! When a data operation fails because the region it targeted has moved,
//! split, or gone offline, the caller reports the record it acted on here.
//! The report is advisory: the cache entry is dropped only if it is still
//! exactly the record the caller observed, so a concurrent refresh that
//! already installed a newer assignment is never clobbered. Reports are
//! idempotent and never fail.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::locator::region::RegionDescriptor;
use crate::locator::table::LocationTable;
use crate::types::{ReplicaId, TableId};

/// Accepts stale-location reports and evicts matching cache entries.
pub struct InvalidationManager {
    cache: Arc<LocationTable>,
}

impl InvalidationManager {
    /// Create a manager over the shared cache.
    pub fn new(cache: Arc<LocationTable>) -> Self {
        InvalidationManager { cache }
    }

    /// Report that the assignment for `region`/`replica_id` observed at
    /// `observed_version` failed a data operation.
    ///
    /// Evicts the entry only if the cache still holds that exact region
    /// generation at that version; the comparison and the eviction are one
    /// atomic step in the location table, so a refresh racing this report
    /// keeps its newer record. Returns whether an entry was removed.
    pub async fn report_stale(
        &self,
        table: &TableId,
        region: &RegionDescriptor,
        replica_id: ReplicaId,
        observed_version: u64,
    ) -> bool {
        let removed = self
            .cache
            .invalidate(table, region, Some(replica_id), Some(observed_version))
            .await;
        if removed {
            debug!(table = %table, region = %region, version = observed_version, "evicted stale region location");
        } else {
            trace!(
                table = %table,
                region = %region,
                observed_version,
                "stale report matched no cached entry"
            );
        }
        removed
    }

    /// Drop every cached entry for `region`, all replicas at once. Used when
    /// the caller knows the whole region is gone rather than one replica
    /// having moved.
    pub async fn report_region_gone(&self, table: &TableId, region: &RegionDescriptor) -> bool {
        let removed = self.cache.invalidate(table, region, None, None).await;
        if removed {
            debug!(table = %table, region = %region, "evicted all replicas of departed region");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::region::LocationRecord;
    use crate::types::{RegionId, ServerEndpoint};
    use bytes::Bytes;

    fn record(region_id: u64, replica: u32, version: u64) -> LocationRecord {
        LocationRecord::new(
            RegionDescriptor::new(
                TableId::new("t1"),
                RegionId::new(region_id),
                ReplicaId::new(replica),
                Bytes::from_static(b"a"),
                Bytes::from_static(b"m"),
            ),
            ServerEndpoint::new("s1", 16020),
            version,
        )
    }

    async fn manager_with(records: &[LocationRecord]) -> (InvalidationManager, Arc<LocationTable>) {
        let cache = Arc::new(LocationTable::new());
        for r in records {
            cache.upsert(r.clone()).await;
        }
        (InvalidationManager::new(Arc::clone(&cache)), cache)
    }

    #[tokio::test]
    async fn test_matching_report_evicts() {
        let rec = record(1, 0, 5);
        let (mgr, cache) = manager_with(std::slice::from_ref(&rec)).await;

        let table = TableId::new("t1");
        assert!(mgr.report_stale(&table, rec.region(), ReplicaId::PRIMARY, 5).await);
        assert!(cache.lookup(&table, b"apple", ReplicaId::PRIMARY).await.is_none());
    }

    #[tokio::test]
    async fn test_report_is_idempotent() {
        let rec = record(1, 0, 5);
        let (mgr, _cache) = manager_with(std::slice::from_ref(&rec)).await;

        let table = TableId::new("t1");
        assert!(mgr.report_stale(&table, rec.region(), ReplicaId::PRIMARY, 5).await);
        assert!(!mgr.report_stale(&table, rec.region(), ReplicaId::PRIMARY, 5).await);
    }

    #[tokio::test]
    async fn test_newer_version_survives_stale_report() {
        let rec = record(1, 0, 7);
        let (mgr, cache) = manager_with(std::slice::from_ref(&rec)).await;

        // The report describes version 5, but the cache already moved on.
        let table = TableId::new("t1");
        assert!(!mgr.report_stale(&table, rec.region(), ReplicaId::PRIMARY, 5).await);
        assert!(cache.lookup(&table, b"apple", ReplicaId::PRIMARY).await.is_some());
    }

    #[tokio::test]
    async fn test_region_generation_mismatch_is_noop() {
        let rec = record(2, 0, 5);
        let (mgr, cache) = manager_with(std::slice::from_ref(&rec)).await;

        // Same start key, older region generation: the split already replaced it.
        let stale = record(1, 0, 5);
        let table = TableId::new("t1");
        assert!(!mgr.report_stale(&table, stale.region(), ReplicaId::PRIMARY, 5).await);
        assert!(cache.lookup(&table, b"apple", ReplicaId::PRIMARY).await.is_some());
    }

    #[tokio::test]
    async fn test_replica_scoped_eviction() {
        let primary = record(1, 0, 5);
        let replica = record(1, 1, 5);
        let (mgr, cache) = manager_with(&[primary.clone(), replica]).await;

        let table = TableId::new("t1");
        assert!(mgr.report_stale(&table, primary.region(), ReplicaId::new(1), 5).await);
        assert!(cache.lookup(&table, b"apple", ReplicaId::new(1)).await.is_none());
        assert!(cache.lookup(&table, b"apple", ReplicaId::PRIMARY).await.is_some());
    }

    #[tokio::test]
    async fn test_report_region_gone_drops_all_replicas() {
        let primary = record(1, 0, 5);
        let replica = record(1, 1, 5);
        let (mgr, cache) = manager_with(&[primary.clone(), replica]).await;

        let table = TableId::new("t1");
        assert!(mgr.report_region_gone(&table, primary.region()).await);
        assert!(cache.lookup(&table, b"apple", ReplicaId::PRIMARY).await.is_none());
        assert!(cache.lookup(&table, b"apple", ReplicaId::new(1)).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_refresh_is_never_evicted() {
        // A stale report for version v races an upsert of v+1. Whichever
        // order the two land in, the v+1 record must survive: either the
        // report evicts v first and the upsert fills the empty slot, or the
        // upsert wins and the report finds a version it does not match.
        for i in 0..500u64 {
            let old = record(1, 0, i + 1);
            let new = record(1, 0, i + 2);
            let cache = Arc::new(LocationTable::new());
            cache.upsert(old.clone()).await;
            let mgr = Arc::new(InvalidationManager::new(Arc::clone(&cache)));

            let report = {
                let mgr = Arc::clone(&mgr);
                let region = old.region().clone();
                tokio::spawn(async move {
                    mgr.report_stale(&TableId::new("t1"), &region, ReplicaId::PRIMARY, i + 1)
                        .await
                })
            };
            let refresh = {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.upsert(new).await })
            };
            let (reported, _) = tokio::join!(report, refresh);
            reported.unwrap();

            let survivor = cache
                .record_at(
                    &TableId::new("t1"),
                    &Bytes::from_static(b"a"),
                    ReplicaId::PRIMARY,
                )
                .await;
            assert_eq!(
                survivor.map(|r| r.version()),
                Some(i + 2),
                "refreshed record lost at iteration {i}"
            );
        }
    }

    #[tokio::test]
    async fn test_report_for_unknown_table_is_noop() {
        let rec = record(1, 0, 5);
        let cache = Arc::new(LocationTable::new());
        let mgr = InvalidationManager::new(cache);

        assert!(!mgr.report_stale(&TableId::new("ghost"), rec.region(), ReplicaId::PRIMARY, 5).await);
    }
}
