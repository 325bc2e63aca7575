//! Ordered per-table cache of region locations.
//!
//! `LocationTable` maps each table to a sorted index of region start keys;
//! each start key holds one slot per replica id. Lookups floor-search the
//! start-key index and hit only if the candidate record's own range contains
//! the row. The cache is strictly a subset of the true assignment state:
//! absence means "unknown", never "does not exist".
//!
//! Concurrency: a `DashMap` shards the per-table entries so unrelated tables
//! never contend; within a table, a `tokio::sync::RwLock` around the
//! `BTreeMap` gives snapshot-consistent iteration for `all_entries` while
//! permitting concurrent readers.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::locator::region::{display_key, LocationRecord, RegionDescriptor};
use crate::types::{ReplicaId, TableId};

/// Replica slots for one region start key, indexed by replica id.
type RegionSlot = Vec<Option<LocationRecord>>;

#[derive(Default)]
struct TableRegions {
    regions: RwLock<BTreeMap<Bytes, RegionSlot>>,
}

/// Shared, session-scoped region-location cache.
///
/// Mutated only via [`upsert`](LocationTable::upsert) and
/// [`invalidate`](LocationTable::invalidate); read via
/// [`lookup`](LocationTable::lookup) and
/// [`all_entries`](LocationTable::all_entries).
#[derive(Default)]
pub struct LocationTable {
    tables: DashMap<TableId, Arc<TableRegions>>,
}

impl LocationTable {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the cached record whose region contains `row`, for `replica_id`.
    ///
    /// Floor-searches the start-key index for the greatest start key not
    /// greater than `row`; returns the record only if the row is below that
    /// region's end key and a record exists for the replica.
    pub async fn lookup(
        &self,
        table: &TableId,
        row: &[u8],
        replica_id: ReplicaId,
    ) -> Option<LocationRecord> {
        let entry = match self.tables.get(table) {
            Some(entry) => Arc::clone(entry.value()),
            None => return None,
        };
        let regions = entry.regions.read().await;
        let (_, slot) = regions
            .range::<[u8], _>((Bound::Unbounded, Bound::Included(row)))
            .next_back()?;
        let record = slot.get(replica_id.value() as usize)?.as_ref()?;
        if !record.region().contains(row) {
            return None;
        }
        Some(record.clone())
    }

    /// Read the record cached at an exact start key, without a containment
    /// check. Lets a caller re-check which assignment generation is
    /// currently cached for a region it acted on.
    pub async fn record_at(
        &self,
        table: &TableId,
        start_key: &Bytes,
        replica_id: ReplicaId,
    ) -> Option<LocationRecord> {
        let entry = match self.tables.get(table) {
            Some(entry) => Arc::clone(entry.value()),
            None => return None,
        };
        let regions = entry.regions.read().await;
        regions
            .get(start_key)?
            .get(replica_id.value() as usize)?
            .clone()
    }

    /// Insert or replace the record for its (start key, replica id) iff its
    /// version is strictly newer than the cached one. Returns whether the
    /// record was applied; losing the version race is a no-op, not an error.
    ///
    /// Accepting a primary record also drops older cached entries whose
    /// start key falls strictly inside the new record's range, so a merge
    /// cannot leave a shadowed stale child behind.
    pub async fn upsert(&self, record: LocationRecord) -> bool {
        let table = record.region().table().clone();
        let entry = {
            let entry = self.tables.entry(table).or_default();
            Arc::clone(entry.value())
        };
        let mut regions = entry.regions.write().await;

        let idx = record.region().replica_id().value() as usize;
        let slot = regions
            .entry(record.region().start_key().clone())
            .or_default();
        if slot.len() <= idx {
            slot.resize(idx + 1, None);
        }
        if let Some(existing) = &slot[idx] {
            if existing.version() >= record.version() {
                trace!(
                    table = %record.region().table(),
                    region = %record.region(),
                    cached_version = existing.version(),
                    offered_version = record.version(),
                    "upsert skipped, cached record is not older"
                );
                return false;
            }
        }
        debug!(record = %record, "caching region location");
        let is_primary = record.region().replica_id().is_primary();
        let version = record.version();
        let start = record.region().start_key().clone();
        let end = record.region().end_key().clone();
        slot[idx] = Some(record);

        if is_primary {
            Self::purge_shadowed(&mut regions, &start, &end, version);
        }
        true
    }

    /// Remove records for `region`; all replicas when `replica_id` is
    /// `None`. Records cached at the same start key but belonging to a
    /// different region id are left alone, as is any record whose version
    /// differs from `observed_version` when one is given. The comparison and
    /// the removal happen under one write lock, so a concurrent upsert of a
    /// newer version can never be evicted by a report describing an older
    /// one. Returns whether anything was removed.
    pub async fn invalidate(
        &self,
        table: &TableId,
        region: &RegionDescriptor,
        replica_id: Option<ReplicaId>,
        observed_version: Option<u64>,
    ) -> bool {
        let entry = match self.tables.get(table) {
            Some(entry) => Arc::clone(entry.value()),
            None => return false,
        };
        let mut regions = entry.regions.write().await;
        let Some(slot) = regions.get_mut(region.start_key()) else {
            return false;
        };

        let matches = |r: &LocationRecord| {
            r.region().region_id() == region.region_id()
                && observed_version.map_or(true, |v| r.version() == v)
        };
        let mut removed = false;
        match replica_id {
            Some(id) => {
                if let Some(existing) = slot.get_mut(id.value() as usize) {
                    if existing.as_ref().is_some_and(&matches) {
                        *existing = None;
                        removed = true;
                    }
                }
            }
            None => {
                for existing in slot.iter_mut() {
                    if existing.as_ref().is_some_and(&matches) {
                        *existing = None;
                        removed = true;
                    }
                }
            }
        }
        let now_empty = slot.iter().all(Option::is_none);
        if now_empty {
            regions.remove(region.start_key());
        }
        if removed {
            debug!(table = %table, region = %region, "invalidated cached location");
        }
        removed
    }

    /// Point-in-time-consistent snapshot of every cached record for `table`,
    /// ordered by (start key, replica id).
    pub async fn all_entries(&self, table: &TableId) -> Vec<LocationRecord> {
        let entry = match self.tables.get(table) {
            Some(entry) => Arc::clone(entry.value()),
            None => return Vec::new(),
        };
        let regions = entry.regions.read().await;
        let mut out = Vec::new();
        for slot in regions.values() {
            for record in slot.iter().flatten() {
                out.push(record.clone());
            }
        }
        out
    }

    /// Drop every cached record for `table`.
    pub fn clear(&self, table: &TableId) {
        self.tables.remove(table);
    }

    /// Number of tables with at least one cached record.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    fn purge_shadowed(
        regions: &mut BTreeMap<Bytes, RegionSlot>,
        start: &Bytes,
        end: &Bytes,
        version: u64,
    ) {
        let upper: Bound<&[u8]> = if end.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(end.as_ref())
        };
        let stale: Vec<Bytes> = regions
            .range::<[u8], _>((Bound::Excluded(start.as_ref()), upper))
            .filter(|(_, slot)| {
                let newest = slot.iter().flatten().map(|r| r.version()).max();
                newest.is_some_and(|v| v < version)
            })
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            trace!(
                start_key = %display_key(&key),
                superseding_version = version,
                "purging shadowed region entry"
            );
            regions.remove(&key);
        }
    }
}
