//! Shared fixtures for locator integration tests.

// Not every test binary uses every fixture.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use whereabouts::prelude::*;

/// Build a location record for table `table`.
pub fn record(
    table: &str,
    region_id: u64,
    replica: u32,
    start: &[u8],
    end: &[u8],
    server: &str,
    version: u64,
) -> LocationRecord {
    LocationRecord::new(
        RegionDescriptor::new(
            TableId::new(table),
            RegionId::new(region_id),
            ReplicaId::new(replica),
            Bytes::copy_from_slice(start),
            Bytes::copy_from_slice(end),
        ),
        ServerEndpoint::new(server, 16020),
        version,
    )
}

/// Metadata source backed by an in-memory assignment map.
///
/// Assignments can be swapped at runtime to simulate splits and moves; an
/// optional per-fetch delay holds fetches in flight for coalescing tests.
#[derive(Default)]
pub struct StaticRegionSource {
    regions: RwLock<HashMap<TableId, Vec<LocationRecord>>>,
    fetch_delay: RwLock<Option<Duration>>,
    location_calls: AtomicUsize,
    all_calls: AtomicUsize,
}

impl StaticRegionSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn set_regions(&self, table: &str, records: Vec<LocationRecord>) {
        self.regions
            .write()
            .await
            .insert(TableId::new(table), records);
    }

    pub async fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.write().await = Some(delay);
    }

    pub fn location_calls(&self) -> usize {
        self.location_calls.load(Ordering::SeqCst)
    }

    pub fn all_calls(&self) -> usize {
        self.all_calls.load(Ordering::SeqCst)
    }

    async fn apply_delay(&self) {
        let delay = *self.fetch_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl MetadataSource for StaticRegionSource {
    async fn fetch_location(
        &self,
        table: &TableId,
        row: &[u8],
        replica_id: ReplicaId,
    ) -> LocateResult<LocationRecord> {
        self.location_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;
        let regions = self.regions.read().await;
        let records = regions
            .get(table)
            .ok_or_else(|| LocateError::TableNotFound(table.clone()))?;
        records
            .iter()
            .find(|r| r.region().replica_id() == replica_id && r.region().contains(row))
            .cloned()
            .ok_or_else(|| LocateError::TableNotFound(table.clone()))
    }

    async fn fetch_all_locations(&self, table: &TableId) -> LocateResult<Vec<LocationRecord>> {
        self.all_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;
        let regions = self.regions.read().await;
        Ok(regions.get(table).cloned().unwrap_or_default())
    }
}

/// Metadata source whose first `faults` full-table snapshots are torn: an
/// interior region is missing, as when the catalog is read mid-split.
pub struct FlakyCoverSource {
    inner: Arc<StaticRegionSource>,
    faults: AtomicUsize,
}

impl FlakyCoverSource {
    pub fn new(inner: Arc<StaticRegionSource>, faults: usize) -> Arc<Self> {
        Arc::new(FlakyCoverSource {
            inner,
            faults: AtomicUsize::new(faults),
        })
    }

    pub fn all_calls(&self) -> usize {
        self.inner.all_calls()
    }
}

#[async_trait]
impl MetadataSource for FlakyCoverSource {
    async fn fetch_location(
        &self,
        table: &TableId,
        row: &[u8],
        replica_id: ReplicaId,
    ) -> LocateResult<LocationRecord> {
        self.inner.fetch_location(table, row, replica_id).await
    }

    async fn fetch_all_locations(&self, table: &TableId) -> LocateResult<Vec<LocationRecord>> {
        let mut records = self.inner.fetch_all_locations(table).await?;
        let torn = self
            .faults
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if torn && records.len() > 1 {
            records.remove(1);
        }
        Ok(records)
    }
}
