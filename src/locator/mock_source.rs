//! In-memory metadata source for tests.
//!
//! Serves region assignments from a hash map and exposes knobs for the
//! failure modes the resolver has to handle: one-shot fetch errors, slow
//! fetches for coalescing tests, torn full-table snapshots, and a
//! containment filter that can be switched off to simulate a source
//! answering with the wrong region.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{LocateError, LocateResult};
use crate::locator::region::LocationRecord;
use crate::locator::traits::MetadataSource;
use crate::types::{ReplicaId, TableId};

/// Configurable in-memory [`MetadataSource`].
#[derive(Default)]
pub struct MockMetadataSource {
    regions: Mutex<HashMap<TableId, Vec<LocationRecord>>>,
    fail_queue: Mutex<VecDeque<LocateError>>,
    fetch_delay: Mutex<Option<Duration>>,
    gap_faults: AtomicUsize,
    containment_filter: AtomicBool,
    fetch_location_calls: AtomicUsize,
    fetch_all_calls: AtomicUsize,
}

impl MockMetadataSource {
    /// Create an empty source with containment filtering enabled.
    pub fn new() -> Self {
        MockMetadataSource {
            containment_filter: AtomicBool::new(true),
            ..Default::default()
        }
    }

    /// Replace the full assignment set for `table`.
    pub fn set_regions(&self, table: TableId, records: Vec<LocationRecord>) {
        self.regions.lock().unwrap().insert(table, records);
    }

    /// Queue an error returned by the next fetch (either kind) instead of a
    /// result. Queued errors are consumed in order, one per call.
    pub fn fail_next_fetch(&self, error: LocateError) {
        self.fail_queue.lock().unwrap().push_back(error);
    }

    /// Delay every fetch by `delay`, to hold fetches in flight.
    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = Some(delay);
    }

    /// Make the next `count` full-table fetches return a torn snapshot with
    /// one interior region missing.
    pub fn inject_gap_faults(&self, count: usize) {
        self.gap_faults.store(count, Ordering::SeqCst);
    }

    /// Stop filtering single-row answers by containment: `fetch_location`
    /// then returns the table's first record for the replica regardless of
    /// the row, like a source holding a stale index.
    pub fn disable_containment_filter(&self) {
        self.containment_filter.store(false, Ordering::SeqCst);
    }

    /// Number of `fetch_location` calls served so far.
    pub fn fetch_location_calls(&self) -> usize {
        self.fetch_location_calls.load(Ordering::SeqCst)
    }

    /// Number of `fetch_all_locations` calls served so far.
    pub fn fetch_all_calls(&self) -> usize {
        self.fetch_all_calls.load(Ordering::SeqCst)
    }

    async fn apply_delay(&self) {
        // Copy out first: holding the lock across the sleep would serialize
        // the concurrent callers the delay exists to pile up.
        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn take_injected_error(&self) -> Option<LocateError> {
        self.fail_queue.lock().unwrap().pop_front()
    }

    fn take_gap_fault(&self) -> bool {
        self.gap_faults
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl MetadataSource for MockMetadataSource {
    async fn fetch_location(
        &self,
        table: &TableId,
        row: &[u8],
        replica_id: ReplicaId,
    ) -> LocateResult<LocationRecord> {
        self.fetch_location_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;
        if let Some(error) = self.take_injected_error() {
            return Err(error);
        }

        let filter = self.containment_filter.load(Ordering::SeqCst);
        let regions = self.regions.lock().unwrap();
        let records = regions
            .get(table)
            .ok_or_else(|| LocateError::TableNotFound(table.clone()))?;
        records
            .iter()
            .find(|r| {
                r.region().replica_id() == replica_id && (!filter || r.region().contains(row))
            })
            .cloned()
            .ok_or_else(|| LocateError::TableNotFound(table.clone()))
    }

    async fn fetch_all_locations(&self, table: &TableId) -> LocateResult<Vec<LocationRecord>> {
        self.fetch_all_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;
        if let Some(error) = self.take_injected_error() {
            return Err(error);
        }

        let regions = self.regions.lock().unwrap();
        let mut records = regions.get(table).cloned().unwrap_or_default();
        if self.take_gap_fault() && records.len() > 1 {
            records.remove(1);
        }
        Ok(records)
    }
}
