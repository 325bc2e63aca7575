//! Deduplication of concurrent in-flight metadata fetches.
//!
//! Each dedup key moves through `Idle -> Fetching -> {Resolved | Failed} ->
//! Idle`. The first caller for an idle key becomes the owner and starts the
//! real fetch; callers arriving while the fetch is outstanding register as
//! waiters and perform no I/O. The single outcome is fanned out to the owner
//! and every waiter, then the key returns to idle: a caller arriving after
//! completion starts a fresh fetch. Result caching is the location table's
//! job, not this layer's.
//!
//! The fetch runs on a spawned task, so a caller cancelling its own future
//! only drops its waiter registration; the fetch keeps running for everyone
//! else.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::trace;

use crate::error::{LocateError, LocateResult};
use crate::locator::region::LocationRecord;
use crate::types::{ReplicaId, TableId};

/// Outcome delivered identically to the owner and every waiter.
pub type FlightOutcome = LocateResult<LocationRecord>;

/// Why a fetch is in flight. Keeps a forced refresh of a known region from
/// absorbing first-time lookups keyed by raw row, and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlightPurpose {
    /// First-time resolution of a row whose covering region is unknown.
    Locate,
    /// Forced refresh of a region already present in the cache.
    Reload,
}

/// Dedup key: one outstanding fetch per (table, bucket, replica, purpose).
///
/// The bucket is the resolved region's start key once known, or the raw row
/// key before resolution, so repeated reloads for rows in the same region
/// collapse into one fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlightKey {
    table: TableId,
    bucket: Bytes,
    replica_id: ReplicaId,
    purpose: FlightPurpose,
}

impl FlightKey {
    /// Create a dedup key.
    pub fn new(
        table: TableId,
        bucket: Bytes,
        replica_id: ReplicaId,
        purpose: FlightPurpose,
    ) -> Self {
        FlightKey {
            table,
            bucket,
            replica_id,
            purpose,
        }
    }
}

/// Coalesces concurrent identical fetches into one upstream call.
#[derive(Clone, Default)]
pub struct SingleFlightCoordinator {
    inflight: Arc<DashMap<FlightKey, broadcast::Sender<FlightOutcome>>>,
}

impl SingleFlightCoordinator {
    /// Create a coordinator with no outstanding fetches.
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the in-flight fetch for `key`, or become the owner and run
    /// `fetch`. Exactly one upstream call happens per key per flight; every
    /// caller receives the same outcome.
    pub async fn run<F, Fut>(&self, key: FlightKey, fetch: F) -> FlightOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FlightOutcome> + Send + 'static,
    {
        let mut rx = match self.inflight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                // Subscribing under the shard lock orders this registration
                // before the completion send, which must first win the same
                // lock to remove the entry.
                trace!(key = ?key, "joining in-flight fetch");
                entry.get().subscribe()
            }
            Entry::Vacant(slot) => {
                let (tx, rx) = broadcast::channel(1);
                slot.insert(tx.clone());
                trace!(key = ?key, "starting fetch as owner");
                let inflight = Arc::clone(&self.inflight);
                let owner_key = key.clone();
                let fut = fetch();
                tokio::spawn(async move {
                    let outcome = fut.await;
                    // Back to idle before fan-out: arrivals from here on
                    // start a fresh fetch instead of reading a stale one.
                    inflight.remove(&owner_key);
                    let _ = tx.send(outcome);
                });
                rx
            }
        };

        match rx.recv().await {
            Ok(outcome) => outcome,
            Err(_) => Err(LocateError::InternalConsistency(format!(
                "in-flight fetch for {key:?} dropped without an outcome"
            ))),
        }
    }

    /// Number of fetches currently outstanding.
    pub fn inflight_count(&self) -> usize {
        self.inflight.len()
    }
}
