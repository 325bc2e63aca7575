//! Region-location resolution.
//!
//! `LocationResolver` orchestrates a lookup: consult the location table,
//! fall through to the metadata source via the single-flight coordinator on
//! a miss or a forced reload, upsert the result, and hand the record back.
//! Every outcome, success or failure, travels through the returned future;
//! nothing raises synchronously.
//!
//! `TableRegionLocator` is the table-bound handle callers hold on the data
//! path. Its convenience forms are pure call-site sugar over one canonical
//! operation; no behavior lives in them.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::error::{LocateError, LocateResult};
use crate::locator::invalidation::InvalidationManager;
use crate::locator::region::{display_key, LocationRecord};
use crate::locator::single_flight::{FlightKey, FlightPurpose, SingleFlightCoordinator};
use crate::locator::table::LocationTable;
use crate::locator::traits::MetadataSource;
use crate::types::{ReplicaId, TableId};

/// How many times a full-table resolution re-fetches when the source keeps
/// returning a cover broken by concurrent splits.
pub const MAX_COVERAGE_ATTEMPTS: u32 = 3;

/// Session-scoped resolver: shared cache + coalescing over one metadata
/// source. Clones share all state; scope the lifetime to the client session
/// that owns it; there is deliberately no process-wide instance.
#[derive(Clone)]
pub struct LocationResolver {
    cache: Arc<LocationTable>,
    coordinator: SingleFlightCoordinator,
    invalidation: Arc<InvalidationManager>,
    source: Arc<dyn MetadataSource>,
}

impl LocationResolver {
    /// Create a resolver over `source` with an empty cache.
    pub fn new(source: Arc<dyn MetadataSource>) -> Self {
        let cache = Arc::new(LocationTable::new());
        LocationResolver {
            invalidation: Arc::new(InvalidationManager::new(Arc::clone(&cache))),
            coordinator: SingleFlightCoordinator::new(),
            cache,
            source,
        }
    }

    /// Table-bound locator handle for callers on the data path.
    pub fn table(&self, name: impl Into<TableId>) -> TableRegionLocator {
        TableRegionLocator {
            name: name.into(),
            resolver: self.clone(),
        }
    }

    /// The shared location cache.
    pub fn cache(&self) -> &LocationTable {
        &self.cache
    }

    /// The staleness-signal entry point for the data-path collaborator.
    pub fn invalidation_manager(&self) -> Arc<InvalidationManager> {
        Arc::clone(&self.invalidation)
    }

    /// Resolve the location of the region covering `row`.
    ///
    /// With `reload == false` a cache hit completes immediately; otherwise
    /// the fetch is coalesced with identical in-flight requests, keyed by
    /// the resolved region's start key when one is cached and by the raw row
    /// key before first resolution.
    pub async fn get_region_location(
        &self,
        table: &TableId,
        row: &[u8],
        replica_id: ReplicaId,
        reload: bool,
    ) -> LocateResult<LocationRecord> {
        let cached = self.cache.lookup(table, row, replica_id).await;
        if !reload {
            if let Some(record) = cached {
                trace!(table = %table, replica = %replica_id, "location cache hit");
                return Ok(record);
            }
        }

        let (bucket, purpose) = match &cached {
            Some(record) => (
                record.region().start_key().clone(),
                FlightPurpose::Reload,
            ),
            None => (Bytes::copy_from_slice(row), FlightPurpose::Locate),
        };
        let key = FlightKey::new(table.clone(), bucket, replica_id, purpose);

        let source = Arc::clone(&self.source);
        let cache = Arc::clone(&self.cache);
        let table = table.clone();
        let row = Bytes::copy_from_slice(row);
        self.coordinator
            .run(key, move || async move {
                let fetched = source.fetch_location(&table, &row, replica_id).await?;
                if !fetched.region().contains(&row) {
                    return Err(LocateError::InternalConsistency(format!(
                        "metadata source returned region {} which does not contain row {}",
                        fetched.region(),
                        display_key(&row),
                    )));
                }
                let applied = cache.upsert(fetched.clone()).await;
                debug!(
                    table = %table,
                    replica = %replica_id,
                    version = fetched.version(),
                    applied,
                    "region location fetched"
                );
                // If a newer generation raced in, the cached record wins.
                Ok(cache
                    .lookup(&table, &row, replica_id)
                    .await
                    .unwrap_or(fetched))
            })
            .await
    }

    /// Resolve every region of `table` into a gapless, non-overlapping
    /// sequence ordered by (start key, replica id).
    ///
    /// A concurrent split can hand the source a torn snapshot; verification
    /// failures are retried up to [`MAX_COVERAGE_ATTEMPTS`] before
    /// surfacing [`LocateError::IncompleteCoverage`].
    pub async fn get_all_region_locations(
        &self,
        table: &TableId,
    ) -> LocateResult<Vec<LocationRecord>> {
        let mut last_detail = String::new();
        for attempt in 1..=MAX_COVERAGE_ATTEMPTS {
            let mut records = self.source.fetch_all_locations(table).await?;
            if records.is_empty() {
                return Err(LocateError::TableNotFound(table.clone()));
            }
            records.sort_by(|a, b| {
                a.region()
                    .start_key()
                    .cmp(b.region().start_key())
                    .then(a.region().replica_id().cmp(&b.region().replica_id()))
            });

            match verify_primary_cover(&records) {
                Ok(()) => {
                    for record in &records {
                        self.cache.upsert(record.clone()).await;
                    }
                    debug!(table = %table, regions = records.len(), attempt, "full-table resolution complete");
                    return Ok(records);
                }
                Err(detail) => {
                    warn!(table = %table, attempt, detail = %detail, "region cover verification failed");
                    last_detail = detail;
                }
            }
        }
        Err(LocateError::IncompleteCoverage {
            table: table.clone(),
            attempts: MAX_COVERAGE_ATTEMPTS,
            detail: last_detail,
        })
    }
}

/// Check that the primary entries of a (start key)-sorted record sequence
/// cover the whole keyspace with no gaps and no overlaps.
fn verify_primary_cover(records: &[LocationRecord]) -> Result<(), String> {
    let primaries: Vec<&LocationRecord> = records
        .iter()
        .filter(|r| r.region().replica_id().is_primary())
        .collect();

    let Some(first) = primaries.first() else {
        return Err("no primary regions in result".to_string());
    };
    if !first.region().start_key().is_empty() {
        return Err(format!(
            "cover starts at {} instead of the minimal key",
            display_key(first.region().start_key()),
        ));
    }
    for pair in primaries.windows(2) {
        let (a, b) = (pair[0].region(), pair[1].region());
        if a.is_unbounded() {
            return Err(format!("unbounded region {a} before end of cover"));
        }
        if a.end_key() != b.start_key() {
            return Err(format!(
                "cover breaks between {} and {}: end {} != start {}",
                a,
                b,
                display_key(a.end_key()),
                display_key(b.start_key()),
            ));
        }
    }
    // windows(2) checked every interior bound; only the tail remains.
    if let Some(last) = primaries.last() {
        if !last.region().is_unbounded() {
            return Err(format!(
                "cover ends at {} instead of the unbounded marker",
                display_key(last.region().end_key()),
            ));
        }
    }
    Ok(())
}

/// Table-bound view of a [`LocationResolver`].
///
/// This is the public surface callers hold: one canonical operation plus
/// call-site sugar supplying the primary replica and the no-reload default.
#[derive(Clone)]
pub struct TableRegionLocator {
    name: TableId,
    resolver: LocationResolver,
}

impl TableRegionLocator {
    /// The table this locator resolves against.
    pub fn name(&self) -> &TableId {
        &self.name
    }

    /// Locate the primary replica of the region serving `row`, from cache
    /// when possible.
    pub async fn get_region_location(&self, row: &[u8]) -> LocateResult<LocationRecord> {
        self.get_region_location_with(row, ReplicaId::PRIMARY, false)
            .await
    }

    /// Locate the given replica of the region serving `row`, from cache
    /// when possible.
    pub async fn get_region_location_replica(
        &self,
        row: &[u8],
        replica_id: ReplicaId,
    ) -> LocateResult<LocationRecord> {
        self.get_region_location_with(row, replica_id, false).await
    }

    /// Canonical lookup: locate `replica_id` of the region serving `row`,
    /// bypassing the cache when `reload` is set.
    pub async fn get_region_location_with(
        &self,
        row: &[u8],
        replica_id: ReplicaId,
        reload: bool,
    ) -> LocateResult<LocationRecord> {
        self.resolver
            .get_region_location(&self.name, row, replica_id, reload)
            .await
    }

    /// Retrieve all regions of the table as a verified, ordered cover.
    pub async fn get_all_region_locations(&self) -> LocateResult<Vec<LocationRecord>> {
        self.resolver.get_all_region_locations(&self.name).await
    }
}
