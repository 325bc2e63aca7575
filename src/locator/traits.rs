//! Metadata source trait for authoritative region lookups.
//!
//! This trait abstracts the catalog service that tracks current
//! region-to-server assignments, allowing for:
//! - Different backend implementations (RPC-backed, in-memory for testing)
//! - Easier testing with mock sources
//! - Clear separation between cache machinery and transport
//!
//! The locator only consumes this interface; wire format, pagination,
//! connection pooling, and retry/backoff for individual calls are the
//! implementation's concern.

use async_trait::async_trait;

use crate::error::LocateResult;
use crate::locator::region::LocationRecord;
use crate::types::{ReplicaId, TableId};

/// Authoritative source of region-to-server assignments.
///
/// Implementations run fetches on their own execution context; the locator
/// core owns no thread pool.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Resolve the region covering `row` for `replica_id` in `table`.
    ///
    /// The returned record's region must contain `row`; the resolver treats
    /// a violation as an internal consistency error.
    async fn fetch_location(
        &self,
        table: &TableId,
        row: &[u8],
        replica_id: ReplicaId,
    ) -> LocateResult<LocationRecord>;

    /// Resolve every region of `table`, all replicas included.
    ///
    /// May be paginated or retried internally; the resolver verifies that
    /// the primary entries of the result form a gapless cover and re-fetches
    /// when a concurrent split broke the snapshot.
    async fn fetch_all_locations(&self, table: &TableId) -> LocateResult<Vec<LocationRecord>>;
}
