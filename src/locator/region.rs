//! Immutable region and location value types.
//!
//! A region is a contiguous, exclusive-upper-bound slice of a table's
//! row-key space. Row keys and boundary keys are raw byte sequences ordered
//! lexicographically; the empty end key marks the unbounded upper end of the
//! keyspace. Primary and replica regions share one concrete shape and are
//! distinguished only by the replica id field.

use std::fmt;

use bytes::Bytes;

use crate::types::{RegionId, ReplicaId, ServerEndpoint, TableId};

/// A region's identity and key range: `[start_key, end_key)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionDescriptor {
    table: TableId,
    region_id: RegionId,
    replica_id: ReplicaId,
    start_key: Bytes,
    end_key: Bytes,
}

impl RegionDescriptor {
    /// Create a descriptor. `start_key` is inclusive, `end_key` exclusive;
    /// an empty `end_key` means the region extends to the end of the
    /// keyspace.
    pub fn new(
        table: TableId,
        region_id: RegionId,
        replica_id: ReplicaId,
        start_key: impl Into<Bytes>,
        end_key: impl Into<Bytes>,
    ) -> Self {
        RegionDescriptor {
            table,
            region_id,
            replica_id,
            start_key: start_key.into(),
            end_key: end_key.into(),
        }
    }

    /// The table this region belongs to.
    pub fn table(&self) -> &TableId {
        &self.table
    }

    /// The region id.
    pub fn region_id(&self) -> RegionId {
        self.region_id
    }

    /// The replica id (0 is the primary).
    pub fn replica_id(&self) -> ReplicaId {
        self.replica_id
    }

    /// Inclusive lower bound of the region's key range.
    pub fn start_key(&self) -> &Bytes {
        &self.start_key
    }

    /// Exclusive upper bound of the region's key range; empty means
    /// unbounded.
    pub fn end_key(&self) -> &Bytes {
        &self.end_key
    }

    /// Whether this region extends to the end of the keyspace.
    pub fn is_unbounded(&self) -> bool {
        self.end_key.is_empty()
    }

    /// Whether `row` falls inside this region's range.
    pub fn contains(&self, row: &[u8]) -> bool {
        self.start_key.as_ref() <= row && (self.is_unbounded() || row < self.end_key.as_ref())
    }
}

impl fmt::Display for RegionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}.{} [{}, {})",
            self.table,
            self.region_id,
            self.replica_id,
            display_key(&self.start_key),
            if self.is_unbounded() {
                "END".to_string()
            } else {
                display_key(&self.end_key)
            }
        )
    }
}

/// A cached assignment of a region replica to a serving endpoint.
///
/// `version` is the metadata source's monotonic generation counter for this
/// assignment; the cache only accepts strictly newer versions, so a stale
/// fetch racing a newer split notification can never regress the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationRecord {
    region: RegionDescriptor,
    server: ServerEndpoint,
    version: u64,
}

impl LocationRecord {
    /// Create a record binding `region` to `server` at `version`.
    pub fn new(region: RegionDescriptor, server: ServerEndpoint, version: u64) -> Self {
        LocationRecord {
            region,
            server,
            version,
        }
    }

    /// The region this record locates.
    pub fn region(&self) -> &RegionDescriptor {
        &self.region
    }

    /// The endpoint currently serving the region replica.
    pub fn server(&self) -> &ServerEndpoint {
        &self.server
    }

    /// The assignment generation.
    pub fn version(&self) -> u64 {
        self.version
    }
}

impl fmt::Display for LocationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} (v{})", self.region, self.server, self.version)
    }
}

/// Render a boundary key for log messages and errors.
pub(crate) fn display_key(key: &[u8]) -> String {
    if key.is_empty() {
        return "\"\"".to_string();
    }
    match std::str::from_utf8(key) {
        Ok(s) => format!("{s:?}"),
        Err(_) => format!("0x{}", hex(key)),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
