//! Type-safe wrappers for locator primitives.
//!
//! These newtypes prevent mixing up identifiers that share an underlying
//! representation but carry different semantic meanings (a replica id is not
//! a region id, even though both are small integers).

use std::fmt;
use std::sync::Arc;

/// An opaque, immutable table name.
///
/// Backed by `Arc<str>` so clones are O(1); table ids are cloned on every
/// lookup, every dedup key, and every cache entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableId(Arc<str>);

impl TableId {
    /// Create a table id from a name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        TableId(name.into())
    }

    /// The table name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TableId {
    fn from(name: &str) -> Self {
        TableId::new(name)
    }
}

impl From<String> for TableId {
    fn from(name: String) -> Self {
        TableId::new(name)
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a region, assigned by the metadata source.
///
/// A region id survives server moves but not splits or merges; a split
/// produces two regions with fresh ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RegionId(pub u64);

impl RegionId {
    /// Create a new region id from a raw value.
    #[inline]
    pub const fn new(value: u64) -> Self {
        RegionId(value)
    }

    /// Get the raw u64 value.
    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for RegionId {
    fn from(value: u64) -> Self {
        RegionId(value)
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a region replica.
///
/// Replica 0 is the primary; replicas 1..N host additional copies that are
/// addressable for replica-aware reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ReplicaId(pub u32);

impl ReplicaId {
    /// The primary replica.
    pub const PRIMARY: Self = ReplicaId(0);

    /// Create a new replica id from a raw value.
    #[inline]
    pub const fn new(value: u32) -> Self {
        ReplicaId(value)
    }

    /// Get the raw u32 value.
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Check whether this is the primary replica.
    #[inline]
    pub const fn is_primary(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for ReplicaId {
    fn from(value: u32) -> Self {
        ReplicaId(value)
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Network address of a server currently hosting a region replica.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerEndpoint {
    host: Arc<str>,
    port: u16,
}

impl ServerEndpoint {
    /// Create an endpoint from host and port.
    pub fn new(host: impl Into<Arc<str>>, port: u16) -> Self {
        ServerEndpoint {
            host: host.into(),
            port,
        }
    }

    /// The host name or address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_id_display_and_eq() {
        let a = TableId::new("orders");
        let b = TableId::from("orders");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "orders");
        assert_eq!(a.as_str(), "orders");
    }

    #[test]
    fn test_table_id_cheap_clone() {
        let a = TableId::new("orders");
        let b = a.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn test_replica_id_primary() {
        assert!(ReplicaId::PRIMARY.is_primary());
        assert!(!ReplicaId::new(1).is_primary());
        assert_eq!(ReplicaId::default(), ReplicaId::PRIMARY);
    }

    #[test]
    fn test_replica_id_ordering() {
        assert!(ReplicaId::new(0) < ReplicaId::new(1));
        assert!(ReplicaId::new(1) < ReplicaId::new(2));
    }

    #[test]
    fn test_region_id_roundtrip() {
        let id = RegionId::from(42u64);
        assert_eq!(id.value(), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_server_endpoint_display() {
        let endpoint = ServerEndpoint::new("rs1.example.com", 16020);
        assert_eq!(endpoint.to_string(), "rs1.example.com:16020");
        assert_eq!(endpoint.host(), "rs1.example.com");
        assert_eq!(endpoint.port(), 16020);
    }

    #[test]
    fn test_server_endpoint_eq() {
        let a = ServerEndpoint::new("s1", 1);
        let b = ServerEndpoint::new("s1", 1);
        let c = ServerEndpoint::new("s1", 2);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
