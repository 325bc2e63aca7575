//! # Whereabouts
//! Asynchronous region-location resolution and caching for clients of a
//! horizontally partitioned, replicated key-value store.
//!
//! Each table's row-key space is split into contiguous regions served by a
//! fleet of servers; assignments move as regions split, merge, and
//! rebalance. This crate keeps a client-side cache of those assignments,
//! resolves misses through an authoritative metadata source, coalesces
//! concurrent identical fetches into one upstream call, and evicts entries
//! when the data path reports them stale.
//!
//! # Goals
//! - Answer "which server holds the region covering this row" from cache in
//!   the common case, with zero upstream calls
//! - Never hand back a location whose region does not contain the requested
//!   row, and never regress to an older assignment generation
//! - Survive thundering herds: N concurrent misses for one region cost one
//!   metadata fetch
//!
//! ## Getting started
//! Implement [`MetadataSource`](locator::MetadataSource) over your catalog
//! transport and hand it to a [`LocationResolver`](locator::LocationResolver):
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use whereabouts::prelude::*;
//!
//! # fn catalog() -> Arc<dyn MetadataSource> { unimplemented!() }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resolver = LocationResolver::new(catalog());
//!     let orders = resolver.table("orders");
//!
//!     let location = orders.get_region_location(b"order#81723").await?;
//!     println!("row is served by {}", location.server());
//!
//!     // A failed write reports the assignment it acted on; the entry is
//!     // evicted only if nothing newer has been cached since.
//!     resolver
//!         .invalidation_manager()
//!         .report_stale(
//!             orders.name(),
//!             location.region(),
//!             location.region().replica_id(),
//!             location.version(),
//!         )
//!         .await;
//!     Ok(())
//! }
//! ```
//!
//! The cache is session-scoped: create one resolver per client session and
//! drop it with the session. There is no process-wide instance.

#![forbid(unsafe_code)]

pub mod error;
pub mod locator;
pub mod telemetry;
pub mod types;

pub mod prelude {
    //! Main export of locator structures.
    pub use crate::error::{LocateError, LocateResult};
    pub use crate::locator::{
        InvalidationManager, LocationRecord, LocationResolver, LocationTable, MetadataSource,
        RegionDescriptor, TableRegionLocator,
    };
    pub use crate::types::{RegionId, ReplicaId, ServerEndpoint, TableId};
}
