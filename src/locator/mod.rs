//! Region-location resolution and caching.
//!
//! The locator answers one question for the data path: which server
//! currently holds the region replica covering a given row key. It is built
//! from four pieces:
//!
//! - [`LocationTable`]: the ordered per-table cache of known assignments
//! - [`SingleFlightCoordinator`]: dedup of concurrent identical fetches
//! - [`LocationResolver`] / [`TableRegionLocator`]: the lookup orchestration
//!   and the table-bound handle callers hold
//! - [`InvalidationManager`]: the entry point for staleness signals from
//!   failed data operations
//!
//! The authoritative catalog sits behind the [`MetadataSource`] trait; the
//! locator owns no transport.

mod invalidation;
#[cfg(any(test, feature = "test-utilities"))]
pub mod mock_source;
mod region;
mod resolver;
mod single_flight;
mod table;
mod traits;

pub use invalidation::InvalidationManager;
#[cfg(any(test, feature = "test-utilities"))]
pub use mock_source::MockMetadataSource;
pub use region::{LocationRecord, RegionDescriptor};
pub use resolver::{LocationResolver, TableRegionLocator, MAX_COVERAGE_ATTEMPTS};
pub use single_flight::{FlightKey, FlightOutcome, FlightPurpose, SingleFlightCoordinator};
pub use table::LocationTable;
pub use traits::MetadataSource;
