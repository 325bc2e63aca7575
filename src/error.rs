//! Crate-level errors.
//!
//! Every public operation in this crate delivers its outcome through the
//! returned future; nothing here is raised synchronously to the caller.
//! Errors are `Clone` because a single fetch outcome is fanned out to every
//! coalesced waiter.
//!
//! Locally recoverable conditions (a cache miss, an upsert losing a version
//! race) are handled internally and never show up in this enum.

use thiserror::Error;

use crate::types::TableId;

/// Result type for locator operations.
pub type LocateResult<T> = Result<T, LocateError>;

/// Errors surfaced by region-location resolution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LocateError {
    /// The table has no known regions. Not retried by this crate.
    #[error("table {0} has no known regions")]
    TableNotFound(TableId),

    /// Transient failure contacting the metadata source. Surfaced unchanged;
    /// retry policy belongs to the caller or the source itself.
    #[error("metadata fetch failed: {0}")]
    MetadataFetch(String),

    /// A full-table resolution could not assemble a gapless, non-overlapping
    /// primary cover within the retry cap.
    #[error("incomplete region cover for table {table} after {attempts} attempts: {detail}")]
    IncompleteCoverage {
        table: TableId,
        attempts: u32,
        detail: String,
    },

    /// A resolved region does not actually contain the queried row, or an
    /// in-flight fetch vanished without an outcome. Indicates a bug in the
    /// cache or the metadata source; always surfaced.
    #[error("internal consistency violation: {0}")]
    InternalConsistency(String),
}

impl LocateError {
    /// Whether the failure class is worth retrying from the caller's side.
    ///
    /// `TableNotFound` and `InternalConsistency` will not heal on their own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LocateError::MetadataFetch(_) | LocateError::IncompleteCoverage { .. }
        )
    }
}
