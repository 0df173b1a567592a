#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Raw table store and normalized dataset snapshot.
//!
//! [`DatasetStore`] retrieves each raw table once per process and hands out
//! shared immutable copies. [`KeyNormalizer`] rewrites the tables into one
//! key space (2023 commune codes, canonical department codes, four-digit
//! years), and [`Snapshot`] bundles the normalized tables for the
//! aggregation code.

pub mod normalize;
pub mod single_flight;
pub mod snapshot;
pub mod store;

use crimes_france_source::SourceError;
use crimes_france_source_models::TableId;

pub use normalize::{DropReason, DroppedRow, KeyNormalizer, NormalizationReport, Normalized};
pub use snapshot::{GeographyIndex, Snapshot};
pub use store::DatasetStore;

/// Errors that can occur while loading a table.
///
/// Cloneable so that every caller waiting on the same load receives the
/// same failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatasetError {
    /// The table could not be retrieved. Retrying later may succeed.
    #[error("{table} table is unavailable: {message}")]
    SourceUnavailable {
        /// Table that failed to load.
        table: TableId,
        /// Description of the retrieval failure.
        message: String,
    },

    /// The table was retrieved but could not be decoded.
    #[error("{table} table could not be parsed: {message}")]
    ParseError {
        /// Table that failed to load.
        table: TableId,
        /// Description of the decoding failure.
        message: String,
    },

    /// The decoded table is not of the kind the caller asked for.
    #[error("{table} table is not {expected}")]
    WrongTableKind {
        /// Table that was loaded.
        table: TableId,
        /// Kind the caller expected.
        expected: &'static str,
    },

    /// Source configuration is unusable.
    #[error("Config error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

impl DatasetError {
    /// Classifies a [`SourceError`] raised while loading `table`.
    #[must_use]
    pub fn from_source(table: TableId, error: &SourceError) -> Self {
        let message = error.to_string();
        if error.is_transport() {
            Self::SourceUnavailable { table, message }
        } else {
            Self::ParseError { table, message }
        }
    }

    /// Whether the same request may succeed later without a fix upstream.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. })
    }
}
