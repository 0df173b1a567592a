#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Retrieval and decoding of the SSMSI crime statistics tables.
//!
//! Retrieval goes through the [`Fetcher`] trait so the dataset store never
//! knows whether bytes come from data.gouv.fr ([`fetch::HttpFetcher`]) or
//! from a local mirror ([`fetch::FileFetcher`]). Decoding turns those bytes
//! into the typed tables of [`crimes_france_source_models`], validating the
//! column schema once.

pub mod config;
pub mod fetch;
pub mod parsing;
pub mod retry;

use async_trait::async_trait;

/// Errors that can occur while retrieving or decoding a table.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error (file read, decompression).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server answered with a status that is not worth retrying, or
    /// kept failing after every retry.
    #[error("HTTP status {status} for {url}")]
    Status {
        /// Status code returned by the server.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// CSV decoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Spreadsheet decoding failed.
    #[error("Spreadsheet error: {message}")]
    Spreadsheet {
        /// Description of what went wrong.
        message: String,
    },

    /// The payload does not have the expected columns or values.
    #[error("Schema error: {message}")]
    Schema {
        /// Description of what went wrong.
        message: String,
    },

    /// Source configuration is unusable.
    #[error("Config error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

impl SourceError {
    /// Whether the failure happened while getting the bytes rather than
    /// while decoding them.
    ///
    /// Transport failures are worth retrying later; decoding failures stay
    /// failures until the published file changes.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Io(_) | Self::Status { .. })
    }
}

/// Retrieves the raw bytes behind a source location.
///
/// Implementations own their timeouts and retries. A returned error is
/// final for that call.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches the full payload at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the payload cannot be retrieved.
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_distinct_from_decoding_errors() {
        let status = SourceError::Status {
            status: 503,
            url: "https://example.org".to_string(),
        };
        assert!(status.is_transport());
        assert!(SourceError::Io(std::io::Error::other("reset")).is_transport());

        let schema = SourceError::Schema {
            message: "missing column".to_string(),
        };
        assert!(!schema.is_transport());
        assert!(
            !SourceError::Spreadsheet {
                message: "bad zip".to_string()
            }
            .is_transport()
        );
    }
}
