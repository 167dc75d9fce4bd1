//! Error types for the PR Relay domain.
//!
//! [`EnrichmentError`] and [`SourceError`] are returned by the two outbound
//! ports. Neither ever reaches an HTTP caller: the relay logs them and carries
//! on with absent data. [`RelayError`] covers conditions that stop the process
//! from starting at all.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Port errors
// ---------------------------------------------------------------------------

/// Failure while obtaining an enrichment reply for one pull request.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// The patch referenced by the pull request could not be fetched.
    #[error("Failed to fetch patch from {url}: {message}")]
    PatchFetch {
        /// The patch URL that was requested.
        url: String,
        /// Transport error or HTTP status description.
        message: String,
    },

    /// The analysis service could not be reached.
    #[error("Enrichment request failed: {0}")]
    Transport(String),

    /// The analysis service answered with a non-success status.
    #[error("Enrichment service returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The analysis service answered with a body that is not JSON.
    #[error("Enrichment reply is not valid JSON: {0}")]
    InvalidReply(String),
}

/// Failure while fetching the upstream pull-request listing.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The listing endpoint could not be reached.
    #[error("Listing request failed: {0}")]
    Transport(String),

    /// The listing endpoint answered with a non-success status.
    #[error("Listing endpoint returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The listing body was not a JSON array.
    #[error("Listing payload is invalid: {0}")]
    InvalidPayload(String),
}

// ---------------------------------------------------------------------------
// Process-level errors
// ---------------------------------------------------------------------------

/// Errors that prevent the relay from starting.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The runtime configuration is missing a value or holds an invalid one.
    ///
    /// Produced at load time; the relay never starts with an invalid config.
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Description of the configuration problem.
        message: String,
    },
}

impl RelayError {
    /// Shorthand for building a [`RelayError::ConfigurationError`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }
}
