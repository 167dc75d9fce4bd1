//! Port traits implemented by the infrastructure crates.
//!
//! The relay only ever talks to the outside world through these two traits:
//! `github` implements [`PullRequestSource`], `llm` implements
//! [`EnrichmentProvider`]. Tests substitute in-memory fakes.

use async_trait::async_trait;

use crate::errors::{EnrichmentError, SourceError};
use crate::types::{EnrichmentReply, RawPullRequest};

/// Supplies the current upstream pull-request listing.
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    /// Fetches every pull request in the listing, in upstream order.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the listing cannot be fetched or decoded.
    async fn list_pull_requests(&self) -> Result<Vec<RawPullRequest>, SourceError>;
}

/// Obtains analysis output for one pull request from an external service.
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    /// Requests enrichment for `pull_request`.
    ///
    /// Implementations make no retries. Callers treat any error as "no
    /// enrichment available".
    ///
    /// # Errors
    ///
    /// Returns [`EnrichmentError`] if the patch or the analysis reply cannot
    /// be obtained.
    async fn enrich(&self, pull_request: &RawPullRequest)
        -> Result<EnrichmentReply, EnrichmentError>;
}
