//! PR Relay GitHub adapter.
//!
//! Implements [`pipeline::PullRequestSource`] by reading the open pull
//! requests of one repository from the GitHub REST API
//! (`GET /repos/{owner}/{repo}/pulls`).
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules. Each listing
//! element is handed to the [`pipeline`] crate as-is; shape detection and
//! field extraction happen there.
//!
//! Only the first page GitHub returns is read.

use async_trait::async_trait;
use pipeline::{PullRequestSource, RawPullRequest, RepositoryId, SourceError};
use reqwest::{header, Client, Url};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};

/// Public GitHub REST API base URL.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("pr-relay/", env!("CARGO_PKG_VERSION"));

/// Where and how to read the pull-request listing.
#[derive(Debug)]
pub struct GitHubConfig {
    /// API base URL (e.g. [`DEFAULT_API_URL`] or a GitHub Enterprise host).
    pub api_url: Url,
    /// Repository whose pull requests are listed.
    pub repository: RepositoryId,
    /// Optional token; unauthenticated requests are heavily rate-limited.
    pub token: Option<SecretString>,
}

/// [`PullRequestSource`] backed by the GitHub REST API.
pub struct GitHubPullRequestSource {
    client: Client,
    config: GitHubConfig,
}

impl GitHubPullRequestSource {
    /// Creates a source with a fresh connection pool.
    #[must_use]
    pub fn new(config: GitHubConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Creates a source that shares an existing connection pool.
    #[must_use]
    pub fn with_client(client: Client, config: GitHubConfig) -> Self {
        Self { client, config }
    }

    /// URL of the pull-request listing for the configured repository.
    pub fn listing_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/pulls",
            self.config.api_url.as_str().trim_end_matches('/'),
            self.config.repository.owner(),
            self.config.repository.name()
        )
    }
}

#[async_trait]
impl PullRequestSource for GitHubPullRequestSource {
    #[instrument(skip(self), fields(repository = %self.config.repository))]
    async fn list_pull_requests(&self) -> Result<Vec<RawPullRequest>, SourceError> {
        let mut request = self
            .client
            .get(self.listing_url())
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header(header::USER_AGENT, USER_AGENT);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        let pulls: Vec<RawPullRequest> = serde_json::from_slice(&bytes)
            .map_err(|e| SourceError::InvalidPayload(e.to_string()))?;

        debug!(count = pulls.len(), "Fetched pull-request listing");
        Ok(pulls)
    }
}
