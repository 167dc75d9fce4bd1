//! PR Relay enrichment client.
//!
//! Implements the [`pipeline::EnrichmentProvider`] trait against a hosted
//! model inference endpoint. For each pull request the client:
//!
//! 1. downloads the pull request's patch text, if it has a `patch_url`;
//! 2. posts a fixed-shape chat request carrying that text as the `message`;
//! 3. returns the parsed JSON reply untouched.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP transport and request formatting live here.
//! Interpreting the reply is the normaliser's job in the [`pipeline`] crate.
//!
//! There are no retries and no explicit timeouts; failures are returned to
//! the caller, which treats them as "no enrichment".

use async_trait::async_trait;
use pipeline::{EnrichmentError, EnrichmentProvider, EnrichmentReply, RawPullRequest};
use reqwest::{header, Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

/// Header carrying the inference API key.
pub const API_KEY_HEADER: &str = "x-api-key";

const USER_AGENT: &str = concat!("pr-relay/", env!("CARGO_PKG_VERSION"));

/// Default value for the static `user_id`, `agent_id` and `session_id` fields.
pub const DEFAULT_CALLER_ID: &str = "pr-relay";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Connection settings for the inference endpoint.
#[derive(Debug)]
pub struct EnrichmentConfig {
    /// Full URL the chat request is posted to.
    pub endpoint: Url,
    /// API key sent in [`API_KEY_HEADER`].
    pub api_key: SecretString,
    /// Static `user_id` sent with every request.
    pub user_id: String,
    /// Static `agent_id` sent with every request.
    pub agent_id: String,
    /// Static `session_id` sent with every request.
    pub session_id: String,
}

impl EnrichmentConfig {
    /// Creates a config with the default caller identifiers.
    #[must_use]
    pub fn new(endpoint: Url, api_key: SecretString) -> Self {
        Self {
            endpoint,
            api_key,
            user_id: DEFAULT_CALLER_ID.to_string(),
            agent_id: DEFAULT_CALLER_ID.to_string(),
            session_id: format!("{DEFAULT_CALLER_ID}-session"),
        }
    }

    /// Sets the `user_id` field.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Sets the `agent_id` field.
    #[must_use]
    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    /// Sets the `session_id` field.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    user_id: &'a str,
    agent_id: &'a str,
    session_id: &'a str,
    message: &'a str,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// [`EnrichmentProvider`] backed by the inference HTTP API.
pub struct EnrichmentClient {
    client: Client,
    config: EnrichmentConfig,
}

impl EnrichmentClient {
    /// Creates a client with a fresh connection pool.
    #[must_use]
    pub fn new(config: EnrichmentConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Creates a client that shares an existing connection pool.
    #[must_use]
    pub fn with_client(client: Client, config: EnrichmentConfig) -> Self {
        Self { client, config }
    }

    async fn fetch_patch(&self, url: &str) -> Result<String, EnrichmentError> {
        let fetch_error = |message: String| EnrichmentError::PatchFetch {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .header(header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {}", status.as_u16())));
        }

        response.text().await.map_err(|e| fetch_error(e.to_string()))
    }

    async fn submit(&self, message: &str) -> Result<EnrichmentReply, EnrichmentError> {
        let request = ChatRequest {
            user_id: &self.config.user_id,
            agent_id: &self.config.agent_id,
            session_id: &self.config.session_id,
            message,
        };

        let response = self
            .client
            .post(self.config.endpoint.clone())
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .header(header::USER_AGENT, USER_AGENT)
            .json(&request)
            .send()
            .await
            .map_err(|e| EnrichmentError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EnrichmentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| EnrichmentError::Transport(e.to_string()))?;
        serde_json::from_slice::<Value>(&bytes)
            .map(EnrichmentReply::new)
            .map_err(|e| EnrichmentError::InvalidReply(e.to_string()))
    }
}

#[async_trait]
impl EnrichmentProvider for EnrichmentClient {
    #[instrument(skip(self, pull_request), fields(shape = pull_request.shape()))]
    async fn enrich(
        &self,
        pull_request: &RawPullRequest,
    ) -> Result<EnrichmentReply, EnrichmentError> {
        let patch = match pull_request.patch_url() {
            Some(url) => self.fetch_patch(url).await?,
            None => String::new(),
        };
        debug!(patch_bytes = patch.len(), "Submitting enrichment request");

        self.submit(&patch).await
    }
}
