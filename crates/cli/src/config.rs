//! Runtime configuration, read from the environment at startup.
//!
//! A `.env` file in the working directory is loaded first if present; real
//! environment variables take precedence over it. Empty values count as unset.

use std::net::SocketAddr;

use github::{GitHubConfig, DEFAULT_API_URL};
use llm::EnrichmentConfig;
use pipeline::{RelayError, RepositoryId};
use reqwest::Url;
use secrecy::SecretString;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";

/// Everything the composition root needs to build the relay.
#[derive(Debug)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub github: GitHubConfig,
    pub enrichment: EnrichmentConfig,
    /// Shared secret for `X-Hub-Signature-256`; `None` disables verification.
    pub webhook_secret: Option<SecretString>,
    /// OTLP collector endpoint; `None` disables trace export.
    pub otlp_endpoint: Option<String>,
}

impl Config {
    /// Loads configuration from `.env` and the process environment.
    pub fn from_env() -> Result<Self, RelayError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RelayError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &str| {
            get(key).ok_or_else(|| RelayError::configuration(format!("{key} must be set")))
        };

        let listen_raw = get("RELAY_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.into());
        let listen_addr = listen_raw.parse().map_err(|e| {
            RelayError::configuration(format!("Invalid RELAY_LISTEN_ADDR '{listen_raw}': {e}"))
        })?;

        let repo_raw = require("RELAY_GITHUB_REPOSITORY")?;
        let repository = RepositoryId::parse(&repo_raw).ok_or_else(|| {
            RelayError::configuration(format!(
                "RELAY_GITHUB_REPOSITORY must be 'owner/repo', got '{repo_raw}'"
            ))
        })?;
        let api_url = parse_url(
            "RELAY_GITHUB_API_URL",
            &get("RELAY_GITHUB_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into()),
        )?;
        let github = GitHubConfig {
            api_url,
            repository,
            token: get("RELAY_GITHUB_TOKEN").map(SecretString::from),
        };

        let endpoint = parse_url("RELAY_ENRICHMENT_URL", &require("RELAY_ENRICHMENT_URL")?)?;
        let api_key = SecretString::from(require("RELAY_ENRICHMENT_API_KEY")?);
        let mut enrichment = EnrichmentConfig::new(endpoint, api_key);
        if let Some(user_id) = get("RELAY_ENRICHMENT_USER_ID") {
            enrichment = enrichment.with_user_id(user_id);
        }
        if let Some(agent_id) = get("RELAY_ENRICHMENT_AGENT_ID") {
            enrichment = enrichment.with_agent_id(agent_id);
        }
        if let Some(session_id) = get("RELAY_ENRICHMENT_SESSION_ID") {
            enrichment = enrichment.with_session_id(session_id);
        }

        Ok(Self {
            listen_addr,
            github,
            enrichment,
            webhook_secret: get("RELAY_WEBHOOK_SECRET").map(SecretString::from),
            otlp_endpoint: get("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }
}

fn parse_url(key: &str, raw: &str) -> Result<Url, RelayError> {
    Url::parse(raw)
        .map_err(|e| RelayError::configuration(format!("Invalid {key} '{raw}': {e}")))
}
