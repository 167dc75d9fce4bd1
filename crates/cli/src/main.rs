//! `pr-relay` binary.
//!
//! Composition root: reads configuration, wires the GitHub listing source and
//! the enrichment client into a [`relay::RelayService`], and serves the HTTP
//! surface until interrupted.

mod config;
mod telemetry;

use std::sync::Arc;

use anyhow::Context;
use github::GitHubPullRequestSource;
use listener::{app_router, AppState, SignatureVerifier};
use llm::EnrichmentClient;
use relay::RelayService;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let telemetry = telemetry::init(config.otlp_endpoint.as_deref())?;

    let result = run(config).await;
    if let Err(e) = &result {
        error!("Relay stopped: {:#}", e);
    }
    telemetry.shutdown();
    result
}

async fn run(config: Config) -> anyhow::Result<()> {
    let http = reqwest::Client::new();
    let repository = config.github.repository.clone();

    let source = Arc::new(GitHubPullRequestSource::with_client(http.clone(), config.github));
    let enricher = Arc::new(EnrichmentClient::with_client(http, config.enrichment));
    let relay = Arc::new(RelayService::new(source, enricher));

    let verifier = config
        .webhook_secret
        .as_ref()
        .map(SignatureVerifier::new)
        .transpose()
        .context("invalid webhook secret")?;
    let state = AppState::new(relay, verifier).context("failed to compile page templates")?;
    let app = app_router(Arc::new(state));

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(
        addr = %config.listen_addr,
        repository = %repository,
        signature_check = config.webhook_secret.is_some(),
        "PR relay listening"
    );

    // Open event streams never finish on their own, so shutdown stops the
    // server outright instead of draining connections.
    tokio::select! {
        served = axum::serve(listener, app) => served.context("server error")?,
        _ = shutdown_signal() => info!("Shutdown signal received"),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
