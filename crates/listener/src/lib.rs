//! PR Relay HTTP surface.
//!
//! Binds the [`relay::RelayService`] to HTTP:
//!
//! | Route | Method | Behaviour |
//! |-------|--------|-----------|
//! | `/` | GET | HTML page listing both store sequences; subscribes to `/stream` |
//! | `/prs` | GET | Refreshes the upstream listing; `{"count", "prs"}` |
//! | `/webhook` | POST | Ingests one delivery; `{"status": "received", "processed"}` |
//! | `/stream` | GET | Server-sent events, one `update` event per webhook delivery |
//! | `/healthz` | GET | Liveness and open-stream count |
//!
//! When a webhook secret is configured, every `/webhook` request must carry a
//! valid `X-Hub-Signature-256` header (HMAC-SHA256 of the raw body).
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Request decoding, signature checks and response
//! framing live here. The [`relay`] crate sees only decoded
//! [`pipeline::RawPullRequest`] values.

pub mod error;
pub mod handlers;
pub mod signature;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use handlebars::{
    Context, Handlebars, Helper, HelperResult, Output, RenderContext, TemplateError,
};
use relay::RelayService;
use serde_json::Value;
use tower_http::trace::TraceLayer;

pub use error::{ApiError, ApiResult};
pub use signature::{SignatureError, SignatureVerifier, SIGNATURE_HEADER};

pub(crate) const INDEX_TEMPLATE: &str = "index";
const JSON_HELPER: &str = "json";

/// Shared state handed to every handler.
pub struct AppState {
    pub relay: Arc<RelayService>,
    /// `None` disables webhook signature checks.
    pub verifier: Option<SignatureVerifier>,
    templates: Handlebars<'static>,
}

impl AppState {
    /// Builds handler state, compiling the page templates.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] if a bundled template fails to compile.
    pub fn new(
        relay: Arc<RelayService>,
        verifier: Option<SignatureVerifier>,
    ) -> Result<Self, TemplateError> {
        let mut templates = Handlebars::new();
        templates.register_helper(JSON_HELPER, Box::new(json_helper));
        templates.register_template_string(INDEX_TEMPLATE, include_str!("../templates/index.hbs"))?;
        Ok(Self {
            relay,
            verifier,
            templates,
        })
    }
}

/// `{{json value}}`: strings verbatim, anything else as compact JSON, escaped.
///
/// Matches how the page's stream client renders the same values.
fn json_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let text = match h.param(0).map(|param| param.value()) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    out.write(&handlebars::html_escape(&text))?;
    Ok(())
}

/// Builds the application router.
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/prs", get(handlers::list_prs))
        .route("/webhook", post(handlers::receive_webhook))
        .route("/stream", get(handlers::stream))
        .route("/healthz", get(handlers::healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
