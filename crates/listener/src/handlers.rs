use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        Html,
    },
    Json,
};
use futures_core::Stream;
use pipeline::{DeliveryId, PullRequestRecord, RawPullRequest};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, instrument, Span};

use crate::error::{ApiError, ApiResult};
use crate::signature::SIGNATURE_HEADER;
use crate::{AppState, INDEX_TEMPLATE};

/// SSE event name for webhook updates.
pub const UPDATE_EVENT: &str = "update";

const GITHUB_EVENT_HEADER: &str = "x-github-event";
const GITHUB_DELIVERY_HEADER: &str = "x-github-delivery";
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Serialize)]
pub struct ListingResponse {
    pub count: usize,
    pub prs: Vec<PullRequestRecord>,
}

#[derive(Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    pub processed: PullRequestRecord,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub subscribers: usize,
}

/// Render the index page with both store sequences
pub async fn index(State(state): State<Arc<AppState>>) -> ApiResult<Html<String>> {
    let snapshot = state.relay.snapshot();
    let page = state
        .templates
        .render(INDEX_TEMPLATE, &snapshot)
        .map_err(|e| ApiError::Internal(format!("Failed to render index page: {e}")))?;
    Ok(Html(page))
}

/// Refresh the upstream listing and return it
pub async fn list_prs(State(state): State<Arc<AppState>>) -> Json<ListingResponse> {
    let prs = state.relay.refresh_listing().await;
    Json(ListingResponse {
        count: prs.len(),
        prs,
    })
}

/// Accept one webhook delivery
#[instrument(
    skip_all,
    fields(github_event = tracing::field::Empty, delivery_id = tracing::field::Empty)
)]
pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let span = Span::current();
    if let Some(event) = header_str(&headers, GITHUB_EVENT_HEADER) {
        span.record("github_event", event);
    }
    if let Some(delivery) = header_str(&headers, GITHUB_DELIVERY_HEADER).and_then(DeliveryId::new)
    {
        span.record("delivery_id", delivery.as_str());
    }

    if let Some(verifier) = &state.verifier {
        verifier.verify(header_str(&headers, SIGNATURE_HEADER), &body)?;
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Webhook body is not valid JSON: {e}")))?;

    let processed = state
        .relay
        .ingest_webhook(RawPullRequest::from_value(&payload))
        .await;
    info!(pr_id = ?processed.id, "Webhook delivery processed");

    Ok(Json(WebhookAck {
        status: "received",
        processed,
    }))
}

/// Open a server-sent event stream of webhook updates
pub async fn stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let subscription = state.relay.subscribe();
    info!(subscriber_id = %subscription.id(), "Stream opened");

    let events = tokio_stream::StreamExt::filter_map(subscription, |payload| {
        match SseEvent::default().event(UPDATE_EVENT).json_data(&payload) {
            Ok(event) => Some(Ok(event)),
            Err(err) => {
                error!("Failed to serialize SSE payload: {}", err);
                None
            }
        }
    });

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}

/// Liveness check
pub async fn healthz(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        subscribers: state.relay.subscriber_count(),
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
