//! PR Relay orchestration.
//!
//! [`RelayService`] is the single owner of the record store and the broadcast
//! hub. It sequences calls between the business logic in the [`pipeline`]
//! crate and the two outbound ports, and contains no domain rules of its own.
//!
//! ## Failure policy
//!
//! Enrichment and listing failures are logged and degrade to absent data. No
//! method on [`RelayService`] returns an error: a user-facing request is never
//! failed because an upstream service misbehaved.

use std::sync::Arc;

use parking_lot::Mutex;
use pipeline::{
    normalize, BroadcastHub, EnrichmentProvider, PrStore, PullRequestId, PullRequestRecord,
    PullRequestSource, RawPullRequest, StoreSnapshot, Subscription, WebhookDelivery,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, field, info, instrument, warn, Span};

/// Payload broadcast after every webhook delivery: the full accumulated
/// webhook sequence, not a delta.
#[derive(Debug, Serialize)]
pub struct WebhookUpdate<'a> {
    pub webhook_prs: &'a [PullRequestRecord],
}

/// Owns the relay's process-wide state and drives both ingestion flows.
pub struct RelayService {
    source: Arc<dyn PullRequestSource>,
    enricher: Arc<dyn EnrichmentProvider>,
    store: PrStore,
    hub: BroadcastHub<Value>,
    // Serialises append + publish so subscribers see snapshots in append order.
    publish_gate: Mutex<()>,
}

impl RelayService {
    /// Creates a relay with an empty store and no subscribers.
    pub fn new(source: Arc<dyn PullRequestSource>, enricher: Arc<dyn EnrichmentProvider>) -> Self {
        Self {
            source,
            enricher,
            store: PrStore::new(),
            hub: BroadcastHub::new(),
            publish_gate: Mutex::new(()),
        }
    }

    /// Re-fetches the upstream listing and replaces `initial_prs` with it.
    ///
    /// Items are enriched one at a time, in listing order. If the listing
    /// itself cannot be fetched, the listing is treated as empty.
    #[instrument(skip(self))]
    pub async fn refresh_listing(&self) -> Vec<PullRequestRecord> {
        let raws = match self.source.list_pull_requests().await {
            Ok(raws) => raws,
            Err(e) => {
                warn!(error = %e, "Pull-request listing unavailable; treating it as empty");
                Vec::new()
            }
        };

        let mut processed = Vec::with_capacity(raws.len());
        for raw in &raws {
            processed.push(self.process(raw).await);
        }

        self.store.replace_initial(processed.clone());
        info!(count = processed.len(), "Listing refreshed");
        processed
    }

    /// Normalises one webhook delivery, appends it, and broadcasts the full
    /// webhook sequence to every subscriber.
    #[instrument(
        skip(self, raw),
        fields(
            shape = raw.shape(),
            pr_id = raw.fields().pull_request_id().map(PullRequestId::as_u64),
            action = field::Empty,
            repository = field::Empty,
            sender = field::Empty
        )
    )]
    pub async fn ingest_webhook(&self, raw: RawPullRequest) -> PullRequestRecord {
        if let Some(delivery) = raw.delivery() {
            record_delivery(delivery);
        }
        let record = self.process(&raw).await;

        let _gate = self.publish_gate.lock();
        let webhook_prs = self.store.append_webhook(record.clone());
        match serde_json::to_value(WebhookUpdate {
            webhook_prs: &webhook_prs,
        }) {
            Ok(payload) => {
                let delivered = self.hub.publish(payload);
                debug!(delivered, total = webhook_prs.len(), "Webhook update broadcast");
            }
            Err(e) => error!(error = %e, "Failed to serialise webhook update"),
        }

        record
    }

    /// Opens a new subscription to webhook updates.
    pub fn subscribe(&self) -> Subscription<Value> {
        self.hub.subscribe()
    }

    /// Number of open subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    /// Copy of both store sequences.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.store.snapshot()
    }

    async fn process(&self, raw: &RawPullRequest) -> PullRequestRecord {
        let reply = match self.enricher.enrich(raw).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                warn!(
                    error = %e,
                    shape = raw.shape(),
                    "Enrichment unavailable; continuing without it"
                );
                None
            }
        };
        normalize(raw, reply.as_ref())
    }
}

fn record_delivery(delivery: &WebhookDelivery) {
    let span = Span::current();
    if let Some(action) = &delivery.action {
        span.record("action", action.as_str());
    }
    if let Some(repository) = &delivery.repository {
        span.record("repository", repository.as_str());
    }
    if let Some(sender) = &delivery.sender {
        span.record("sender", sender.as_str());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use pipeline::{EnrichmentError, EnrichmentReply, SourceError};
    use serde_json::json;

    use super::*;

    // -----------------------------------------------------------------------
    // Fakes
    // -----------------------------------------------------------------------

    struct StaticSource(Vec<Value>);

    #[async_trait]
    impl PullRequestSource for StaticSource {
        async fn list_pull_requests(&self) -> Result<Vec<RawPullRequest>, SourceError> {
            Ok(self.0.iter().map(RawPullRequest::from_value).collect())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl PullRequestSource for FailingSource {
        async fn list_pull_requests(&self) -> Result<Vec<RawPullRequest>, SourceError> {
            Err(SourceError::Status {
                status: 503,
                body: "unavailable".into(),
            })
        }
    }

    /// Answers with a fixed reply (or an error) and tracks concurrency.
    #[derive(Default)]
    struct ScriptedEnricher {
        reply: Option<Value>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    impl ScriptedEnricher {
        fn replying(text: &str) -> Self {
            Self {
                reply: Some(json!({ "response": text })),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl EnrichmentProvider for ScriptedEnricher {
        async fn enrich(
            &self,
            _pull_request: &RawPullRequest,
        ) -> Result<EnrichmentReply, EnrichmentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match &self.reply {
                Some(body) => Ok(EnrichmentReply::new(body.clone())),
                None => Err(EnrichmentError::Transport("connection refused".into())),
            }
        }
    }

    fn listing() -> Vec<Value> {
        vec![
            json!({"id": 1, "title": "One", "user": {"login": "a"}}),
            json!({"id": 2, "title": "Two", "user": {"login": "b"}}),
            json!({"id": 3, "title": "Three"}),
        ]
    }

    fn webhook(id: u64) -> RawPullRequest {
        RawPullRequest::from_value(&json!({
            "action": "opened",
            "pull_request": {"id": id, "title": "Fix bug", "user": {"login": "alice"}}
        }))
    }

    fn relay_with(
        source: impl PullRequestSource + 'static,
        enricher: Arc<ScriptedEnricher>,
    ) -> RelayService {
        RelayService::new(Arc::new(source), enricher)
    }

    // -----------------------------------------------------------------------
    // Listing refresh
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn refresh_replaces_listing_and_is_idempotent() {
        let enricher = Arc::new(ScriptedEnricher::default());
        let relay = relay_with(StaticSource(listing()), enricher.clone());

        let first = relay.refresh_listing().await;
        let second = relay.refresh_listing().await;

        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
        assert_eq!(relay.snapshot().initial_prs, second);
        assert_eq!(enricher.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn refresh_enriches_items_one_at_a_time() {
        let enricher = Arc::new(ScriptedEnricher::replying(r#"{"security": "ok"}"#));
        let relay = relay_with(StaticSource(listing()), enricher.clone());

        let records = relay.refresh_listing().await;

        assert_eq!(enricher.max_in_flight.load(Ordering::SeqCst), 1);
        assert!(records.iter().all(|r| r.enrichment.is_some()));
        assert_eq!(records[2].user, None);
    }

    #[tokio::test]
    async fn refresh_with_failing_source_yields_empty_listing() {
        let enricher = Arc::new(ScriptedEnricher::default());
        let relay = relay_with(FailingSource, enricher.clone());

        assert!(relay.refresh_listing().await.is_empty());
        assert_eq!(enricher.calls.load(Ordering::SeqCst), 0);
        assert!(relay.snapshot().initial_prs.is_empty());
    }

    // -----------------------------------------------------------------------
    // Webhook ingestion
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn every_webhook_delivery_is_appended() {
        let relay = relay_with(StaticSource(Vec::new()), Arc::new(ScriptedEnricher::default()));

        for _ in 0..5 {
            relay.ingest_webhook(webhook(7)).await;
        }

        let webhook_prs = relay.snapshot().webhook_prs;
        assert_eq!(webhook_prs.len(), 5);
        assert!(webhook_prs.iter().all(|r| r.id == Some(json!(7))));
    }

    #[tokio::test]
    async fn failed_enrichment_still_produces_record() {
        let relay = relay_with(StaticSource(Vec::new()), Arc::new(ScriptedEnricher::default()));

        let record = relay.ingest_webhook(webhook(7)).await;

        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "id": 7,
                "title": "Fix bug",
                "user": "alice",
                "status": "enhanced",
                "processed_at": "server"
            })
        );
    }

    #[tokio::test]
    async fn webhook_broadcasts_full_sequence_to_open_subscribers() {
        let relay = relay_with(
            StaticSource(Vec::new()),
            Arc::new(ScriptedEnricher::replying("```json\n{\"readability\": \"high\"}\n```")),
        );
        let mut first = relay.subscribe();
        let mut second = relay.subscribe();
        let closed = relay.subscribe();
        drop(closed);

        relay.ingest_webhook(webhook(1)).await;
        let mut late = relay.subscribe();
        relay.ingest_webhook(webhook(2)).await;

        for sub in [&mut first, &mut second] {
            let one = sub.recv().await.expect("first update");
            assert_eq!(one["webhook_prs"].as_array().map(Vec::len), Some(1));
            assert_eq!(one["webhook_prs"][0]["readability"], json!("high"));

            let two = sub.recv().await.expect("second update");
            assert_eq!(two["webhook_prs"].as_array().map(Vec::len), Some(2));
            assert_eq!(two["webhook_prs"][1]["id"], json!(2));
        }

        let only = late.recv().await.expect("update after subscribing");
        assert_eq!(only["webhook_prs"].as_array().map(Vec::len), Some(2));
        assert!(
            tokio::time::timeout(Duration::from_millis(20), late.recv())
                .await
                .is_err()
        );
        assert_eq!(relay.subscriber_count(), 3);
    }
}
