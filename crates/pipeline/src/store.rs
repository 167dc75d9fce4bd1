//! In-memory store of normalised pull requests.
//!
//! Holds two independent sequences for the life of the process:
//!
//! - `initial_prs`: replaced wholesale on each listing refresh.
//! - `webhook_prs`: append-only; grows without bound.
//!
//! Nothing is persisted, deduplicated, or indexed.

use parking_lot::RwLock;
use serde::Serialize;

use crate::PullRequestRecord;

/// Point-in-time copy of both store sequences.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreSnapshot {
    pub initial_prs: Vec<PullRequestRecord>,
    pub webhook_prs: Vec<PullRequestRecord>,
}

/// Process-lifetime pull-request store.
///
/// Internally synchronised; the lock is never held across an `.await`.
#[derive(Debug, Default)]
pub struct PrStore {
    inner: RwLock<StoreSnapshot>,
}

impl PrStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the listing sequence with `records`.
    pub fn replace_initial(&self, records: Vec<PullRequestRecord>) {
        self.inner.write().initial_prs = records;
    }

    /// Appends one webhook record and returns the full webhook sequence
    /// including it.
    pub fn append_webhook(&self, record: PullRequestRecord) -> Vec<PullRequestRecord> {
        let mut guard = self.inner.write();
        guard.webhook_prs.push(record);
        guard.webhook_prs.clone()
    }

    /// Returns a copy of the listing sequence.
    pub fn initial_prs(&self) -> Vec<PullRequestRecord> {
        self.inner.read().initial_prs.clone()
    }

    /// Returns a copy of the webhook sequence.
    pub fn webhook_prs(&self) -> Vec<PullRequestRecord> {
        self.inner.read().webhook_prs.clone()
    }

    /// Returns a copy of both sequences taken under one lock.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{PROCESSED_AT_SERVER, STATUS_ENHANCED};

    fn record(id: u64) -> PullRequestRecord {
        PullRequestRecord {
            id: Some(json!(id)),
            title: Some(json!(format!("PR {id}"))),
            user: Some(json!("dev")),
            status: STATUS_ENHANCED.into(),
            processed_at: PROCESSED_AT_SERVER.into(),
            enrichment: None,
        }
    }

    #[test]
    fn new_store_is_empty() {
        let store = PrStore::new();
        assert_eq!(store.snapshot(), StoreSnapshot::default());
    }

    #[test]
    fn replace_initial_discards_previous_listing() {
        let store = PrStore::new();
        store.replace_initial(vec![record(1), record(2)]);
        store.replace_initial(vec![record(3)]);
        assert_eq!(store.initial_prs(), vec![record(3)]);
    }

    #[test]
    fn append_webhook_keeps_duplicates_and_order() {
        let store = PrStore::new();
        store.append_webhook(record(5));
        store.append_webhook(record(6));
        let all = store.append_webhook(record(5));

        assert_eq!(all, vec![record(5), record(6), record(5)]);
        assert_eq!(store.webhook_prs(), all);
    }

    #[test]
    fn sequences_are_independent() {
        let store = PrStore::new();
        store.append_webhook(record(1));
        store.replace_initial(Vec::new());

        let snapshot = store.snapshot();
        assert!(snapshot.initial_prs.is_empty());
        assert_eq!(snapshot.webhook_prs.len(), 1);
    }
}
