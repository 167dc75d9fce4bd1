//! Shared value types for the PR Relay domain.
//!
//! Two families live here: the *raw* shapes a pull request can arrive in
//! ([`RawPullRequest`] and its parts), and the *canonical* shape every
//! consumer sees after normalisation ([`PullRequestRecord`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{PullRequestId, RepositoryId};

/// Status label stamped on every normalised record.
pub const STATUS_ENHANCED: &str = "enhanced";

/// Processed-at label stamped on every normalised record.
pub const PROCESSED_AT_SERVER: &str = "server";

/// Key whose presence marks a payload as a webhook delivery.
pub const WEBHOOK_WRAPPER_KEY: &str = "pull_request";

// ---------------------------------------------------------------------------
// Raw input shapes
// ---------------------------------------------------------------------------

/// The pull-request fields the relay reads from either input shape.
///
/// Every field is optional: upstream payloads are not trusted to be complete.
/// `id`, `title` and `author` are carried through as whatever JSON the source
/// sent, so manually created objects with non-numeric ids survive intact.
/// Only `null` counts as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestFields {
    /// Pull-request id; a GitHub integer for GitHub-sourced payloads.
    pub id: Option<Value>,
    /// Pull-request title.
    pub title: Option<Value>,
    /// Login of the pull-request author (`user.login`).
    pub author: Option<Value>,
    /// URL of the `.patch` rendering of the pull request, used for enrichment.
    pub patch_url: Option<String>,
}

impl PullRequestFields {
    /// Extracts the fields from a flat pull-request object.
    ///
    /// Non-object values yield a record with every field absent.
    pub fn from_object(value: &Value) -> Self {
        Self {
            id: value_at(value, &["id"]),
            title: value_at(value, &["title"]),
            author: value_at(value, &["user", "login"]),
            patch_url: string_at(value, &["patch_url"]),
        }
    }

    /// The id as a GitHub pull-request id, when it is one.
    pub fn pull_request_id(&self) -> Option<PullRequestId> {
        self.id.as_ref().and_then(Value::as_u64).map(PullRequestId::new)
    }
}

/// A GitHub `pull_request` webhook delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookDelivery {
    /// The wrapped pull request.
    pub pull_request: PullRequestFields,
    /// Webhook action (`opened`, `synchronize`, `closed`, ...).
    pub action: Option<String>,
    /// Repository the event belongs to (`repository.full_name`).
    pub repository: Option<RepositoryId>,
    /// Login of the account that triggered the event (`sender.login`).
    pub sender: Option<String>,
}

/// A pull request as received, before normalisation.
///
/// The shape is decided once, when the payload enters the relay, by the
/// presence of the [`WEBHOOK_WRAPPER_KEY`] key. Nothing downstream inspects the
/// JSON again to decide which layout it is looking at.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "Value")]
pub enum RawPullRequest {
    /// Flat object as returned by the pull-request listing endpoint.
    Listing(PullRequestFields),
    /// Webhook envelope wrapping the pull request under `pull_request`.
    Webhook(WebhookDelivery),
}

impl RawPullRequest {
    /// Classifies and extracts a JSON payload.
    pub fn from_value(value: &Value) -> Self {
        match value.get(WEBHOOK_WRAPPER_KEY) {
            Some(wrapped) => Self::Webhook(WebhookDelivery {
                pull_request: PullRequestFields::from_object(wrapped),
                action: string_at(value, &["action"]),
                repository: string_at(value, &["repository", "full_name"])
                    .and_then(|name| RepositoryId::parse(&name)),
                sender: string_at(value, &["sender", "login"]),
            }),
            None => Self::Listing(PullRequestFields::from_object(value)),
        }
    }

    /// Returns the pull-request fields regardless of shape.
    pub fn fields(&self) -> &PullRequestFields {
        match self {
            Self::Listing(fields) => fields,
            Self::Webhook(delivery) => &delivery.pull_request,
        }
    }

    /// Returns the webhook envelope, for webhook-shaped payloads.
    pub fn delivery(&self) -> Option<&WebhookDelivery> {
        match self {
            Self::Listing(_) => None,
            Self::Webhook(delivery) => Some(delivery),
        }
    }

    /// Returns the patch reference used to request enrichment, if any.
    pub fn patch_url(&self) -> Option<&str> {
        self.fields().patch_url.as_deref()
    }

    /// Short label for the shape, used in log fields.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Listing(_) => "listing",
            Self::Webhook(_) => "webhook",
        }
    }
}

impl From<Value> for RawPullRequest {
    fn from(value: Value) -> Self {
        Self::from_value(&value)
    }
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |current, key| current.get(*key))
}

fn value_at(value: &Value, path: &[&str]) -> Option<Value> {
    lookup(value, path).filter(|v| !v.is_null()).cloned()
}

fn string_at(value: &Value, path: &[&str]) -> Option<String> {
    lookup(value, path).and_then(Value::as_str).map(str::to_owned)
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

/// Raw structured reply from the external analysis service.
///
/// Kept opaque: the normaliser decides what, if anything, can be read from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnrichmentReply(Value);

impl EnrichmentReply {
    /// Wraps a parsed reply body.
    pub fn new(body: Value) -> Self {
        Self(body)
    }

    /// Returns the underlying JSON value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Analysis fields merged into a record when the enrichment reply parsed to a
/// non-empty object.
///
/// Unlike the record's optional enrichment as a whole, each individual field
/// is serialised even when absent (as `null`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichmentFields {
    pub security: Option<Value>,
    pub readability: Option<Value>,
    pub logic: Option<Value>,
    pub performance: Option<Value>,
}

// ---------------------------------------------------------------------------
// Canonical record
// ---------------------------------------------------------------------------

/// A normalised pull request, identical in shape whichever way it arrived.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullRequestRecord {
    pub id: Option<Value>,
    pub title: Option<Value>,
    /// Author login.
    pub user: Option<Value>,
    pub status: String,
    pub processed_at: String,
    /// Present only when enrichment produced usable data.
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<EnrichmentFields>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn payload_without_wrapper_is_listing_shape() {
        let raw = RawPullRequest::from_value(&json!({
            "id": 11,
            "title": "Add cache",
            "user": {"login": "bob"},
            "patch_url": "https://example.test/pr/11.patch"
        }));

        let RawPullRequest::Listing(fields) = &raw else {
            panic!("expected listing shape, got {raw:?}");
        };
        assert_eq!(fields.id, Some(json!(11)));
        assert_eq!(fields.pull_request_id(), Some(PullRequestId::new(11)));
        assert_eq!(fields.title, Some(json!("Add cache")));
        assert_eq!(fields.author, Some(json!("bob")));
        assert_eq!(raw.patch_url(), Some("https://example.test/pr/11.patch"));
    }

    #[test]
    fn payload_with_wrapper_is_webhook_shape_with_metadata() {
        let raw = RawPullRequest::from_value(&json!({
            "action": "opened",
            "pull_request": {"id": 7, "title": "Fix bug", "user": {"login": "alice"}},
            "repository": {"full_name": "octo/widgets"},
            "sender": {"login": "alice"}
        }));

        let RawPullRequest::Webhook(delivery) = &raw else {
            panic!("expected webhook shape, got {raw:?}");
        };
        assert_eq!(delivery.pull_request.id, Some(json!(7)));
        assert_eq!(delivery.pull_request.author, Some(json!("alice")));
        assert_eq!(delivery.action.as_deref(), Some("opened"));
        assert_eq!(
            delivery.repository.as_ref().map(RepositoryId::as_str),
            Some("octo/widgets")
        );
        assert_eq!(raw.shape(), "webhook");
        assert_eq!(raw.delivery(), Some(delivery));
    }

    #[test]
    fn wrapper_key_decides_shape_even_when_not_an_object() {
        let raw = RawPullRequest::from_value(&json!({"pull_request": null, "id": 3}));
        assert_eq!(raw.shape(), "webhook");
        assert_eq!(raw.fields(), &PullRequestFields::default());
    }

    #[test]
    fn non_integer_fields_are_carried_through_unchanged() {
        let raw = RawPullRequest::from_value(&json!({
            "id": "PR-7",
            "title": 42,
            "user": {"login": {"name": "alice"}},
            "patch_url": 5
        }));
        let fields = raw.fields();
        assert_eq!(fields.id, Some(json!("PR-7")));
        assert_eq!(fields.pull_request_id(), None);
        assert_eq!(fields.title, Some(json!(42)));
        assert_eq!(fields.author, Some(json!({"name": "alice"})));
        assert_eq!(fields.patch_url, None);
        assert_eq!(raw.delivery(), None);
    }

    #[test]
    fn null_and_missing_fields_are_absent() {
        let raw = RawPullRequest::from_value(&json!({"id": null, "user": null}));
        assert_eq!(raw.fields(), &PullRequestFields::default());

        let scalar = RawPullRequest::from_value(&json!([1, 2, 3]));
        assert_eq!(scalar.shape(), "listing");
        assert_eq!(scalar.fields(), &PullRequestFields::default());
    }

    #[test]
    fn raw_pull_request_deserialises_through_value() {
        let raws: Vec<RawPullRequest> =
            serde_json::from_str(r#"[{"id": 1, "title": "a"}, {"pull_request": {"id": 2}}]"#)
                .unwrap();
        assert_eq!(raws[0].shape(), "listing");
        assert_eq!(raws[1].fields().pull_request_id(), Some(PullRequestId::new(2)));
    }

    #[test]
    fn record_without_enrichment_omits_analysis_keys() {
        let record = PullRequestRecord {
            id: Some(json!(7)),
            title: Some(json!("Fix bug")),
            user: None,
            status: STATUS_ENHANCED.into(),
            processed_at: PROCESSED_AT_SERVER.into(),
            enrichment: None,
        };
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "id": 7,
                "title": "Fix bug",
                "user": null,
                "status": "enhanced",
                "processed_at": "server"
            })
        );
    }

    #[test]
    fn record_with_enrichment_flattens_all_four_keys() {
        let record = PullRequestRecord {
            id: None,
            title: None,
            user: None,
            status: STATUS_ENHANCED.into(),
            processed_at: PROCESSED_AT_SERVER.into(),
            enrichment: Some(EnrichmentFields {
                security: Some(json!("ok")),
                ..EnrichmentFields::default()
            }),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["security"], json!("ok"));
        assert!(value.get("readability").is_some_and(Value::is_null));
        assert!(value.get("logic").is_some_and(Value::is_null));
        assert!(value.get("performance").is_some_and(Value::is_null));
    }
}
