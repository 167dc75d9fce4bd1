//! Maps a [`RawPullRequest`] plus an optional [`EnrichmentReply`] onto the
//! canonical [`PullRequestRecord`].
//!
//! Normalisation never fails. Anything unreadable in the enrichment reply is
//! logged and the record is produced without analysis fields.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::types::{
    EnrichmentFields, EnrichmentReply, PullRequestRecord, RawPullRequest, PROCESSED_AT_SERVER,
    STATUS_ENHANCED,
};

/// Field of an object reply that carries the model's textual answer.
pub const REPLY_TEXT_FIELD: &str = "response";

/// Produces the canonical record for `raw`.
///
/// `reply` is `None` when enrichment was unavailable; the record then carries
/// only the source fields.
pub fn normalize(raw: &RawPullRequest, reply: Option<&EnrichmentReply>) -> PullRequestRecord {
    let fields = raw.fields();
    PullRequestRecord {
        id: fields.id.clone(),
        title: fields.title.clone(),
        user: fields.author.clone(),
        status: STATUS_ENHANCED.to_string(),
        processed_at: PROCESSED_AT_SERVER.to_string(),
        enrichment: reply.and_then(extract_model_data).map(|data| merge(&data)),
    }
}

/// Reads the structured analysis out of a reply.
///
/// Returns `None` if the reply has no text, the text is not JSON, the JSON is
/// not an object, or the object is empty.
fn extract_model_data(reply: &EnrichmentReply) -> Option<Map<String, Value>> {
    let text = match reply.as_value() {
        Value::String(text) => text.as_str(),
        other => match other.get(REPLY_TEXT_FIELD).and_then(Value::as_str) {
            Some(text) => text,
            None => {
                debug!("Enrichment reply carries no '{REPLY_TEXT_FIELD}' text");
                return None;
            }
        },
    };

    match serde_json::from_str::<Value>(strip_code_fence(text)) {
        Ok(Value::Object(map)) if !map.is_empty() => Some(map),
        Ok(Value::Object(_)) => None,
        Ok(other) => {
            warn!(kind = json_kind(&other), "Enrichment reply is not a JSON object");
            None
        }
        Err(e) => {
            warn!(error = %e, "Failed to parse enrichment reply");
            None
        }
    }
}

fn merge(data: &Map<String, Value>) -> EnrichmentFields {
    EnrichmentFields {
        security: data.get("security").cloned(),
        readability: data.get("readability").cloned(),
        logic: data.get("logic").cloned(),
        performance: data.get("performance").cloned(),
    }
}

/// Removes a Markdown code fence wrapped around `text`, if there is one.
///
/// The opening fence may carry a language tag (```` ```json ````), either on
/// its own line or directly before the body. Text without a fence is returned
/// trimmed but otherwise untouched.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match after_open.split_once('\n') {
        Some((tag, rest)) if is_language_tag(tag) => rest,
        _ => after_open.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    let body = body.trim();
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn is_language_tag(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '_'))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
