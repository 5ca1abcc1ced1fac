//! Response normalisation: turn a structured-list answer into records.
//!
//! Models asked for "a list of dictionaries" usually answer with a JSON
//! array, often wrapped in a ```` ```json ```` fence despite not being asked
//! to. The fence is stripped and the rest is parsed; records keep the keys
//! and values exactly as the model wrote them. Anything that is not a JSON
//! array of objects yields `None`: the page contributes nothing and the run
//! carries on.

use crate::output::HoldingRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

static RE_OPEN_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```[A-Za-z0-9_-]*[ \t]*\r?\n?").unwrap());
static RE_CLOSE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r?\n?```\s*$").unwrap());

/// Remove a leading and a trailing markdown fence marker, if present.
pub fn strip_code_fences(raw: &str) -> &str {
    let s = raw.trim();
    let start = RE_OPEN_FENCE.find(s).map_or(0, |m| m.end());
    let s = &s[start..];
    let end = RE_CLOSE_FENCE.find(s).map_or(s.len(), |m| m.start());
    s[..end].trim()
}

/// Parse a model answer into holding records.
///
/// Returns `None` when the answer is not a JSON array whose elements are
/// all objects. `Some(vec![])` means the model explicitly found nothing.
pub fn normalize_records(raw: &str) -> Option<Vec<HoldingRecord>> {
    let body = strip_code_fences(raw);

    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            warn!("Structured answer is not valid JSON ({}); skipping", e);
            return None;
        }
    };

    let Value::Array(items) = value else {
        warn!("Structured answer is JSON but not a list; skipping");
        return None;
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(obj) => Some(obj),
            other => {
                warn!("Structured answer has a non-object element: {}", other);
                None
            }
        })
        .collect()
}
