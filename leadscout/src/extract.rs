//! Structured-payload extraction from free-form generation output.
//!
//! Generators asked for strict JSON still wrap it in markdown fences or
//! surrounding prose often enough that parsing must be a dedicated step with
//! an explicit failure path.

use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

static FENCE: OnceLock<Option<Regex>> = OnceLock::new();

fn fence_regex() -> Option<&'static Regex> {
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").ok())
        .as_ref()
}

/// Strips a markdown code fence if the response is wrapped in one.
#[must_use]
pub fn strip_fences(response: &str) -> &str {
    if let Some(re) = fence_regex() {
        if let Some(captures) = re.captures(response) {
            if let Some(inner) = captures.get(1) {
                return inner.as_str().trim();
            }
        }
    }
    response.trim()
}

/// Extracts and parses a JSON payload from a generation response.
///
/// # Errors
///
/// Returns the underlying deserialization error when the (unfenced) response
/// is not valid JSON for `T`. Callers convert this into a typed fallback
/// value; it never aborts a run.
pub fn extract_json<T: DeserializeOwned>(response: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(strip_fences(response))
}
