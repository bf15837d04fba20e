//! Programmable-search client returning snippet digests.

use super::{SearchOutcome, SearchProvider};
use crate::config::SearchConfig;
use crate::errors::PipelineError;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

const DEFAULT_ENDPOINT: &str = "https://customsearch.googleapis.com/customsearch/v1";

/// HTTP client for the programmable-search JSON API.
#[derive(Debug, Clone)]
pub struct GoogleSearchClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    engine_id: String,
    results_per_query: usize,
}

impl GoogleSearchClient {
    /// Creates a search client.
    #[must_use]
    pub fn new(api_key: impl Into<String>, engine_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            engine_id: engine_id.into(),
            results_per_query: 5,
        }
    }

    /// Sets the number of results requested per query.
    #[must_use]
    pub fn with_results_per_query(mut self, count: usize) -> Self {
        self.results_per_query = count;
        self
    }

    /// Applies the pipeline's search settings.
    #[must_use]
    pub fn with_search_config(self, config: &SearchConfig) -> Self {
        self.with_results_per_query(config.results_per_query)
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Debug, Deserialize, Default)]
struct ErrorResponse {
    #[serde(default)]
    error: ErrorBody,
}

#[derive(Debug, Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize, Default)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

fn is_quota_error(body: &ErrorResponse) -> bool {
    body.error.errors.iter().any(|detail| {
        matches!(
            detail.reason.as_str(),
            "rateLimitExceeded" | "dailyLimitExceeded" | "quotaExceeded"
        )
    })
}

fn format_snippets(items: &[SearchItem]) -> String {
    items
        .iter()
        .map(|item| format!("Source: {}\nContent: {}", item.title, item.snippet))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

#[async_trait]
impl SearchProvider for GoogleSearchClient {
    async fn search(&self, query: &str) -> Result<SearchOutcome, PipelineError> {
        let num = self.results_per_query.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|err| PipelineError::Generation(err.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!(query, "search quota exhausted");
            return Ok(SearchOutcome::QuotaExceeded);
        }

        if !status.is_success() {
            let body: ErrorResponse = response.json().await.unwrap_or_default();
            if is_quota_error(&body) {
                warn!(query, "search quota exhausted");
                return Ok(SearchOutcome::QuotaExceeded);
            }
            return Err(PipelineError::Generation(format!(
                "search provider returned status {status}"
            )));
        }

        let payload: SearchResponse = response
            .json()
            .await
            .map_err(|err| PipelineError::Generation(err.to_string()))?;

        if payload.items.is_empty() {
            return Ok(SearchOutcome::NoResults);
        }
        Ok(SearchOutcome::Hits(format_snippets(&payload.items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_snippets() {
        let items = vec![
            SearchItem {
                title: "Acme Corp - About".to_string(),
                snippet: "Acme builds anvils.".to_string(),
            },
            SearchItem {
                title: "Acme raises funding".to_string(),
                snippet: "Series B announced.".to_string(),
            },
        ];

        let digest = format_snippets(&items);
        assert_eq!(
            digest,
            "Source: Acme Corp - About\nContent: Acme builds anvils.\n\n---\n\nSource: Acme raises funding\nContent: Series B announced."
        );
    }

    #[test]
    fn test_quota_reason_detection() {
        let body: ErrorResponse = serde_json::from_str(
            r#"{"error": {"errors": [{"reason": "dailyLimitExceeded"}]}}"#,
        )
        .expect("parse");
        assert!(is_quota_error(&body));

        let body: ErrorResponse =
            serde_json::from_str(r#"{"error": {"errors": [{"reason": "backendError"}]}}"#)
                .expect("parse");
        assert!(!is_quota_error(&body));
    }

    #[test]
    fn test_builders() {
        let client = GoogleSearchClient::new("key", "cx")
            .with_results_per_query(3)
            .with_endpoint("http://localhost:9090");
        assert_eq!(client.results_per_query, 3);
        assert_eq!(client.endpoint, "http://localhost:9090");

        let config = SearchConfig { results_per_query: 7 };
        let client = GoogleSearchClient::new("key", "cx").with_search_config(&config);
        assert_eq!(client.results_per_query, 7);
    }
}
