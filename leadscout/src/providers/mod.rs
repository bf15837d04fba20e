//! External collaborator contracts.
//!
//! The pipeline consumes two narrow capabilities: free-form text generation
//! and web search. Both are trait objects injected at construction; the
//! HTTP-backed implementations live behind the `providers` feature.

use crate::errors::PipelineError;
use async_trait::async_trait;

#[cfg(feature = "providers")]
mod gemini;
#[cfg(feature = "providers")]
mod search;

#[cfg(feature = "providers")]
pub use gemini::GeminiGenerator;
#[cfg(feature = "providers")]
pub use search::GoogleSearchClient;

/// Text-generation capability.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates text for a prompt.
    ///
    /// # Errors
    ///
    /// Any transport or provider failure surfaces as a generic
    /// `PipelineError::Generation`.
    async fn generate(&self, prompt: &str) -> Result<String, PipelineError>;
}

/// Outcome of one search call.
///
/// Quota exhaustion is a sentinel value, not an error: stages detect it and
/// degrade gracefully instead of failing the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Formatted result snippets.
    Hits(String),
    /// The query matched nothing.
    NoResults,
    /// The provider reported quota or rate-limit exhaustion.
    QuotaExceeded,
}

impl SearchOutcome {
    /// Returns true for the quota sentinel.
    #[must_use]
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded)
    }
}

/// Web-search capability.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Runs one search query.
    ///
    /// # Errors
    ///
    /// Transport failures are errors; quota exhaustion is not (see
    /// [`SearchOutcome::QuotaExceeded`]).
    async fn search(&self, query: &str) -> Result<SearchOutcome, PipelineError>;
}
