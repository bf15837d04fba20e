//! Scripted collaborators for tests.
//!
//! The pipeline's collaborators are trait objects, so tests script them
//! directly instead of standing up providers: queue responses for stage
//! calls, route validation prompts by substring, and count invocations.

use crate::agents::{Agent, AgentResult};
use crate::context::StageContext;
use crate::errors::PipelineError;
use crate::providers::{SearchOutcome, SearchProvider, TextGenerator};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Initializes a fmt tracing subscriber for test debugging. Safe to call
/// repeatedly; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// A passing verdict payload for scripting the validation gate.
#[must_use]
pub fn valid_verdict() -> String {
    r#"{"is_valid": true, "critique": ""}"#.to_string()
}

/// A failing verdict payload with a critique.
#[must_use]
pub fn invalid_verdict(critique: &str) -> String {
    format!(r#"{{"is_valid": false, "critique": "{critique}"}}"#)
}

/// Scripted text generator.
///
/// Resolution order per call: first matching substring pattern, then the
/// response queue, then the fallback. An exhausted script is an error so
/// tests notice unplanned calls.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    patterns: Vec<(String, String)>,
    responses: Mutex<VecDeque<String>>,
    fallback: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    /// Creates an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one response.
    #[must_use]
    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.responses.lock().push_back(response.into());
        self
    }

    /// Routes prompts containing `substring` to a fixed response, checked
    /// before the queue.
    #[must_use]
    pub fn with_pattern(mut self, substring: impl Into<String>, response: impl Into<String>) -> Self {
        self.patterns.push((substring.into(), response.into()));
        self
    }

    /// Sets a response for calls the script does not cover.
    #[must_use]
    pub fn with_fallback(mut self, response: impl Into<String>) -> Self {
        self.fallback = Some(response.into());
        self
    }

    /// Number of `generate` calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every prompt received, in call order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());

        for (substring, response) in &self.patterns {
            if prompt.contains(substring.as_str()) {
                return Ok(response.clone());
            }
        }
        if let Some(response) = self.responses.lock().pop_front() {
            return Ok(response);
        }
        match &self.fallback {
            Some(response) => Ok(response.clone()),
            None => Err(PipelineError::Generation(
                "generator script exhausted".to_string(),
            )),
        }
    }
}

/// Generator that always fails with a transport-style error.
#[derive(Debug)]
pub struct FailingGenerator {
    message: String,
    calls: AtomicUsize,
}

impl FailingGenerator {
    /// Creates a failing generator.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `generate` calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(PipelineError::Generation(self.message.clone()))
    }
}

/// Search provider returning one fixed outcome for every query.
#[derive(Debug)]
pub struct StaticSearch {
    outcome: Option<SearchOutcome>,
    error: Option<String>,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl StaticSearch {
    fn with_outcome(outcome: Option<SearchOutcome>, error: Option<String>) -> Self {
        Self {
            outcome,
            error,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Every query returns the given snippets.
    #[must_use]
    pub fn hits(snippets: impl Into<String>) -> Self {
        Self::with_outcome(Some(SearchOutcome::Hits(snippets.into())), None)
    }

    /// Every query matches nothing.
    #[must_use]
    pub fn no_results() -> Self {
        Self::with_outcome(Some(SearchOutcome::NoResults), None)
    }

    /// Every query reports quota exhaustion.
    #[must_use]
    pub fn quota_exceeded() -> Self {
        Self::with_outcome(Some(SearchOutcome::QuotaExceeded), None)
    }

    /// Every query fails with a transport error.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_outcome(None, Some(message.into()))
    }

    /// Number of `search` calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every query received, in call order.
    #[must_use]
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(&self, query: &str) -> Result<SearchOutcome, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().push(query.to_string());

        if let Some(message) = &self.error {
            return Err(PipelineError::Generation(message.clone()));
        }
        match &self.outcome {
            Some(outcome) => Ok(outcome.clone()),
            None => Ok(SearchOutcome::NoResults),
        }
    }
}

/// Fixed-output agent that counts executions, for executor tests.
#[derive(Debug)]
pub struct CountingAgent {
    name: String,
    output: String,
    skip: bool,
    failures_remaining: AtomicUsize,
    calls: AtomicUsize,
}

impl CountingAgent {
    /// Creates an agent returning a fixed output.
    #[must_use]
    pub fn new(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output: output.into(),
            skip: false,
            failures_remaining: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates an agent returning a skip-marked result.
    #[must_use]
    pub fn skipping(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output: reason.into(),
            skip: true,
            failures_remaining: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Makes the first `count` executions fail with a generation error.
    #[must_use]
    pub fn failing_first(self, count: usize) -> Self {
        self.failures_remaining.store(count, Ordering::SeqCst);
        self
    }

    /// Number of `execute` calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for CountingAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &StageContext) -> Result<AgentResult, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(PipelineError::Generation("scripted failure".to_string()));
        }

        if self.skip {
            Ok(AgentResult::skipped(self.output.clone()))
        } else {
            Ok(AgentResult::new(self.output.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_scripted_generator_order() {
        let generator = ScriptedGenerator::new()
            .with_pattern("verdict", valid_verdict())
            .with_response("first")
            .with_response("second");

        assert_eq!(generator.generate("give a verdict").await.expect("generate"), valid_verdict());
        assert_eq!(generator.generate("a").await.expect("generate"), "first");
        assert_eq!(generator.generate("b").await.expect("generate"), "second");
        assert!(generator.generate("c").await.is_err());
        assert_eq!(generator.call_count(), 4);
        assert_eq!(generator.prompts().len(), 4);
    }

    #[tokio::test]
    async fn test_scripted_generator_fallback() {
        let generator = ScriptedGenerator::new().with_fallback("echo");
        assert_eq!(generator.generate("anything").await.expect("generate"), "echo");
    }

    #[tokio::test]
    async fn test_static_search_records_queries() {
        let search = StaticSearch::hits("snippets");
        let outcome = search.search("acme").await.expect("search");
        assert_eq!(outcome, SearchOutcome::Hits("snippets".to_string()));
        assert_eq!(search.queries(), vec!["acme"]);

        let failing = StaticSearch::failing("down");
        assert!(failing.search("acme").await.is_err());
    }

    #[tokio::test]
    async fn test_counting_agent_failures() {
        let agent = CountingAgent::new("stage", "out").failing_first(1);
        assert!(agent.execute(&StageContext::new()).await.is_err());
        let result = agent.execute(&StageContext::new()).await.expect("execute");
        assert_eq!(result.output, "out");
        assert_eq!(agent.call_count(), 2);
    }
}
