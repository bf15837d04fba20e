//! Analysis agents.
//!
//! Agents are the units of work in the pipeline: each one reads specific keys
//! from the accreted [`StageContext`] and returns one [`AgentResult`]. Agents
//! are stateless between calls; their only side effects are calls to the
//! generation and search collaborators they were constructed with.

use crate::context::StageContext;
use crate::errors::PipelineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;

mod finalization;
mod identification;
mod parsing;
mod profiling;
pub mod prompts;
mod research;
mod tutoring;

pub use finalization::ReportFinalizerAgent;
pub use identification::CompanyIdentificationAgent;
pub use parsing::{ParsedRequest, RequestParsingAgent, PARSING_SKIPPED, PARSING_UNPARSED};
pub use profiling::{AttractivenessProfilerAgent, PROFILING_SKIPPED};
pub use research::{OsintResearchAgent, RESEARCH_DEGRADED, RESEARCH_SKIPPED};
pub use tutoring::{InterviewTutorAgent, TUTORING_SKIPPED};

/// Stage names, used as `intermediate_steps` keys and in events.
pub mod stages {
    /// Company identification.
    pub const IDENTIFICATION: &str = "identification";
    /// Open-source research.
    pub const RESEARCH: &str = "research";
    /// Request parsing.
    pub const PARSING: &str = "parsing";
    /// Attractiveness profiling.
    pub const PROFILING: &str = "profiling";
    /// Interview tutoring.
    pub const TUTORING: &str = "tutoring";
    /// Report finalization.
    pub const FINALIZATION: &str = "finalization";
}

/// Context keys written by the orchestrator and the agents.
pub mod keys {
    /// Raw request text.
    pub const INITIAL_REQUEST: &str = "initial_request";
    /// Business-domain classification string.
    pub const BUSINESS_DOMAIN: &str = "business_domain";
    /// Identification stage result.
    pub const IDENTIFICATION_OUTPUT: &str = "customer_identifier_output";
    /// Research stage result.
    pub const RESEARCH_OUTPUT: &str = "osint_researcher_output";
    /// Parsing stage result.
    pub const PARSING_OUTPUT: &str = "request_parser_output";
    /// Profiling stage result.
    pub const PROFILING_OUTPUT: &str = "attractiveness_profiler_output";
    /// Tutoring stage result.
    pub const TUTORING_OUTPUT: &str = "tutor_output";
}

/// Metadata keys agents set on their results.
pub mod meta {
    /// Bool: stage short-circuited with a skip marker.
    pub const SKIPPED: &str = "skipped";
    /// Bool: a customer company was identified.
    pub const IDENTIFIED: &str = "identified";
    /// String: the identified company name.
    pub const COMPANY: &str = "company";
    /// Bool: the stage produced a degraded output.
    pub const DEGRADED: &str = "degraded";
    /// Bool: structured extraction succeeded.
    pub const PARSED: &str = "parsed";
    /// String: extracted role.
    pub const ROLE: &str = "role";
    /// Array of strings: extracted technology stack.
    pub const STACK: &str = "stack";
    /// String: extracted project duration.
    pub const DURATION: &str = "duration";
    /// String: extracted intermediary company.
    pub const INTERMEDIARY: &str = "intermediary";
}

/// The output of one stage execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    /// The stage's textual output.
    pub output: String,
    /// Optional structured fields extracted alongside the text.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl AgentResult {
    /// Creates a result with no metadata.
    #[must_use]
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            metadata: HashMap::new(),
        }
    }

    /// Creates a skip-marked result. The reason becomes the output text so it
    /// survives into `intermediate_steps`.
    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::new(reason).with_metadata(meta::SKIPPED, serde_json::json!(true))
    }

    /// Adds one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns true for skip-marked results.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.meta_bool(meta::SKIPPED).unwrap_or(false)
    }

    /// Reads a boolean metadata entry.
    #[must_use]
    pub fn meta_bool(&self, key: &str) -> Option<bool> {
        self.metadata.get(key).and_then(serde_json::Value::as_bool)
    }

    /// Reads a string metadata entry.
    #[must_use]
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(serde_json::Value::as_str)
    }
}

/// Trait implemented by every pipeline stage.
#[async_trait]
pub trait Agent: Send + Sync + Debug {
    /// The stage name.
    fn name(&self) -> &str;

    /// Executes the stage against the accreted context.
    ///
    /// Missing optional keys are treated as absent data; only errors with no
    /// reasonable fallback are returned.
    async fn execute(&self, ctx: &StageContext) -> Result<AgentResult, PipelineError>;
}

/// Whether the identification stage confirmed a customer company.
///
/// Downstream stages key their skip decision off this signal. An absent
/// identification result counts as not identified.
#[must_use]
pub fn customer_identified(ctx: &StageContext) -> bool {
    ctx.result(keys::IDENTIFICATION_OUTPUT)
        .map(|result| result.meta_bool(meta::IDENTIFIED).unwrap_or(false))
        .unwrap_or(false)
}

/// The identified company name, falling back to the identification output
/// text when no structured name was extracted.
#[must_use]
pub fn identified_company(ctx: &StageContext) -> Option<String> {
    let result = ctx.result(keys::IDENTIFICATION_OUTPUT)?;
    match result.meta_str(meta::COMPANY) {
        Some(name) => Some(name.to_string()),
        None => Some(result.output.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_skip_marker() {
        let result = AgentResult::skipped("Stage skipped: no customer identified.");
        assert!(result.is_skipped());
        assert_eq!(result.output, "Stage skipped: no customer identified.");

        let result = AgentResult::new("normal output");
        assert!(!result.is_skipped());
    }

    #[test]
    fn test_metadata_accessors() {
        let result = AgentResult::new("ok")
            .with_metadata(meta::IDENTIFIED, serde_json::json!(true))
            .with_metadata(meta::COMPANY, serde_json::json!("Acme Corp"));

        assert_eq!(result.meta_bool(meta::IDENTIFIED), Some(true));
        assert_eq!(result.meta_str(meta::COMPANY), Some("Acme Corp"));
        assert_eq!(result.meta_bool("missing"), None);
    }

    #[test]
    fn test_customer_identified_signal() {
        let mut ctx = StageContext::new();
        assert!(!customer_identified(&ctx));

        let identified = AgentResult::new("Customer identified: Acme Corp")
            .with_metadata(meta::IDENTIFIED, serde_json::json!(true))
            .with_metadata(meta::COMPANY, serde_json::json!("Acme Corp"));
        ctx.insert_result(keys::IDENTIFICATION_OUTPUT, identified)
            .expect("insert");

        assert!(customer_identified(&ctx));
        assert_eq!(identified_company(&ctx), Some("Acme Corp".to_string()));
    }

    #[test]
    fn test_identified_company_falls_back_to_output() {
        let mut ctx = StageContext::new();
        ctx.insert_result(
            keys::IDENTIFICATION_OUTPUT,
            AgentResult::new("Possibly Acme Corp, unverified")
                .with_metadata(meta::IDENTIFIED, serde_json::json!(true)),
        )
        .expect("insert");

        assert_eq!(
            identified_company(&ctx),
            Some("Possibly Acme Corp, unverified".to_string())
        );
    }
}
