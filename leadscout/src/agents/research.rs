//! Open-source research stage with concurrent search fan-out.

use super::{identified_company, keys, meta, prompts, stages, Agent, AgentResult};
use crate::context::StageContext;
use crate::errors::PipelineError;
use crate::providers::{SearchOutcome, SearchProvider, TextGenerator};
use async_trait::async_trait;
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;

/// Fixed degraded output when the search quota is exhausted.
pub const RESEARCH_DEGRADED: &str = "Research skipped: search quota exhausted.";

/// Skip marker when no customer was identified upstream.
pub const RESEARCH_SKIPPED: &str = "Research skipped: no customer identified.";

/// Researches the identified customer company from open sources.
///
/// Fans several queries out concurrently, joins every result, then
/// synthesizes a profile. Any quota signal among the concurrent calls
/// short-circuits the stage to [`RESEARCH_DEGRADED`] instead of failing.
pub struct OsintResearchAgent {
    generator: Arc<dyn TextGenerator>,
    search: Arc<dyn SearchProvider>,
    excluded_company: String,
}

impl OsintResearchAgent {
    /// Creates the agent.
    #[must_use]
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        search: Arc<dyn SearchProvider>,
        excluded_company: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            search,
            excluded_company: excluded_company.into(),
        }
    }

    fn queries(company: &str, business_domain: &str) -> Vec<String> {
        vec![
            format!("\"{company}\" company profile {business_domain}"),
            format!("\"{company}\" news funding hiring"),
            format!("\"{company}\" reviews reputation"),
        ]
    }
}

impl fmt::Debug for OsintResearchAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OsintResearchAgent")
            .field("excluded_company", &self.excluded_company)
            .finish_non_exhaustive()
    }
}

/// Joins per-query outcomes into an evidence section, or reports quota.
fn collect_evidence(
    queries: &[String],
    outcomes: Vec<Result<SearchOutcome, PipelineError>>,
) -> Result<String, ()> {
    let mut evidence = Vec::with_capacity(outcomes.len());
    for (query, outcome) in queries.iter().zip(outcomes) {
        match outcome {
            Ok(SearchOutcome::QuotaExceeded) => return Err(()),
            Ok(SearchOutcome::Hits(snippets)) => evidence.push(snippets),
            Ok(SearchOutcome::NoResults) => {
                evidence.push(format!("No results for \"{query}\"."));
            }
            Err(err) => {
                tracing::warn!(query = %query, error = %err, "search call failed, degrading");
                evidence.push(format!("Search unavailable for \"{query}\"."));
            }
        }
    }
    Ok(evidence.join("\n\n---\n\n"))
}

#[async_trait]
impl Agent for OsintResearchAgent {
    fn name(&self) -> &str {
        stages::RESEARCH
    }

    async fn execute(&self, ctx: &StageContext) -> Result<AgentResult, PipelineError> {
        if !super::customer_identified(ctx) {
            return Ok(AgentResult::skipped(RESEARCH_SKIPPED));
        }

        let company = identified_company(ctx).unwrap_or_default();
        let business_domain = ctx.text(keys::BUSINESS_DOMAIN).unwrap_or_default();

        let queries = Self::queries(&company, business_domain);
        let searches = queries.iter().map(|query| self.search.search(query));
        let outcomes = join_all(searches).await;

        let Ok(evidence) = collect_evidence(&queries, outcomes) else {
            return Ok(AgentResult::new(RESEARCH_DEGRADED)
                .with_metadata(meta::DEGRADED, serde_json::json!(true)));
        };

        let prompt = format!(
            "{}\n\nCustomer company:\n{}\n\nSearch evidence:\n{}",
            prompts::research(business_domain, &self.excluded_company),
            company,
            evidence
        );
        let output = self.generator.generate(&prompt).await?;
        Ok(AgentResult::new(output))
    }
}
