//! Interview-tutoring stage with its own search fan-out.

use super::{keys, meta, prompts, stages, Agent, AgentResult};
use crate::context::StageContext;
use crate::errors::PipelineError;
use crate::providers::{SearchOutcome, SearchProvider, TextGenerator};
use async_trait::async_trait;
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;

/// Skip marker when no customer was identified upstream.
pub const TUTORING_SKIPPED: &str = "Interview preparation skipped: no customer identified.";

/// Placeholder section when search produced nothing usable.
const NO_EXAMPLES: &str = "No current question examples available.";

/// Prepares the interview question package.
///
/// Runs a secondary search fan-out keyed on the role and stack extracted by
/// the parsing stage, falling back to the business domain. Quota or transport
/// trouble degrades the examples section; the package is still generated.
pub struct InterviewTutorAgent {
    generator: Arc<dyn TextGenerator>,
    search: Arc<dyn SearchProvider>,
}

impl InterviewTutorAgent {
    /// Creates the agent.
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>, search: Arc<dyn SearchProvider>) -> Self {
        Self { generator, search }
    }

    /// Role/stack search focus from parsing metadata, with domain fallback.
    fn search_focus(ctx: &StageContext) -> String {
        let parsed = ctx.result(keys::PARSING_OUTPUT);
        let mut parts = Vec::new();
        if let Some(result) = parsed {
            if let Some(role) = result.meta_str(meta::ROLE) {
                parts.push(role.to_string());
            }
            if let Some(stack) = result
                .metadata
                .get(meta::STACK)
                .and_then(serde_json::Value::as_array)
            {
                parts.extend(
                    stack
                        .iter()
                        .filter_map(serde_json::Value::as_str)
                        .map(String::from),
                );
            }
        }
        if parts.is_empty() {
            ctx.text(keys::BUSINESS_DOMAIN).unwrap_or_default().to_string()
        } else {
            parts.join(" ")
        }
    }
}

impl fmt::Debug for InterviewTutorAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterviewTutorAgent").finish_non_exhaustive()
    }
}

fn collect_examples(outcomes: Vec<Result<SearchOutcome, PipelineError>>) -> String {
    let mut sections = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(SearchOutcome::Hits(snippets)) => sections.push(snippets),
            Ok(SearchOutcome::NoResults | SearchOutcome::QuotaExceeded) => {}
            Err(err) => {
                tracing::warn!(error = %err, "tutoring search failed, degrading");
            }
        }
    }
    if sections.is_empty() {
        NO_EXAMPLES.to_string()
    } else {
        sections.join("\n\n---\n\n")
    }
}

#[async_trait]
impl Agent for InterviewTutorAgent {
    fn name(&self) -> &str {
        stages::TUTORING
    }

    async fn execute(&self, ctx: &StageContext) -> Result<AgentResult, PipelineError> {
        if !super::customer_identified(ctx) {
            return Ok(AgentResult::skipped(TUTORING_SKIPPED));
        }

        let focus = Self::search_focus(ctx);
        tracing::debug!(focus = %focus, "searching for interview question examples");

        let queries = vec![
            format!("{focus} technical interview questions"),
            format!("{focus} behavioral interview questions"),
        ];
        let searches = queries.iter().map(|query| self.search.search(query));
        let examples = collect_examples(join_all(searches).await);

        let vacancy_info = format!(
            "- Original request: {}\n- Parsed request: {}\n- Company research: {}\n- Attractiveness analysis: {}",
            ctx.text(keys::INITIAL_REQUEST).unwrap_or_default(),
            ctx.text(keys::PARSING_OUTPUT).unwrap_or_default(),
            ctx.text(keys::RESEARCH_OUTPUT).unwrap_or_default(),
            ctx.text(keys::PROFILING_OUTPUT).unwrap_or_default(),
        );

        let prompt = prompts::tutoring(&vacancy_info, &examples);
        let output = self.generator.generate(&prompt).await?;
        Ok(AgentResult::new(output))
    }
}
