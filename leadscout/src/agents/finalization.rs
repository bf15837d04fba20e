//! Report-finalization stage.

use super::{keys, prompts, stages, Agent, AgentResult};
use crate::context::StageContext;
use crate::errors::PipelineError;
use crate::providers::TextGenerator;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Synthesizes every upstream output into the single final report.
///
/// Always runs, even when upstream stages were skipped: the report then
/// records that no customer was identified. Exempt from validation since it
/// only recombines already-validated text.
pub struct ReportFinalizerAgent {
    generator: Arc<dyn TextGenerator>,
    business_domain_fallback: String,
    excluded_company: String,
}

impl ReportFinalizerAgent {
    /// Creates the agent.
    #[must_use]
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        business_domain_fallback: impl Into<String>,
        excluded_company: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            business_domain_fallback: business_domain_fallback.into(),
            excluded_company: excluded_company.into(),
        }
    }
}

impl fmt::Debug for ReportFinalizerAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportFinalizerAgent")
            .field("excluded_company", &self.excluded_company)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Agent for ReportFinalizerAgent {
    fn name(&self) -> &str {
        stages::FINALIZATION
    }

    async fn execute(&self, ctx: &StageContext) -> Result<AgentResult, PipelineError> {
        let business_domain = ctx
            .text(keys::BUSINESS_DOMAIN)
            .unwrap_or(self.business_domain_fallback.as_str());

        let prompt = format!(
            "{}\n\n<INPUTS>\n\n### Original request:\n{}\n\n### Identified customer:\n{}\n\n### Parsed request:\n{}\n\n### Research summary:\n{}\n\n### Attractiveness assessment:\n{}\n\n### Interview preparation plan:\n{}\n\n</INPUTS>",
            prompts::finalization(business_domain, &self.excluded_company),
            ctx.text(keys::INITIAL_REQUEST).unwrap_or_default(),
            ctx.text(keys::IDENTIFICATION_OUTPUT).unwrap_or_default(),
            ctx.text(keys::PARSING_OUTPUT).unwrap_or_default(),
            ctx.text(keys::RESEARCH_OUTPUT).unwrap_or_default(),
            ctx.text(keys::PROFILING_OUTPUT).unwrap_or_default(),
            ctx.text(keys::TUTORING_OUTPUT).unwrap_or_default(),
        );

        let output = self.generator.generate(&prompt).await?;
        Ok(AgentResult::new(output))
    }
}
