//! Attractiveness-profiling stage.

use super::{keys, prompts, stages, Agent, AgentResult};
use crate::context::StageContext;
use crate::errors::PipelineError;
use crate::providers::TextGenerator;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Skip marker when no customer was identified upstream.
pub const PROFILING_SKIPPED: &str = "Profiling skipped: no customer identified.";

/// Builds the candidate-facing vacancy analysis from the outputs of the
/// identification, research and parsing stages.
pub struct AttractivenessProfilerAgent {
    generator: Arc<dyn TextGenerator>,
}

impl AttractivenessProfilerAgent {
    /// Creates the agent.
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

impl fmt::Debug for AttractivenessProfilerAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttractivenessProfilerAgent").finish_non_exhaustive()
    }
}

#[async_trait]
impl Agent for AttractivenessProfilerAgent {
    fn name(&self) -> &str {
        stages::PROFILING
    }

    async fn execute(&self, ctx: &StageContext) -> Result<AgentResult, PipelineError> {
        if !super::customer_identified(ctx) {
            return Ok(AgentResult::skipped(PROFILING_SKIPPED));
        }

        let request = ctx.require_text(self.name(), keys::INITIAL_REQUEST)?;
        let business_domain = ctx.text(keys::BUSINESS_DOMAIN).unwrap_or_default();
        let identification = ctx.text(keys::IDENTIFICATION_OUTPUT).unwrap_or_default();
        let parsing = ctx.text(keys::PARSING_OUTPUT).unwrap_or_default();
        let research = ctx.text(keys::RESEARCH_OUTPUT).unwrap_or_default();

        let prompt = format!(
            "{}\n\n<INPUTS>\n\n### Original request:\n{}\n\n### Identified customer:\n{}\n\n### Parsed request:\n{}\n\n### Research summary:\n{}\n\n</INPUTS>",
            prompts::profiling(business_domain),
            request,
            identification,
            parsing,
            research
        );

        let output = self.generator.generate(&prompt).await?;
        Ok(AgentResult::new(output))
    }
}
