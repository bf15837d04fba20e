//! Company-identification stage.

use super::{keys, meta, prompts, stages, Agent, AgentResult};
use crate::context::StageContext;
use crate::errors::PipelineError;
use crate::providers::TextGenerator;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Identifies the customer company named in a staffing request.
///
/// The prompt requires a leading status line, which this agent turns into the
/// `identified`/`company` metadata the rest of the pipeline keys off.
pub struct CompanyIdentificationAgent {
    generator: Arc<dyn TextGenerator>,
    excluded_company: String,
}

impl CompanyIdentificationAgent {
    /// Creates the agent.
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>, excluded_company: impl Into<String>) -> Self {
        Self {
            generator,
            excluded_company: excluded_company.into(),
        }
    }
}

impl fmt::Debug for CompanyIdentificationAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompanyIdentificationAgent")
            .field("excluded_company", &self.excluded_company)
            .finish_non_exhaustive()
    }
}

/// Pulls the company name out of the status line, if present.
fn extract_company(output: &str) -> Option<String> {
    let start = output.find(prompts::IDENTIFIED_MARKER)?;
    let rest = &output[start + prompts::IDENTIFIED_MARKER.len()..];
    let name = rest.lines().next().unwrap_or("").trim().trim_end_matches('.');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[async_trait]
impl Agent for CompanyIdentificationAgent {
    fn name(&self) -> &str {
        stages::IDENTIFICATION
    }

    async fn execute(&self, ctx: &StageContext) -> Result<AgentResult, PipelineError> {
        let request = ctx.require_text(self.name(), keys::INITIAL_REQUEST)?;
        let prompt = format!(
            "{}\n\nText to analyze:\n{}",
            prompts::identification(&self.excluded_company),
            request
        );

        let output = self.generator.generate(&prompt).await?;

        // A sloppy response without the negative marker still flows downstream;
        // only an explicit "not identified" cascades into skipped stages.
        let identified = !output.contains(prompts::NOT_IDENTIFIED_MARKER);
        let mut result =
            AgentResult::new(output).with_metadata(meta::IDENTIFIED, serde_json::json!(identified));
        if identified {
            if let Some(company) = extract_company(&result.output) {
                result = result.with_metadata(meta::COMPANY, serde_json::json!(company));
            }
        }
        Ok(result)
    }
}
