//! Request-parsing stage with typed extraction fallback.

use super::{keys, meta, prompts, stages, Agent, AgentResult};
use crate::context::StageContext;
use crate::errors::PipelineError;
use crate::extract::extract_json;
use crate::providers::TextGenerator;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Skip marker when no customer was identified upstream.
pub const PARSING_SKIPPED: &str = "Parsing skipped: no customer identified.";

/// Fallback output when the extraction payload cannot be parsed.
pub const PARSING_UNPARSED: &str = "Request could not be parsed into structured fields.";

/// Structured fields extracted from a staffing request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParsedRequest {
    /// The intermediary company named in the request header.
    #[serde(default)]
    pub intermediary: Option<String>,
    /// The requested role.
    #[serde(default)]
    pub role: Option<String>,
    /// The requested technology stack.
    #[serde(default)]
    pub stack: Vec<String>,
    /// The expected project duration.
    #[serde(default)]
    pub duration: Option<String>,
}

impl ParsedRequest {
    /// Renders the fields as the human-readable four-line block downstream
    /// prompts embed.
    #[must_use]
    pub fn summary(&self) -> String {
        let absent = "(not stated)";
        format!(
            "Intermediary company: {}\nRole: {}\nTechnology stack: {}\nProject duration: {}",
            self.intermediary.as_deref().unwrap_or(absent),
            self.role.as_deref().unwrap_or(absent),
            if self.stack.is_empty() {
                absent.to_string()
            } else {
                self.stack.join(", ")
            },
            self.duration.as_deref().unwrap_or(absent),
        )
    }
}

/// Extracts intermediary, role, stack and duration from the raw request.
///
/// Malformed generator output falls back to an explicit unparsed marker; the
/// stage never raises over a bad payload.
pub struct RequestParsingAgent {
    generator: Arc<dyn TextGenerator>,
}

impl RequestParsingAgent {
    /// Creates the agent.
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

impl fmt::Debug for RequestParsingAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestParsingAgent").finish_non_exhaustive()
    }
}

#[async_trait]
impl Agent for RequestParsingAgent {
    fn name(&self) -> &str {
        stages::PARSING
    }

    async fn execute(&self, ctx: &StageContext) -> Result<AgentResult, PipelineError> {
        if !super::customer_identified(ctx) {
            return Ok(AgentResult::skipped(PARSING_SKIPPED));
        }

        let request = ctx.require_text(self.name(), keys::INITIAL_REQUEST)?;
        let prompt = format!("{}\n\nText to analyze:\n{}", prompts::parsing(), request);
        let response = self.generator.generate(&prompt).await?;

        match extract_json::<ParsedRequest>(&response) {
            Ok(parsed) => {
                let mut result = AgentResult::new(parsed.summary())
                    .with_metadata(meta::PARSED, serde_json::json!(true));
                if let Some(role) = &parsed.role {
                    result = result.with_metadata(meta::ROLE, serde_json::json!(role));
                }
                if !parsed.stack.is_empty() {
                    result = result.with_metadata(meta::STACK, serde_json::json!(parsed.stack));
                }
                if let Some(duration) = &parsed.duration {
                    result = result.with_metadata(meta::DURATION, serde_json::json!(duration));
                }
                if let Some(intermediary) = &parsed.intermediary {
                    result = result
                        .with_metadata(meta::INTERMEDIARY, serde_json::json!(intermediary));
                }
                Ok(result)
            }
            Err(err) => {
                tracing::warn!(error = %err, "parsing payload malformed, using unparsed fallback");
                Ok(AgentResult::new(format!("{PARSING_UNPARSED}\n\n{response}"))
                    .with_metadata(meta::PARSED, serde_json::json!(false)))
            }
        }
    }
}
