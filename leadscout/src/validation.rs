//! LLM-backed quality gate for stage outputs.

use crate::extract::extract_json;
use crate::providers::TextGenerator;
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

/// Verdict returned by the gate for one stage attempt.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ValidationVerdict {
    /// Whether the text met the criteria.
    pub is_valid: bool,
    /// What to fix when invalid.
    #[serde(default)]
    pub critique: String,
}

impl ValidationVerdict {
    /// A passing verdict.
    #[must_use]
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            critique: String::new(),
        }
    }

    /// A failing verdict with a critique.
    #[must_use]
    pub fn invalid(critique: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            critique: critique.into(),
        }
    }
}

fn verdict_prompt(text: &str, criteria: &str) -> String {
    format!(
        r#"Context: You are a quality controller. Assess the text below, produced by
another agent, against the quality criteria.

<TEXT TO REVIEW>
{text}
</TEXT TO REVIEW>

<QUALITY CRITERIA>
{criteria}
</QUALITY CRITERIA>

<TASK>
Return your verdict STRICTLY as JSON:
- "is_valid": true when the text fully meets the criteria, false otherwise.
- "critique": a short note on what to fix when is_valid is false.

<RESPONSE FORMAT (JSON ONLY)>
{{"is_valid": boolean, "critique": "string"}}"#
    )
}

/// Scores stage output against stage-specific acceptance criteria.
///
/// Never fails: an unreachable generator or an unparsable verdict both come
/// back as an invalid verdict, so the retry loop always terminates.
pub struct ValidationGate {
    generator: Arc<dyn TextGenerator>,
}

impl ValidationGate {
    /// Creates a gate over the given generator.
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Validates one piece of stage output.
    pub async fn validate(&self, text: &str, criteria: &str) -> ValidationVerdict {
        let prompt = verdict_prompt(text, criteria);
        let response = match self.generator.generate(&prompt).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "validator generation failed");
                return ValidationVerdict::invalid(format!("Validator unavailable: {err}"));
            }
        };

        match extract_json::<ValidationVerdict>(&response) {
            Ok(verdict) => verdict,
            Err(_) => {
                warn!(raw = %response, "failed to parse validator response");
                ValidationVerdict::invalid("Failed to parse validator response.")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingGenerator, ScriptedGenerator};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_valid_verdict() {
        let generator = Arc::new(
            ScriptedGenerator::new().with_response(r#"{"is_valid": true, "critique": ""}"#),
        );
        let gate = ValidationGate::new(generator);

        let verdict = gate.validate("a detailed report", "must be detailed").await;
        assert!(verdict.is_valid);
    }

    #[tokio::test]
    async fn test_fenced_invalid_verdict() {
        let generator = Arc::new(ScriptedGenerator::new().with_response(
            "```json\n{\"is_valid\": false, \"critique\": \"too generic\"}\n```",
        ));
        let gate = ValidationGate::new(generator);

        let verdict = gate.validate("meh", "must be detailed").await;
        assert!(!verdict.is_valid);
        assert_eq!(verdict.critique, "too generic");
    }

    #[tokio::test]
    async fn test_unparsable_verdict_is_invalid() {
        let generator =
            Arc::new(ScriptedGenerator::new().with_response("Looks good to me overall!"));
        let gate = ValidationGate::new(generator);

        let verdict = gate.validate("text", "criteria").await;
        assert!(!verdict.is_valid);
        assert_eq!(verdict.critique, "Failed to parse validator response.");
    }

    #[tokio::test]
    async fn test_generator_failure_is_invalid() {
        let generator = Arc::new(FailingGenerator::new("transport down"));
        let gate = ValidationGate::new(generator);

        let verdict = gate.validate("text", "criteria").await;
        assert!(!verdict.is_valid);
        assert!(verdict.critique.contains("Validator unavailable"));
    }

    #[tokio::test]
    async fn test_prompt_embeds_text_and_criteria() {
        let generator = Arc::new(
            ScriptedGenerator::new().with_response(r#"{"is_valid": true}"#),
        );
        let gate = ValidationGate::new(Arc::clone(&generator) as _);

        gate.validate("candidate text", "the criteria").await;

        let prompt = &generator.prompts()[0];
        assert!(prompt.contains("candidate text"));
        assert!(prompt.contains("the criteria"));
    }
}
