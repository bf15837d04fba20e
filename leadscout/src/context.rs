//! Stage context accretion.
//!
//! A [`StageContext`] is the growing input set passed stage to stage. It is
//! append-only: every stage adds its own output under a new key and sees every
//! key produced before it. Rewriting an existing key is a conflict error.

use crate::agents::AgentResult;
use crate::errors::PipelineError;
use std::collections::HashMap;

/// A value stored in the stage context.
///
/// Known stage results keep their full shape; everything else is plain text.
#[derive(Debug, Clone)]
pub enum ContextValue {
    /// A pass-through text field (e.g. the raw request).
    Text(String),
    /// The result of an upstream stage.
    Result(AgentResult),
}

impl ContextValue {
    /// The textual content of the value, whichever variant it is.
    #[must_use]
    pub fn as_text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Result(result) => &result.output,
        }
    }
}

/// Append-only mapping from key to [`ContextValue`].
#[derive(Debug, Clone, Default)]
pub struct StageContext {
    values: HashMap<String, ContextValue>,
}

impl StageContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a text value under a new key.
    ///
    /// # Errors
    ///
    /// Returns `ContextConflict` if the key is already present.
    pub fn insert_text(
        &mut self,
        key: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<(), PipelineError> {
        self.insert(key.into(), ContextValue::Text(text.into()))
    }

    /// Adds a stage result under a new key.
    ///
    /// # Errors
    ///
    /// Returns `ContextConflict` if the key is already present.
    pub fn insert_result(
        &mut self,
        key: impl Into<String>,
        result: AgentResult,
    ) -> Result<(), PipelineError> {
        self.insert(key.into(), ContextValue::Result(result))
    }

    fn insert(&mut self, key: String, value: ContextValue) -> Result<(), PipelineError> {
        if self.values.contains_key(&key) {
            return Err(PipelineError::ContextConflict(key));
        }
        self.values.insert(key, value);
        Ok(())
    }

    /// Reads the textual content under a key, whichever variant holds it.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(ContextValue::as_text)
    }

    /// Reads an upstream stage result.
    #[must_use]
    pub fn result(&self, key: &str) -> Option<&AgentResult> {
        match self.values.get(key) {
            Some(ContextValue::Result(result)) => Some(result),
            _ => None,
        }
    }

    /// Reads a required text value, failing with a typed error naming the
    /// stage that performed the read.
    ///
    /// # Errors
    ///
    /// Returns `MissingContextKey` if the key is absent.
    pub fn require_text(&self, stage: &str, key: &str) -> Result<&str, PipelineError> {
        self.text(key).ok_or_else(|| PipelineError::MissingContextKey {
            stage: stage.to_string(),
            key: key.to_string(),
        })
    }

    /// Checks whether a key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns all keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no entries are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_append_only() {
        let mut ctx = StageContext::new();
        ctx.insert_text("initial_request", "hire QA").expect("insert");

        let err = ctx.insert_text("initial_request", "other");
        assert!(matches!(err, Err(PipelineError::ContextConflict(_))));
        assert_eq!(ctx.text("initial_request"), Some("hire QA"));
    }

    #[test]
    fn test_result_access() {
        let mut ctx = StageContext::new();
        let result = AgentResult::new("Customer identified: Acme Corp")
            .with_metadata("identified", serde_json::json!(true));
        ctx.insert_result("customer_identifier_output", result)
            .expect("insert");

        assert_eq!(
            ctx.text("customer_identifier_output"),
            Some("Customer identified: Acme Corp")
        );
        let stored = ctx.result("customer_identifier_output").expect("result");
        assert_eq!(stored.meta_bool("identified"), Some(true));
    }

    #[test]
    fn test_result_accessor_rejects_text_values() {
        let mut ctx = StageContext::new();
        ctx.insert_text("business_domain", "QA/AQA").expect("insert");
        assert!(ctx.result("business_domain").is_none());
    }

    #[test]
    fn test_require_text_names_stage_and_key() {
        let ctx = StageContext::new();
        let err = ctx.require_text("parsing", "initial_request");
        match err {
            Err(PipelineError::MissingContextKey { stage, key }) => {
                assert_eq!(stage, "parsing");
                assert_eq!(key, "initial_request");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_keys_and_len() {
        let mut ctx = StageContext::new();
        assert!(ctx.is_empty());
        ctx.insert_text("a", "1").expect("insert");
        ctx.insert_text("b", "2").expect("insert");
        assert_eq!(ctx.len(), 2);
        assert!(ctx.contains_key("a"));
        assert!(!ctx.contains_key("c"));
    }
}
