//! Error types for the leadscout pipeline.

use crate::run::{RunKey, RunStatus};
use thiserror::Error;

/// The main error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The text-generation collaborator failed.
    #[error("Text generation failed: {0}")]
    Generation(String),

    /// A stage read a required context key that was never written.
    #[error("Stage '{stage}' requires context key '{key}'")]
    MissingContextKey {
        /// The stage that performed the read.
        stage: String,
        /// The missing key.
        key: String,
    },

    /// A context key was written twice. The stage context is append-only.
    #[error("Context key '{0}' is already set")]
    ContextConflict(String),

    /// A run with the same request or job identity already exists.
    #[error("A run for request '{0}' already exists")]
    DuplicateRun(String),

    /// No run matches the given key. Distinct from "still processing".
    #[error("No run found for {0}")]
    RunNotFound(RunKey),

    /// A run status transition that the lifecycle does not allow.
    #[error("Invalid run status transition: {from} -> {to}")]
    InvalidTransition {
        /// The current status.
        from: RunStatus,
        /// The rejected target status.
        to: RunStatus,
    },

    /// The job queue has shut down and accepts no further work.
    #[error("Queue is closed")]
    QueueClosed,

    /// A stage failed with no recoverable fallback.
    #[error("Stage '{stage}' failed: {message}")]
    Stage {
        /// The failing stage name.
        stage: String,
        /// What went wrong.
        message: String,
    },
}

impl PipelineError {
    /// Creates a stage failure error.
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: message.into(),
        }
    }
}
