//! Durable run records.
//!
//! A [`PipelineRun`] is the single persisted document per pipeline execution,
//! addressable by the caller-supplied request id and the generated job id.

use crate::errors::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle state of a pipeline run.
///
/// The only legal transitions are `Processing -> Completed` and
/// `Processing -> Failed`, each at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// The run has been accepted and is executing (or waiting for a worker).
    Processing,
    /// All stages finished and the final report was persisted.
    Completed,
    /// The run failed with an unrecoverable error.
    Failed,
}

impl RunStatus {
    /// Returns true for terminal states.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Lookup key for a run: either identity index works.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunKey {
    /// The caller-supplied request identifier.
    RequestId(String),
    /// The queue-generated job identifier.
    JobId(String),
}

impl RunKey {
    /// Creates a request-id key.
    pub fn request_id(id: impl Into<String>) -> Self {
        Self::RequestId(id.into())
    }

    /// Creates a job-id key.
    pub fn job_id(id: impl Into<String>) -> Self {
        Self::JobId(id.into())
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestId(id) => write!(f, "request '{id}'"),
            Self::JobId(id) => write!(f, "job '{id}'"),
        }
    }
}

/// One durable record per pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Caller-supplied identity used for idempotent deduplication.
    pub request_id: String,
    /// Generated identity used for queue-level tracking.
    pub job_id: String,
    /// Lifecycle state.
    pub status: RunStatus,
    /// The original request text.
    pub request: String,
    /// Business-domain classification threaded through all stages.
    pub business_domain: String,
    /// Stage name to output text, populated atomically on completion.
    #[serde(default)]
    pub intermediate_steps: BTreeMap<String, String>,
    /// Terminal report text, set only on `Completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_report: Option<String>,
    /// Failure description, set only on `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Flips to true on the first retrieval of a finished run.
    #[serde(default)]
    pub cached: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl PipelineRun {
    /// Creates a new run in the `Processing` state.
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        job_id: impl Into<String>,
        request: impl Into<String>,
        business_domain: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            request_id: request_id.into(),
            job_id: job_id.into(),
            status: RunStatus::Processing,
            request: request.into(),
            business_domain: business_domain.into(),
            intermediate_steps: BTreeMap::new(),
            final_report: None,
            error_message: None,
            cached: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true once the run reached a terminal state.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Transitions the run to `Completed`, recording the final report and the
    /// full intermediate-step map in one mutation.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the run is still `Processing`.
    pub fn complete(
        &mut self,
        final_report: impl Into<String>,
        intermediate_steps: BTreeMap<String, String>,
    ) -> Result<(), PipelineError> {
        self.transition(RunStatus::Completed)?;
        self.final_report = Some(final_report.into());
        self.intermediate_steps = intermediate_steps;
        Ok(())
    }

    /// Transitions the run to `Failed`, recording the error message.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the run is still `Processing`.
    pub fn fail(&mut self, error_message: impl Into<String>) -> Result<(), PipelineError> {
        self.transition(RunStatus::Failed)?;
        self.error_message = Some(error_message.into());
        Ok(())
    }

    fn transition(&mut self, to: RunStatus) -> Result<(), PipelineError> {
        if self.status != RunStatus::Processing {
            return Err(PipelineError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}
