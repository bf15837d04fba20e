//! Pipeline lifecycle events.
//!
//! Orchestration emits structured events through an [`EventSink`] so callers
//! can observe runs without the core depending on any metrics layer.

use serde::Serialize;
use tracing::{info, warn};

/// A structured event describing pipeline progress.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A job started executing.
    RunStarted {
        /// Queue job id.
        job_id: String,
        /// Caller-supplied request id.
        request_id: String,
    },
    /// A stage began executing.
    StageStarted {
        /// Queue job id.
        job_id: String,
        /// Stage name.
        stage: String,
    },
    /// A stage produced its accepted result.
    StageCompleted {
        /// Queue job id.
        job_id: String,
        /// Stage name.
        stage: String,
        /// Whether the stage short-circuited with a skip marker.
        skipped: bool,
    },
    /// The validation gate rejected a stage attempt.
    ValidationFailed {
        /// Stage name.
        stage: String,
        /// 1-indexed attempt number.
        attempt: usize,
        /// The gate's critique.
        critique: String,
    },
    /// The run reached `Completed`.
    RunCompleted {
        /// Queue job id.
        job_id: String,
    },
    /// The run reached `Failed`.
    RunFailed {
        /// Queue job id.
        job_id: String,
        /// Failure description.
        reason: String,
    },
}

/// Receiver for pipeline events. Implementations must never fail.
pub trait EventSink: Send + Sync {
    /// Records one event.
    fn emit(&self, event: &PipelineEvent);
}

/// Discards all events. The default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _event: &PipelineEvent) {}
}

/// Logs events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventSink;

impl EventSink for LoggingEventSink {
    fn emit(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::RunStarted { job_id, request_id } => {
                info!(job_id = %job_id, request_id = %request_id, "run started");
            }
            PipelineEvent::StageStarted { job_id, stage } => {
                info!(job_id = %job_id, stage = %stage, "stage started");
            }
            PipelineEvent::StageCompleted { job_id, stage, skipped } => {
                info!(job_id = %job_id, stage = %stage, skipped = *skipped, "stage completed");
            }
            PipelineEvent::ValidationFailed { stage, attempt, critique } => {
                warn!(stage = %stage, attempt = *attempt, critique = %critique, "validation failed");
            }
            PipelineEvent::RunCompleted { job_id } => {
                info!(job_id = %job_id, "run completed");
            }
            PipelineEvent::RunFailed { job_id, reason } => {
                warn!(job_id = %job_id, reason = %reason, "run failed");
            }
        }
    }
}

/// Collects events for test assertions.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<PipelineEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().clone()
    }

    /// Number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Returns the stage names of all `StageCompleted` events, in order.
    #[must_use]
    pub fn completed_stages(&self) -> Vec<String> {
        self.events
            .read()
            .iter()
            .filter_map(|event| match event {
                PipelineEvent::StageCompleted { stage, .. } => Some(stage.clone()),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event: &PipelineEvent) {
        self.events.write().push(event.clone());
    }
}
