//! Validated stage execution with bounded retries.

use crate::agents::{Agent, AgentResult};
use crate::context::StageContext;
use crate::errors::PipelineError;
use crate::events::{EventSink, NoOpEventSink, PipelineEvent};
use crate::validation::ValidationGate;
use std::sync::Arc;
use tracing::{debug, warn};

/// Bounded retry policy for validated stage execution.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum stage executions, including the first (default: 2).
    pub max_attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 2 }
    }
}

impl RetryPolicy {
    /// Creates a policy with the default bound.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the attempt bound.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Wraps stage execution with the validation gate and a bounded retry loop.
///
/// Best-effort by design: when the gate never passes, the last obtained
/// result is returned rather than stalling the run. Only a stage that errors
/// on every attempt escalates.
pub struct ValidatedExecutor {
    gate: ValidationGate,
    policy: RetryPolicy,
    events: Arc<dyn EventSink>,
}

impl ValidatedExecutor {
    /// Creates an executor.
    #[must_use]
    pub fn new(gate: ValidationGate, policy: RetryPolicy) -> Self {
        Self {
            gate,
            policy,
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Executes a stage until its output validates or attempts run out.
    ///
    /// Skip-marked results bypass the gate: validating a fixed skip marker
    /// would spend generator calls on a deterministic outcome.
    ///
    /// # Errors
    ///
    /// Returns the last stage error only when every attempt failed to produce
    /// a result at all.
    pub async fn run(
        &self,
        agent: &dyn Agent,
        ctx: &StageContext,
        criteria: &str,
    ) -> Result<AgentResult, PipelineError> {
        let stage = agent.name();
        let mut last_result: Option<AgentResult> = None;
        let mut last_error: Option<PipelineError> = None;

        for attempt in 1..=self.policy.max_attempts {
            debug!(stage, attempt, "executing stage");
            match agent.execute(ctx).await {
                Ok(result) => {
                    if result.is_skipped() {
                        return Ok(result);
                    }
                    let verdict = self.gate.validate(&result.output, criteria).await;
                    if verdict.is_valid {
                        debug!(stage, attempt, "validation passed");
                        return Ok(result);
                    }
                    warn!(stage, attempt, critique = %verdict.critique, "validation failed");
                    self.events.emit(&PipelineEvent::ValidationFailed {
                        stage: stage.to_string(),
                        attempt,
                        critique: verdict.critique,
                    });
                    last_result = Some(result);
                }
                Err(err) => {
                    warn!(stage, attempt, error = %err, "stage execution failed");
                    last_error = Some(err);
                }
            }
        }

        match last_result {
            Some(result) => {
                warn!(
                    stage,
                    attempts = self.policy.max_attempts,
                    "validation never passed, proceeding with the last result"
                );
                Ok(result)
            }
            None => Err(last_error.unwrap_or_else(|| {
                PipelineError::stage(stage, "no attempts were made")
            })),
        }
    }
}
