//! Durable-queue client with a worker pool.
//!
//! Jobs are handed to a pool of workers over one shared channel. Every job
//! carries its own delivery-retry budget with exponential backoff, and every
//! job owns a watch channel that resolves on success *and* failure, which is
//! what the blocking submission path awaits.

use crate::config::DeliveryConfig;
use crate::errors::PipelineError;
use crate::run::RunKey;
use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, warn};

/// One unit of queued work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineJob {
    /// Queue-level identity.
    pub job_id: String,
    /// Caller-supplied identity.
    pub request_id: String,
    /// The raw request text.
    pub request: String,
    /// Business domain threaded through the stages.
    pub business_domain: String,
}

/// Executes one job. Implemented by the orchestrator.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    /// Processes the job, returning its textual return value.
    ///
    /// # Errors
    ///
    /// Errors trigger the queue's own delivery-retry policy.
    async fn process(&self, job: &PipelineJob) -> Result<String, PipelineError>;
}

/// Observable state of a queued job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Enqueued, no worker has picked it up.
    Waiting,
    /// A worker is executing the given delivery attempt.
    Active {
        /// 1-indexed delivery attempt.
        attempt: usize,
    },
    /// The processor returned successfully.
    Completed {
        /// The processor's return value.
        return_value: String,
    },
    /// Every delivery attempt failed.
    Failed {
        /// The last failure reason.
        reason: String,
    },
}

impl JobState {
    /// Returns true for terminal states.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

/// Exponential backoff between delivery attempts, with full jitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Base delay in milliseconds.
    pub base_delay_ms: u64,
    /// Cap on the computed delay in milliseconds.
    pub max_delay_ms: u64,
    /// Whether to draw the actual delay uniformly from `0..=delay`.
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    /// Delay before the attempt following `attempt` (1-indexed).
    #[must_use]
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let raw = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(exponent));
        let capped = raw.min(self.max_delay_ms);
        let millis = if self.jitter && capped > 0 {
            rand::thread_rng().gen_range(0..=capped)
        } else {
            capped
        };
        Duration::from_millis(millis)
    }
}

/// Options for one enqueue call.
#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    /// Total delivery attempts, including the first.
    pub attempts: usize,
    /// Backoff between attempts.
    pub backoff: BackoffPolicy,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            attempts: 2,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl From<&DeliveryConfig> for EnqueueOptions {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            attempts: config.attempts,
            backoff: BackoffPolicy {
                base_delay_ms: config.base_delay_ms,
                max_delay_ms: config.max_delay_ms,
                jitter: true,
            },
        }
    }
}

struct QueuedJob {
    job: PipelineJob,
    options: EnqueueOptions,
}

/// In-process durable-queue client.
pub struct PipelineQueue {
    jobs: DashMap<String, watch::Sender<JobState>>,
    tx: mpsc::UnboundedSender<QueuedJob>,
}

impl PipelineQueue {
    /// Starts the queue with a pool of workers pulling from one channel.
    ///
    /// With zero workers, jobs enqueue but never execute; useful in tests
    /// that need a deliberately idle queue.
    #[must_use]
    pub fn start(processor: Arc<dyn JobProcessor>, workers: usize) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Arc::new(Self {
            jobs: DashMap::new(),
            tx,
        });

        let rx = Arc::new(Mutex::new(rx));
        for worker in 0..workers {
            let queue = Arc::clone(&queue);
            let processor = Arc::clone(&processor);
            let rx = Arc::clone(&rx);
            tokio::spawn(async move {
                loop {
                    let queued = { rx.lock().await.recv().await };
                    let Some(queued) = queued else {
                        debug!(worker, "queue channel closed, worker exiting");
                        break;
                    };
                    queue.deliver(&*processor, queued).await;
                }
            });
        }

        queue
    }

    /// Enqueues a job for background delivery. Never blocks on execution.
    ///
    /// # Errors
    ///
    /// Returns `QueueClosed` when the worker channel is gone.
    pub fn enqueue(&self, job: PipelineJob, options: EnqueueOptions) -> Result<(), PipelineError> {
        let (state_tx, _state_rx) = watch::channel(JobState::Waiting);
        self.jobs.insert(job.job_id.clone(), state_tx);
        self.tx
            .send(QueuedJob { job, options })
            .map_err(|_| PipelineError::QueueClosed)
    }

    /// Out-of-band job state lookup.
    #[must_use]
    pub fn state(&self, job_id: &str) -> Option<JobState> {
        self.jobs.get(job_id).map(|entry| entry.borrow().clone())
    }

    /// Blocks until the job reaches a terminal state, and returns it.
    ///
    /// Resolves on failure as well as success; callers must not be left
    /// waiting when the job errors out.
    ///
    /// # Errors
    ///
    /// Returns `RunNotFound` for unknown job ids and `QueueClosed` when the
    /// state channel is dropped mid-wait.
    pub async fn wait_for_finished(&self, job_id: &str) -> Result<JobState, PipelineError> {
        let mut rx = self
            .jobs
            .get(job_id)
            .map(|entry| entry.subscribe())
            .ok_or_else(|| PipelineError::RunNotFound(RunKey::job_id(job_id)))?;

        loop {
            let state = rx.borrow_and_update().clone();
            if state.is_finished() {
                return Ok(state);
            }
            if rx.changed().await.is_err() {
                return Err(PipelineError::QueueClosed);
            }
        }
    }

    async fn deliver(&self, processor: &dyn JobProcessor, queued: QueuedJob) {
        let QueuedJob { job, options } = queued;
        let attempts = options.attempts.max(1);

        for attempt in 1..=attempts {
            self.set_state(&job.job_id, JobState::Active { attempt });
            match processor.process(&job).await {
                Ok(return_value) => {
                    debug!(job_id = %job.job_id, attempt, "job completed");
                    self.set_state(&job.job_id, JobState::Completed { return_value });
                    return;
                }
                Err(err) => {
                    warn!(job_id = %job.job_id, attempt, error = %err, "job delivery failed");
                    if attempt < attempts {
                        tokio::time::sleep(options.backoff.delay_for(attempt)).await;
                    } else {
                        self.set_state(
                            &job.job_id,
                            JobState::Failed {
                                reason: err.to_string(),
                            },
                        );
                    }
                }
            }
        }
    }

    fn set_state(&self, job_id: &str, state: JobState) {
        if let Some(entry) = self.jobs.get(job_id) {
            // Receivers may all be gone; state stays readable via borrow().
            let _ = entry.send_replace(state);
        }
    }
}
