//! Queue-backed submission and retrieval entrypoints.

use crate::config::PipelineConfig;
use crate::errors::PipelineError;
use crate::queue::{EnqueueOptions, PipelineJob, PipelineQueue};
use crate::repository::RunRepository;
use crate::run::{PipelineRun, RunKey};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Outcome of a submission call.
#[derive(Debug, Clone)]
pub enum Submission {
    /// A new job was enqueued.
    Accepted {
        /// The caller-supplied request id.
        request_id: String,
        /// The generated job id to poll with.
        job_id: String,
    },
    /// A run with this request id already exists; returned as-is.
    Existing(PipelineRun),
}

/// Client-facing surface over the repository and the queue.
///
/// Submission is idempotent on `request_id`: the run record is created
/// *before* the job is enqueued, so a racing duplicate observes it and no
/// second job is ever queued.
pub struct PipelineService {
    repository: Arc<dyn RunRepository>,
    queue: Arc<PipelineQueue>,
    config: PipelineConfig,
}

impl PipelineService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        repository: Arc<dyn RunRepository>,
        queue: Arc<PipelineQueue>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            repository,
            queue,
            config,
        }
    }

    /// Enqueues a run and returns immediately.
    ///
    /// Duplicate request ids return the existing run unchanged; business
    /// dedup never touches the `cached` flag.
    ///
    /// # Errors
    ///
    /// Returns `QueueClosed` when no workers can accept the job.
    pub async fn submit_async(
        &self,
        request_id: impl Into<String>,
        request: impl Into<String>,
        business_domain: Option<String>,
    ) -> Result<Submission, PipelineError> {
        let request_id = request_id.into();
        let key = RunKey::request_id(request_id.clone());
        if let Some(existing) = self.repository.find(&key).await {
            info!(request_id = %request_id, "duplicate submission, returning existing run");
            return Ok(Submission::Existing(existing));
        }

        let job_id = Uuid::new_v4().to_string();
        let business_domain =
            business_domain.unwrap_or_else(|| self.config.business_domain.clone());
        let run = PipelineRun::new(
            request_id.clone(),
            job_id.clone(),
            request.into(),
            business_domain.clone(),
        );

        match self.repository.create(run.clone()).await {
            Ok(()) => {}
            Err(PipelineError::DuplicateRun(_)) => {
                // Lost the race to a concurrent submission with the same id.
                let existing = self
                    .repository
                    .find(&key)
                    .await
                    .ok_or(PipelineError::RunNotFound(key))?;
                return Ok(Submission::Existing(existing));
            }
            Err(err) => return Err(err),
        }

        let job = PipelineJob {
            job_id: job_id.clone(),
            request_id: request_id.clone(),
            request: run.request,
            business_domain,
        };
        self.queue
            .enqueue(job, EnqueueOptions::from(&self.config.delivery))?;
        info!(request_id = %request_id, job_id = %job_id, "job enqueued");

        Ok(Submission::Accepted { request_id, job_id })
    }

    /// Enqueues a run and blocks until the job finishes, successfully or not,
    /// then returns the finalized run.
    ///
    /// # Errors
    ///
    /// Propagates submission errors; the finished run is returned even when
    /// its status is `Failed`.
    pub async fn submit_sync(
        &self,
        request_id: impl Into<String>,
        request: impl Into<String>,
        business_domain: Option<String>,
    ) -> Result<PipelineRun, PipelineError> {
        match self
            .submit_async(request_id, request, business_domain)
            .await?
        {
            Submission::Existing(run) => Ok(run),
            Submission::Accepted { request_id, job_id } => {
                // Released by the job's completion channel on success and
                // failure alike; never polls the repository.
                let _state = self.queue.wait_for_finished(&job_id).await?;
                let key = RunKey::request_id(request_id);
                self.repository
                    .find(&key)
                    .await
                    .ok_or(PipelineError::RunNotFound(key))
            }
        }
    }

    /// Looks up a run by request or job id.
    ///
    /// The first read of a finished run atomically flips its `cached` flag;
    /// the caller observes the pre-flip record.
    ///
    /// # Errors
    ///
    /// Returns `RunNotFound` for unknown keys.
    pub async fn get_status(&self, key: &RunKey) -> Result<PipelineRun, PipelineError> {
        self.fetch_marking_delivery(key).await
    }

    /// Same contract as [`Self::get_status`]; reads the persisted result.
    ///
    /// # Errors
    ///
    /// Returns `RunNotFound` for unknown keys.
    pub async fn get_result(&self, key: &RunKey) -> Result<PipelineRun, PipelineError> {
        self.fetch_marking_delivery(key).await
    }

    async fn fetch_marking_delivery(&self, key: &RunKey) -> Result<PipelineRun, PipelineError> {
        if let Some(first_delivery) = self.repository.mark_delivered(key).await {
            return Ok(first_delivery);
        }
        self.repository
            .find(key)
            .await
            .ok_or_else(|| PipelineError::RunNotFound(key.clone()))
    }
}
