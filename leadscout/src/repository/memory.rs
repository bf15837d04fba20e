//! In-memory run repository.

use super::RunRepository;
use crate::errors::PipelineError;
use crate::run::{PipelineRun, RunKey};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Reference repository backed by a process-local map.
///
/// All mutation happens under one lock, which gives the same atomicity the
/// document store's native find-and-update primitive would.
#[derive(Debug, Default)]
pub struct InMemoryRunRepository {
    inner: RwLock<Store>,
}

#[derive(Debug, Default)]
struct Store {
    /// Primary storage keyed by request id.
    by_request: HashMap<String, PipelineRun>,
    /// Secondary unique index: job id to request id.
    job_index: HashMap<String, String>,
}

impl Store {
    fn resolve(&self, key: &RunKey) -> Option<&str> {
        match key {
            RunKey::RequestId(id) => self
                .by_request
                .get_key_value(id)
                .map(|(request_id, _)| request_id.as_str()),
            RunKey::JobId(id) => self.job_index.get(id).map(String::as_str),
        }
    }
}

impl InMemoryRunRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().by_request.len()
    }

    /// Returns true when no runs are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().by_request.is_empty()
    }
}

#[async_trait]
impl RunRepository for InMemoryRunRepository {
    async fn create(&self, run: PipelineRun) -> Result<(), PipelineError> {
        let mut store = self.inner.write();
        if store.by_request.contains_key(&run.request_id)
            || store.job_index.contains_key(&run.job_id)
        {
            return Err(PipelineError::DuplicateRun(run.request_id));
        }
        store
            .job_index
            .insert(run.job_id.clone(), run.request_id.clone());
        store.by_request.insert(run.request_id.clone(), run);
        Ok(())
    }

    async fn find(&self, key: &RunKey) -> Option<PipelineRun> {
        let store = self.inner.read();
        let request_id = store.resolve(key)?;
        store.by_request.get(request_id).cloned()
    }

    async fn save(&self, run: &PipelineRun) -> Result<(), PipelineError> {
        let mut store = self.inner.write();
        let Some(stored) = store.by_request.get_mut(&run.request_id) else {
            return Err(PipelineError::RunNotFound(RunKey::request_id(
                run.request_id.clone(),
            )));
        };
        *stored = run.clone();
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_delivered(&self, key: &RunKey) -> Option<PipelineRun> {
        let mut store = self.inner.write();
        let request_id = store.resolve(key)?.to_string();
        let stored = store.by_request.get_mut(&request_id)?;
        if !stored.is_finished() || stored.cached {
            return None;
        }
        let before = stored.clone();
        stored.cached = true;
        stored.updated_at = Utc::now();
        Some(before)
    }
}
