//! Durable run storage contract.
//!
//! The document-store capability the pipeline needs is narrow: create with
//! unique indexes, find-one-by-field, save-by-identity, and one atomic
//! find-and-update used by the first-delivery `cached` flip.

use crate::errors::PipelineError;
use crate::run::{PipelineRun, RunKey};
use async_trait::async_trait;

mod memory;

pub use memory::InMemoryRunRepository;

/// Storage backend for [`PipelineRun`] records.
///
/// `request_id` and `job_id` are both unique indexes.
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Inserts a new run.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateRun` when either identity already exists.
    async fn create(&self, run: PipelineRun) -> Result<(), PipelineError>;

    /// Finds one run by either identity.
    async fn find(&self, key: &RunKey) -> Option<PipelineRun>;

    /// Replaces the stored run with the given state, keyed by `request_id`.
    ///
    /// # Errors
    ///
    /// Returns `RunNotFound` when no run with that identity exists.
    async fn save(&self, run: &PipelineRun) -> Result<(), PipelineError>;

    /// Atomic "find where finished and not cached, set cached".
    ///
    /// Returns the record as it was *before* the flip when the update
    /// matched, so the caller observes `cached = false` exactly once per run.
    /// Returns `None` when the run is missing, unfinished, or already cached.
    async fn mark_delivered(&self, key: &RunKey) -> Option<PipelineRun>;
}
