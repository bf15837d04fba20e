//! # Leadscout
//!
//! A validated staffing-research pipeline orchestrator.
//!
//! One incoming research request is driven through a fixed sequence of six
//! analysis stages — company identification, open-source research, request
//! parsing, attractiveness profiling, interview tutoring and report
//! finalization — with:
//!
//! - **Context accretion**: each stage's output joins a growing context the
//!   later stages read.
//! - **Quality gating**: every stage output is scored by an LLM-backed
//!   validation gate with bounded, best-effort retries.
//! - **Durable, idempotent runs**: one record per caller-supplied request id;
//!   duplicate submissions return the existing run.
//! - **Two completion contracts**: fire-and-forget submission with polling,
//!   and a blocking submission released by the job's completion channel.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use leadscout::prelude::*;
//! use std::sync::Arc;
//!
//! let config = PipelineConfig::new().with_business_domain("QA/AQA");
//! let repository = Arc::new(InMemoryRunRepository::new());
//! let orchestrator = Arc::new(PipelineOrchestrator::new(
//!     generator, search, Arc::clone(&repository) as _, &config,
//! ));
//! let queue = PipelineQueue::start(orchestrator, config.workers);
//! let service = PipelineService::new(repository, queue, config);
//!
//! let run = service.submit_sync("req-1", request_text, None).await?;
//! println!("{}", run.final_report.unwrap_or_default());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod agents;
pub mod config;
pub mod context;
pub mod errors;
pub mod events;
pub mod executor;
pub mod extract;
pub mod orchestrator;
pub mod providers;
pub mod queue;
pub mod repository;
pub mod run;
pub mod service;
pub mod testing;
pub mod validation;

#[cfg(test)]
mod integration_tests;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::agents::{Agent, AgentResult};
    pub use crate::config::{DeliveryConfig, PipelineConfig, SearchConfig, ValidationConfig};
    pub use crate::context::{ContextValue, StageContext};
    pub use crate::errors::PipelineError;
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent,
    };
    pub use crate::executor::{RetryPolicy, ValidatedExecutor};
    pub use crate::orchestrator::PipelineOrchestrator;
    pub use crate::providers::{SearchOutcome, SearchProvider, TextGenerator};
    pub use crate::queue::{
        BackoffPolicy, EnqueueOptions, JobProcessor, JobState, PipelineJob, PipelineQueue,
    };
    pub use crate::repository::{InMemoryRunRepository, RunRepository};
    pub use crate::run::{PipelineRun, RunKey, RunStatus};
    pub use crate::service::{PipelineService, Submission};
    pub use crate::validation::{ValidationGate, ValidationVerdict};
}
