//! The pipeline driver.
//!
//! One orchestrator instance serves every job: agents are stateless, and all
//! per-job state lives in the [`StageContext`] and the run record. The stage
//! order is fixed; each stage after identification keys its skip decision off
//! the accreted context.

use crate::agents::{
    keys, stages, Agent, AgentResult, AttractivenessProfilerAgent, CompanyIdentificationAgent,
    InterviewTutorAgent, OsintResearchAgent, ReportFinalizerAgent, RequestParsingAgent,
};
use crate::agents::prompts::criteria;
use crate::config::PipelineConfig;
use crate::context::StageContext;
use crate::errors::PipelineError;
use crate::events::{EventSink, NoOpEventSink, PipelineEvent};
use crate::executor::{RetryPolicy, ValidatedExecutor};
use crate::providers::{SearchProvider, TextGenerator};
use crate::queue::{JobProcessor, PipelineJob};
use crate::repository::RunRepository;
use crate::run::{PipelineRun, RunKey, RunStatus};
use crate::validation::ValidationGate;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

/// Drives the six-stage pipeline for one job at a time.
pub struct PipelineOrchestrator {
    identification: CompanyIdentificationAgent,
    research: OsintResearchAgent,
    parsing: RequestParsingAgent,
    profiling: AttractivenessProfilerAgent,
    tutoring: InterviewTutorAgent,
    finalization: ReportFinalizerAgent,
    executor: ValidatedExecutor,
    repository: Arc<dyn RunRepository>,
    events: Arc<dyn EventSink>,
}

impl PipelineOrchestrator {
    /// Builds the orchestrator and its agents from explicit collaborators.
    #[must_use]
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        search: Arc<dyn SearchProvider>,
        repository: Arc<dyn RunRepository>,
        config: &PipelineConfig,
    ) -> Self {
        let excluded = config.excluded_company.clone();
        Self {
            identification: CompanyIdentificationAgent::new(
                Arc::clone(&generator),
                excluded.clone(),
            ),
            research: OsintResearchAgent::new(
                Arc::clone(&generator),
                Arc::clone(&search),
                excluded.clone(),
            ),
            parsing: RequestParsingAgent::new(Arc::clone(&generator)),
            profiling: AttractivenessProfilerAgent::new(Arc::clone(&generator)),
            tutoring: InterviewTutorAgent::new(Arc::clone(&generator), search),
            finalization: ReportFinalizerAgent::new(
                Arc::clone(&generator),
                config.business_domain.clone(),
                excluded,
            ),
            executor: ValidatedExecutor::new(
                ValidationGate::new(generator),
                RetryPolicy::new().with_max_attempts(config.validation.max_attempts),
            ),
            repository,
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the event sink for orchestration and validation events.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.executor = self.executor.with_events(Arc::clone(&events));
        self.events = events;
        self
    }

    /// Runs one job to its terminal state and returns the final report.
    ///
    /// # Errors
    ///
    /// Re-raises unrecoverable stage errors after marking the run `Failed`,
    /// so the queue's delivery-retry policy can decide on a re-attempt.
    pub async fn run_job(&self, job: &PipelineJob) -> Result<String, PipelineError> {
        info!(job_id = %job.job_id, request_id = %job.request_id, "starting pipeline");
        let mut run = self.ensure_run(job).await?;

        // A redelivered job observes the terminal record and short-circuits;
        // delivery retries exist to cover crashes before the terminal write,
        // and a run's status transitions exactly once.
        if run.is_finished() {
            return match run.status {
                RunStatus::Completed => Ok(run.final_report.unwrap_or_default()),
                _ => Err(PipelineError::stage(
                    "pipeline",
                    run.error_message
                        .unwrap_or_else(|| "run already failed".to_string()),
                )),
            };
        }

        self.events.emit(&PipelineEvent::RunStarted {
            job_id: job.job_id.clone(),
            request_id: job.request_id.clone(),
        });

        match self.execute_stages(job).await {
            Ok((final_report, intermediate_steps)) => {
                run.complete(final_report.clone(), intermediate_steps)?;
                self.repository.save(&run).await?;
                self.events.emit(&PipelineEvent::RunCompleted {
                    job_id: job.job_id.clone(),
                });
                info!(job_id = %job.job_id, "pipeline finished successfully");
                Ok(final_report)
            }
            Err(err) => {
                error!(job_id = %job.job_id, error = %err, "pipeline failed");
                run.fail(err.to_string())?;
                self.repository.save(&run).await?;
                self.events.emit(&PipelineEvent::RunFailed {
                    job_id: job.job_id.clone(),
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Finds the run created at submit time, or creates it for jobs handed
    /// straight to the processor.
    async fn ensure_run(&self, job: &PipelineJob) -> Result<PipelineRun, PipelineError> {
        if let Some(run) = self
            .repository
            .find(&RunKey::request_id(job.request_id.clone()))
            .await
        {
            return Ok(run);
        }
        let run = PipelineRun::new(
            job.request_id.clone(),
            job.job_id.clone(),
            job.request.clone(),
            job.business_domain.clone(),
        );
        self.repository.create(run.clone()).await?;
        Ok(run)
    }

    async fn validated(
        &self,
        job: &PipelineJob,
        agent: &dyn Agent,
        ctx: &StageContext,
        stage_criteria: &str,
    ) -> Result<AgentResult, PipelineError> {
        self.events.emit(&PipelineEvent::StageStarted {
            job_id: job.job_id.clone(),
            stage: agent.name().to_string(),
        });
        let result = self.executor.run(agent, ctx, stage_criteria).await?;
        self.events.emit(&PipelineEvent::StageCompleted {
            job_id: job.job_id.clone(),
            stage: agent.name().to_string(),
            skipped: result.is_skipped(),
        });
        Ok(result)
    }

    async fn execute_stages(
        &self,
        job: &PipelineJob,
    ) -> Result<(String, BTreeMap<String, String>), PipelineError> {
        let mut ctx = StageContext::new();
        ctx.insert_text(keys::INITIAL_REQUEST, job.request.clone())?;
        ctx.insert_text(keys::BUSINESS_DOMAIN, job.business_domain.clone())?;

        let identification = self
            .validated(job, &self.identification, &ctx, criteria::IDENTIFICATION)
            .await?;
        ctx.insert_result(keys::IDENTIFICATION_OUTPUT, identification.clone())?;

        let research = self
            .validated(job, &self.research, &ctx, criteria::RESEARCH)
            .await?;
        ctx.insert_result(keys::RESEARCH_OUTPUT, research.clone())?;

        let parsing = self
            .validated(job, &self.parsing, &ctx, criteria::PARSING)
            .await?;
        ctx.insert_result(keys::PARSING_OUTPUT, parsing.clone())?;

        let profiling = self
            .validated(job, &self.profiling, &ctx, criteria::PROFILING)
            .await?;
        ctx.insert_result(keys::PROFILING_OUTPUT, profiling.clone())?;

        let tutoring = self
            .validated(job, &self.tutoring, &ctx, criteria::TUTORING)
            .await?;
        ctx.insert_result(keys::TUTORING_OUTPUT, tutoring.clone())?;

        // Finalization only recombines already-validated text; no gate.
        self.events.emit(&PipelineEvent::StageStarted {
            job_id: job.job_id.clone(),
            stage: stages::FINALIZATION.to_string(),
        });
        let final_report = self.finalization.execute(&ctx).await?;
        self.events.emit(&PipelineEvent::StageCompleted {
            job_id: job.job_id.clone(),
            stage: stages::FINALIZATION.to_string(),
            skipped: false,
        });

        let mut intermediate_steps = BTreeMap::new();
        intermediate_steps.insert(stages::IDENTIFICATION.to_string(), identification.output);
        intermediate_steps.insert(stages::RESEARCH.to_string(), research.output);
        intermediate_steps.insert(stages::PARSING.to_string(), parsing.output);
        intermediate_steps.insert(stages::PROFILING.to_string(), profiling.output);
        intermediate_steps.insert(stages::TUTORING.to_string(), tutoring.output);

        Ok((final_report.output, intermediate_steps))
    }
}

impl fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOrchestrator").finish_non_exhaustive()
    }
}

#[async_trait]
impl JobProcessor for PipelineOrchestrator {
    async fn process(&self, job: &PipelineJob) -> Result<String, PipelineError> {
        self.run_job(job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRunRepository;
    use crate::run::RunStatus;
    use crate::testing::{valid_verdict, ScriptedGenerator, StaticSearch};
    use pretty_assertions::assert_eq;

    fn job() -> PipelineJob {
        PipelineJob {
            job_id: "j1".to_string(),
            request_id: "r1".to_string(),
            request: "Need two SQA engineers for Acme Corp, Python stack".to_string(),
            business_domain: "QA/AQA".to_string(),
        }
    }

    fn scripted_happy_generator() -> ScriptedGenerator {
        ScriptedGenerator::new()
            .with_pattern("TEXT TO REVIEW", valid_verdict())
            .with_response("Customer identified: Acme Corp\nAcme Corp matches the profile.")
            .with_response("Acme Corp research summary")
            .with_response(r#"{"role": "SQA", "stack": ["Python"], "duration": "3 months"}"#)
            .with_response("vacancy analysis")
            .with_response("question package")
            .with_response("the final report")
    }

    #[tokio::test]
    async fn test_happy_path_persists_completed_run() {
        let repository = Arc::new(InMemoryRunRepository::new());
        let orchestrator = PipelineOrchestrator::new(
            Arc::new(scripted_happy_generator()),
            Arc::new(StaticSearch::hits("Source: site\nContent: facts")),
            Arc::clone(&repository) as _,
            &PipelineConfig::default(),
        );

        let report = orchestrator.run_job(&job()).await.expect("run");
        assert_eq!(report, "the final report");

        let run = repository
            .find(&RunKey::request_id("r1"))
            .await
            .expect("find");
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.final_report.as_deref(), Some("the final report"));
        assert_eq!(run.intermediate_steps.len(), 5);
        assert_eq!(
            run.intermediate_steps.get(stages::RESEARCH).map(String::as_str),
            Some("Acme Corp research summary")
        );
        // Finalization output lives in final_report only.
        assert!(!run.intermediate_steps.contains_key(stages::FINALIZATION));
    }

    #[tokio::test]
    async fn test_failure_marks_run_failed_and_reraises() {
        let repository = Arc::new(InMemoryRunRepository::new());
        // Verdicts pass, but the third stage response is missing, so the
        // parsing stage errors out on every validation attempt.
        let generator = ScriptedGenerator::new()
            .with_pattern("TEXT TO REVIEW", valid_verdict())
            .with_response("Customer identified: Acme Corp")
            .with_response("research summary");
        let orchestrator = PipelineOrchestrator::new(
            Arc::new(generator),
            Arc::new(StaticSearch::hits("Source: site\nContent: facts")),
            Arc::clone(&repository) as _,
            &PipelineConfig::default(),
        );

        let err = orchestrator.run_job(&job()).await;
        assert!(matches!(err, Err(PipelineError::Generation(_))));

        let run = repository
            .find(&RunKey::job_id("j1"))
            .await
            .expect("find");
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run
            .error_message
            .as_deref()
            .is_some_and(|message| message.contains("generator script exhausted")));
        assert!(run.final_report.is_none());
    }

    #[tokio::test]
    async fn test_ensure_run_creates_record_for_direct_jobs() {
        let repository = Arc::new(InMemoryRunRepository::new());
        let orchestrator = PipelineOrchestrator::new(
            Arc::new(scripted_happy_generator()),
            Arc::new(StaticSearch::no_results()),
            Arc::clone(&repository) as _,
            &PipelineConfig::default(),
        );

        assert!(repository.is_empty());
        orchestrator.run_job(&job()).await.expect("run");
        assert_eq!(repository.len(), 1);
    }
}
