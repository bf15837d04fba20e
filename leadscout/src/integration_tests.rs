//! End-to-end scenario tests over the full service/queue/orchestrator stack.

use crate::agents::{stages, RESEARCH_DEGRADED, RESEARCH_SKIPPED};
use crate::config::{DeliveryConfig, PipelineConfig};
use crate::events::CollectingEventSink;
use crate::orchestrator::PipelineOrchestrator;
use crate::queue::PipelineQueue;
use crate::repository::{InMemoryRunRepository, RunRepository};
use crate::run::{RunKey, RunStatus};
use crate::service::PipelineService;
use crate::testing::{valid_verdict, ScriptedGenerator, StaticSearch};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const REQUEST: &str = "Need two SQA engineers for Acme Corp, Python stack, 3 months";

struct Stack {
    service: PipelineService,
    repository: Arc<InMemoryRunRepository>,
    generator: Arc<ScriptedGenerator>,
    search: Arc<StaticSearch>,
    events: Arc<CollectingEventSink>,
}

fn build_stack(generator: ScriptedGenerator, search: StaticSearch) -> Stack {
    let config = PipelineConfig::new()
        .with_business_domain("QA/AQA")
        .with_delivery(DeliveryConfig::default().with_attempts(1).with_base_delay_ms(1));
    let repository = Arc::new(InMemoryRunRepository::new());
    let generator = Arc::new(generator);
    let search = Arc::new(search);
    let events = Arc::new(CollectingEventSink::new());

    let orchestrator = Arc::new(
        PipelineOrchestrator::new(
            Arc::clone(&generator) as _,
            Arc::clone(&search) as _,
            Arc::clone(&repository) as _,
            &config,
        )
        .with_events(Arc::clone(&events) as _),
    );
    let queue = PipelineQueue::start(orchestrator, 2);
    let service = PipelineService::new(Arc::clone(&repository) as _, queue, config);

    Stack {
        service,
        repository,
        generator,
        search,
        events,
    }
}

fn happy_generator() -> ScriptedGenerator {
    ScriptedGenerator::new()
        .with_pattern("TEXT TO REVIEW", valid_verdict())
        .with_response("Customer identified: Acme Corp\nAcme Corp matches the profile.")
        .with_response("Acme Corp research summary")
        .with_response(r#"{"role": "SQA", "stack": ["Python"], "duration": "3 months"}"#)
        .with_response("vacancy analysis")
        .with_response("question package")
        .with_response("the final report")
}

/// The prompt a given stage received, located by a template marker.
fn prompt_containing(prompts: &[String], marker: &str) -> String {
    prompts
        .iter()
        .find(|prompt| prompt.contains(marker))
        .unwrap_or_else(|| panic!("no prompt contains marker: {marker}"))
        .clone()
}

#[tokio::test]
async fn happy_path_completes_with_five_intermediate_steps() {
    let stack = build_stack(
        happy_generator(),
        StaticSearch::hits("Source: acme.example\nContent: Acme builds anvils"),
    );

    let run = stack
        .service
        .submit_sync("r1", REQUEST, None)
        .await
        .expect("submit");

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.final_report.as_deref(), Some("the final report"));
    assert_eq!(run.intermediate_steps.len(), 5);
    for stage in [
        stages::IDENTIFICATION,
        stages::RESEARCH,
        stages::PARSING,
        stages::PROFILING,
        stages::TUTORING,
    ] {
        assert!(
            run.intermediate_steps.contains_key(stage),
            "missing step: {stage}"
        );
    }
    // The finalization output is the report itself, not an intermediate step.
    assert!(!run.intermediate_steps.contains_key(stages::FINALIZATION));

    // Three concurrent research searches plus the tutoring fan-out.
    let queries = stack.search.queries();
    assert_eq!(queries.iter().filter(|q| q.contains("Acme Corp")).count(), 3);
    assert_eq!(
        queries.iter().filter(|q| q.contains("interview questions")).count(),
        2
    );
}

#[tokio::test]
async fn happy_path_accretes_context_across_stages() {
    let stack = build_stack(
        happy_generator(),
        StaticSearch::hits("Source: acme.example\nContent: Acme builds anvils"),
    );

    stack
        .service
        .submit_sync("r1", REQUEST, None)
        .await
        .expect("submit");

    let prompts = stack.generator.prompts();

    // Later stages see every earlier stage's output.
    let profiling_prompt = prompt_containing(&prompts, "six blocks");
    assert!(profiling_prompt.contains("Customer identified: Acme Corp"));
    assert!(profiling_prompt.contains("Acme Corp research summary"));
    assert!(profiling_prompt.contains("Role: SQA"));
    assert!(profiling_prompt.contains(REQUEST));

    let tutoring_prompt = prompt_containing(&prompts, "preparing a candidate");
    assert!(tutoring_prompt.contains("vacancy analysis"));
    assert!(tutoring_prompt.contains("Acme Corp research summary"));

    let finalization_prompt = prompt_containing(&prompts, "lead analyst");
    for fragment in [
        REQUEST,
        "Customer identified: Acme Corp",
        "Acme Corp research summary",
        "Role: SQA",
        "vacancy analysis",
        "question package",
    ] {
        assert!(
            finalization_prompt.contains(fragment),
            "finalization prompt misses: {fragment}"
        );
    }

    // Stage events arrive in pipeline order.
    assert_eq!(
        stack.events.completed_stages(),
        vec![
            stages::IDENTIFICATION,
            stages::RESEARCH,
            stages::PARSING,
            stages::PROFILING,
            stages::TUTORING,
            stages::FINALIZATION,
        ]
    );
}

#[tokio::test]
async fn quota_exhaustion_degrades_research_but_run_completes() {
    let generator = ScriptedGenerator::new()
        .with_pattern("TEXT TO REVIEW", valid_verdict())
        .with_response("Customer identified: Acme Corp")
        // No research synthesis: the stage short-circuits before generating.
        .with_response(r#"{"role": "SQA", "stack": ["Python"], "duration": "3 months"}"#)
        .with_response("vacancy analysis")
        .with_response("question package")
        .with_response("the final report");
    let stack = build_stack(generator, StaticSearch::quota_exceeded());

    let run = stack
        .service
        .submit_sync("r1", REQUEST, None)
        .await
        .expect("submit");

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(
        run.intermediate_steps.get(stages::RESEARCH).map(String::as_str),
        Some(RESEARCH_DEGRADED)
    );
    assert!(run.final_report.is_some());
}

#[tokio::test]
async fn unidentified_customer_skips_stages_but_run_completes() {
    let generator = ScriptedGenerator::new()
        .with_pattern("TEXT TO REVIEW", valid_verdict())
        .with_response("Customer not identified")
        .with_response("Final report: no client could be identified.");
    let stack = build_stack(generator, StaticSearch::no_results());

    let run = stack
        .service
        .submit_sync("r1", "Vague request naming nobody", None)
        .await
        .expect("submit");

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(
        run.intermediate_steps.get(stages::RESEARCH).map(String::as_str),
        Some(RESEARCH_SKIPPED)
    );
    for stage in [stages::PARSING, stages::PROFILING, stages::TUTORING] {
        let step = run
            .intermediate_steps
            .get(stage)
            .unwrap_or_else(|| panic!("missing step: {stage}"));
        assert!(step.contains("skipped"), "step not skip-marked: {step}");
    }
    assert_eq!(
        run.final_report.as_deref(),
        Some("Final report: no client could be identified.")
    );
    // Skipped stages never touched the search provider.
    assert_eq!(stack.search.call_count(), 0);
}

#[tokio::test]
async fn failed_validation_everywhere_still_completes_with_last_results() {
    let generator = ScriptedGenerator::new()
        .with_pattern("TEXT TO REVIEW", r#"{"is_valid": false, "critique": "not good enough"}"#)
        // Two attempts per gated stage.
        .with_response("Customer identified: Acme Corp")
        .with_response("Customer identified: Acme Corp (second attempt)")
        .with_response("research summary")
        .with_response("research summary (second attempt)")
        .with_response(r#"{"role": "SQA", "stack": [], "duration": null}"#)
        .with_response(r#"{"role": "SQA", "stack": ["Python"], "duration": null}"#)
        .with_response("analysis")
        .with_response("analysis (second attempt)")
        .with_response("questions")
        .with_response("questions (second attempt)")
        .with_response("the final report");
    let stack = build_stack(
        generator,
        StaticSearch::hits("Source: acme.example\nContent: facts"),
    );

    let run = stack
        .service
        .submit_sync("r1", REQUEST, None)
        .await
        .expect("submit");

    // Best-effort policy: the run completes on the last attempts' outputs.
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(
        run.intermediate_steps
            .get(stages::IDENTIFICATION)
            .map(String::as_str),
        Some("Customer identified: Acme Corp (second attempt)")
    );
    assert_eq!(
        run.intermediate_steps.get(stages::TUTORING).map(String::as_str),
        Some("questions (second attempt)")
    );
}

#[tokio::test]
async fn generator_outage_fails_run_and_records_message() {
    let generator = ScriptedGenerator::new(); // every call errors
    let stack = build_stack(generator, StaticSearch::no_results());

    let run = stack
        .service
        .submit_sync("r1", REQUEST, None)
        .await
        .expect("submit");

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run
        .error_message
        .as_deref()
        .is_some_and(|message| message.contains("generator script exhausted")));
    assert!(run.final_report.is_none());

    let stored = stack
        .repository
        .find(&RunKey::request_id("r1"))
        .await
        .expect("find");
    assert_eq!(stored.status, RunStatus::Failed);
}

#[tokio::test]
async fn resubmission_after_completion_reuses_the_run() {
    let stack = build_stack(
        happy_generator(),
        StaticSearch::hits("Source: acme.example\nContent: facts"),
    );

    let first = stack
        .service
        .submit_sync("r1", REQUEST, None)
        .await
        .expect("submit");
    let calls_after_first = stack.generator.call_count();

    let second = stack
        .service
        .submit_sync("r1", REQUEST, None)
        .await
        .expect("submit");

    assert_eq!(first.job_id, second.job_id);
    // No stage or validation work happened for the duplicate.
    assert_eq!(stack.generator.call_count(), calls_after_first);
}
