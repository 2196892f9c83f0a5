//! Tests for the chapter generation state machine.

mod test_utils;

use serialist_cache::{ContextCache, ContextCacheConfig};
use serialist_error::{ConfigErrorKind, PipelineErrorKind, SerialistError, SerialistErrorKind};
use serialist_pipeline::prompts::{
    CHARACTER_EXTRACTION_SYSTEM, DRAFT_SYSTEM, PLAN_SYSTEM, PLOT_EXTRACTION_SYSTEM,
    REVIEW_SYSTEM, REWRITE_SYSTEM, SUMMARY_SYSTEM, TIMELINE_EXTRACTION_SYSTEM,
};
use serialist_pipeline::{
    ChapterRequest, GenerationOrchestrator, Phase, PipelineConfig, ProjectState, SerialistConfig,
};
use serialist_quality::Severity;
use serialist_retry::RetryPolicy;
use std::sync::Arc;
use test_utils::{
    CHARACTER_RESPONSE, KEEP_REVIEW, PLOT_RESPONSE, Reply, SUMMARY_RESPONSE, ScriptedGenerator,
    TIMELINE_RESPONSE, fresh_state, good_chapter, short_chapter,
};

const REWRITE_REVIEW: &str =
    r#"{"action": "rewrite", "issues": ["Lin teleports into the archive"], "guidance": "Show her wading in"}"#;

const CRITICAL_VERDICT: &str = r#"{"score": 10, "issues": [{"type": "goal_missed", "severity": "critical", "description": "The ledger is never found"}]}"#;

/// Writer that answers every stage successfully.
fn writer() -> ScriptedGenerator {
    ScriptedGenerator::new("writer")
        .route(PLAN_SYSTEM, vec![Reply::text("1. The flood\n2. The ledger\n3. The torn page")])
        .route(DRAFT_SYSTEM, vec![Reply::text(good_chapter(1))])
        .route(REVIEW_SYSTEM, vec![Reply::text(KEEP_REVIEW)])
        .route(REWRITE_SYSTEM, vec![Reply::text(revised_chapter())])
        .route(CHARACTER_EXTRACTION_SYSTEM, vec![Reply::text(CHARACTER_RESPONSE)])
        .route(PLOT_EXTRACTION_SYSTEM, vec![Reply::text(PLOT_RESPONSE)])
        .route(TIMELINE_EXTRACTION_SYSTEM, vec![Reply::text(TIMELINE_RESPONSE)])
        .route(SUMMARY_SYSTEM, vec![Reply::text(SUMMARY_RESPONSE)])
}

fn revised_chapter() -> String {
    good_chapter(1).replace("Flooded Archive", "Drowned Archive")
}

fn cache() -> ContextCache {
    ContextCache::new(ContextCacheConfig::default())
}

fn request(state: &ProjectState) -> ChapterRequest {
    ChapterRequest::new("harbor-lights", 1, state.clone())
}

fn pipeline_kind(err: &SerialistError) -> &PipelineErrorKind {
    match err.kind() {
        SerialistErrorKind::Pipeline(e) => &e.kind,
        other => panic!("expected a pipeline error, got {}", other),
    }
}

#[tokio::test]
async fn test_happy_path_updates_every_piece_of_state() {
    let writer = Arc::new(writer());
    let orchestrator = GenerationOrchestrator::new(writer.clone(), &SerialistConfig::default()).unwrap();
    let state = fresh_state();

    let outcome = orchestrator
        .generate_chapter(&mut cache(), request(&state))
        .await
        .unwrap();

    assert_eq!(outcome.chapter_index, 1);
    assert_eq!(outcome.chapter_text, good_chapter(1).trim());
    assert!(!outcome.was_rewritten);
    assert_eq!(outcome.rewrite_count, 0);
    assert!(outcome.qc_result.passed);
    assert!((1.0..=10.0).contains(&outcome.pacing_target));

    let lin = outcome.updated_characters.snapshot("lin").unwrap();
    assert_eq!(lin.physical.location, "the flooded archive");
    assert_eq!(*outcome.updated_characters.last_updated_chapter(), 1);
    assert_eq!(outcome.updated_plot.nodes().len(), 2);
    assert_eq!(outcome.updated_timeline.current_marker, "Day 1, high tide");
    assert_eq!(outcome.updated_open_loops, vec!["Who tore out the missing page?".to_string()]);
    assert!(outcome.updated_summary.recent.contains("ledger"));

    let draft_requests = writer.requests_for(DRAFT_SYSTEM);
    assert_eq!(draft_requests.len(), 1);
    assert!(draft_requests[0].prompt.contains("## Scene plan\n1. The flood"));
    assert!(draft_requests[0].prompt.contains("The Flooded Archive"));
    assert_eq!(draft_requests[0].temperature, Some(0.85));

    let diagnostics = &outcome.diagnostics;
    assert_eq!(diagnostics.phase(Phase::Plan).calls, 1);
    assert_eq!(diagnostics.phase(Phase::Draft).calls, 1);
    assert_eq!(diagnostics.phase(Phase::SelfReview).calls, 1);
    assert_eq!(diagnostics.phase(Phase::StateExtraction).calls, 3);
    assert_eq!(diagnostics.phase(Phase::SummaryUpdate).calls, 1);
    assert_eq!(diagnostics.phase(Phase::FullQc).calls, 0);
    assert_eq!(diagnostics.total_calls() as usize, writer.call_count());
}

#[tokio::test]
async fn test_outcome_folds_into_project_state() {
    let orchestrator =
        GenerationOrchestrator::new(Arc::new(writer()), &SerialistConfig::default()).unwrap();
    let state = fresh_state();

    let outcome = orchestrator
        .generate_chapter(&mut cache(), request(&state))
        .await
        .unwrap();
    let next = state.clone().with_outcome(&outcome);

    assert_eq!(next.bible, state.bible);
    assert_eq!(next.narrative_arc, state.narrative_arc);
    assert_eq!(next.plot_graph, outcome.updated_plot);
    assert_eq!(next.open_loops, outcome.updated_open_loops);
    assert_eq!(next.timeline.current_marker, "Day 1, high tide");
}

#[tokio::test]
async fn test_self_review_rewrite_replaces_draft() {
    let writer = Arc::new(
        writer().route(
            REVIEW_SYSTEM,
            vec![Reply::text(REWRITE_REVIEW), Reply::text(KEEP_REVIEW)],
        ),
    );
    let orchestrator = GenerationOrchestrator::new(writer.clone(), &SerialistConfig::default()).unwrap();

    let outcome = orchestrator
        .generate_chapter(&mut cache(), request(&fresh_state()))
        .await
        .unwrap();

    assert!(outcome.was_rewritten);
    assert_eq!(outcome.rewrite_count, 1);
    assert!(outcome.chapter_text.contains("Drowned Archive"));
    assert_eq!(writer.calls_for(REVIEW_SYSTEM), 2);

    let rewrites = writer.requests_for(REWRITE_SYSTEM);
    assert_eq!(rewrites.len(), 1);
    assert!(rewrites[0].prompt.contains("- Lin teleports into the archive"));
    assert!(rewrites[0].prompt.contains("Guidance: Show her wading in"));
    assert_eq!(outcome.diagnostics.phase(Phase::SelfReview).calls, 3);
}

#[tokio::test]
async fn test_self_review_stops_after_configured_attempts() {
    let writer = Arc::new(writer().route(REVIEW_SYSTEM, vec![Reply::text(REWRITE_REVIEW)]));
    let orchestrator = GenerationOrchestrator::new(writer.clone(), &SerialistConfig::default()).unwrap();

    let outcome = orchestrator
        .generate_chapter(&mut cache(), request(&fresh_state()))
        .await
        .unwrap();

    assert_eq!(writer.calls_for(REVIEW_SYSTEM), 2);
    assert_eq!(writer.calls_for(REWRITE_SYSTEM), 2);
    assert_eq!(outcome.rewrite_count, 2);
}

#[tokio::test]
async fn test_failed_review_keeps_draft() {
    let writer = Arc::new(writer().route(REVIEW_SYSTEM, vec![Reply::server_error()]));
    let orchestrator = GenerationOrchestrator::new(writer.clone(), &SerialistConfig::default()).unwrap();

    let outcome = orchestrator
        .generate_chapter(&mut cache(), request(&fresh_state()))
        .await
        .unwrap();

    assert!(!outcome.was_rewritten);
    assert_eq!(writer.calls_for(REWRITE_SYSTEM), 0);
}

#[tokio::test]
async fn test_quick_qc_failure_is_rewritten_until_it_passes() {
    let writer = Arc::new(
        writer()
            .route(DRAFT_SYSTEM, vec![Reply::text(short_chapter(1))])
            .route(REWRITE_SYSTEM, vec![Reply::text(good_chapter(1))]),
    );
    let orchestrator = GenerationOrchestrator::new(writer.clone(), &SerialistConfig::default()).unwrap();

    let outcome = orchestrator
        .generate_chapter(&mut cache(), request(&fresh_state()))
        .await
        .unwrap();

    assert!(outcome.qc_result.passed);
    assert_eq!(outcome.rewrite_count, 1);
    assert_eq!(outcome.chapter_text, good_chapter(1).trim());

    let rewrites = writer.requests_for(REWRITE_SYSTEM);
    assert_eq!(rewrites.len(), 1);
    assert!(rewrites[0].prompt.contains("Chapter is too short"));
    assert_eq!(outcome.diagnostics.phase(Phase::QuickQc).calls, 1);
}

#[tokio::test]
async fn test_chapter_failing_every_rewrite_is_rejected() {
    let writer = Arc::new(
        writer()
            .route(DRAFT_SYSTEM, vec![Reply::text(short_chapter(1))])
            .route(REWRITE_SYSTEM, vec![Reply::text(short_chapter(1))]),
    );
    let orchestrator = GenerationOrchestrator::new(writer.clone(), &SerialistConfig::default()).unwrap();

    let err = orchestrator
        .generate_chapter(&mut cache(), request(&fresh_state()))
        .await
        .unwrap_err();

    match pipeline_kind(&err) {
        PipelineErrorKind::QualityGate { chapter, reason } => {
            assert_eq!(*chapter, 1);
            assert!(reason.starts_with("Chapter is too short"), "reason: {}", reason);
        }
        other => panic!("unexpected error kind: {}", other),
    }
    assert_eq!(writer.calls_for(REWRITE_SYSTEM), 2);
    assert_eq!(writer.calls_for(CHARACTER_EXTRACTION_SYSTEM), 0);
    assert_eq!(writer.calls_for(SUMMARY_SYSTEM), 0);
}

#[tokio::test]
async fn test_premature_ending_is_never_accepted() {
    let ending = format!("{}\nThey walked home together. The End.", good_chapter(1));
    let writer = Arc::new(
        writer()
            .route(DRAFT_SYSTEM, vec![Reply::text(ending.clone())])
            .route(REWRITE_SYSTEM, vec![Reply::text(ending)]),
    );
    let orchestrator = GenerationOrchestrator::new(writer, &SerialistConfig::default()).unwrap();

    let err = orchestrator
        .generate_chapter(&mut cache(), request(&fresh_state()))
        .await
        .unwrap_err();

    assert!(matches!(
        pipeline_kind(&err),
        PipelineErrorKind::QualityGate { chapter: 1, .. }
    ));
}

#[tokio::test]
async fn test_draft_failure_is_fatal() {
    let writer = Arc::new(writer().route(DRAFT_SYSTEM, vec![Reply::server_error()]));
    let orchestrator = GenerationOrchestrator::new(writer.clone(), &SerialistConfig::default()).unwrap();

    let err = orchestrator
        .generate_chapter(&mut cache(), request(&fresh_state()))
        .await
        .unwrap_err();

    assert!(matches!(err.kind(), SerialistErrorKind::Model(_)));
    assert_eq!(writer.calls_for(REVIEW_SYSTEM), 0);
}

#[tokio::test]
async fn test_empty_draft_is_fatal() {
    let writer = Arc::new(writer().route(DRAFT_SYSTEM, vec![Reply::text("   \n")]));
    let orchestrator = GenerationOrchestrator::new(writer, &SerialistConfig::default()).unwrap();

    let err = orchestrator
        .generate_chapter(&mut cache(), request(&fresh_state()))
        .await
        .unwrap_err();

    assert_eq!(
        pipeline_kind(&err),
        &PipelineErrorKind::EmptyResponse("draft".to_string())
    );
}

#[tokio::test]
async fn test_extraction_failures_keep_previous_state() {
    let writer = Arc::new(
        writer()
            .route(CHARACTER_EXTRACTION_SYSTEM, vec![Reply::server_error()])
            .route(PLOT_EXTRACTION_SYSTEM, vec![Reply::text("Nothing of note happened.")]),
    );
    let orchestrator = GenerationOrchestrator::new(writer, &SerialistConfig::default()).unwrap();
    let state = fresh_state();

    let outcome = orchestrator
        .generate_chapter(&mut cache(), request(&state))
        .await
        .unwrap();

    assert_eq!(outcome.updated_characters, state.characters);
    assert_eq!(outcome.updated_plot, state.plot_graph);
    assert_eq!(outcome.updated_timeline.current_marker, "Day 1, high tide");
    assert_eq!(outcome.updated_open_loops.len(), 1);
}

#[tokio::test]
async fn test_summary_falls_back_to_next_summarizer() {
    let failing = Arc::new(
        ScriptedGenerator::new("summary-primary").route(SUMMARY_SYSTEM, vec![Reply::server_error()]),
    );
    let backup = Arc::new(
        ScriptedGenerator::new("summary-backup")
            .route(SUMMARY_SYSTEM, vec![Reply::text(SUMMARY_RESPONSE)]),
    );
    let orchestrator = GenerationOrchestrator::new(Arc::new(writer()), &SerialistConfig::default())
        .unwrap()
        .with_summarizers(vec![failing.clone(), backup.clone()]);

    let outcome = orchestrator
        .generate_chapter(&mut cache(), request(&fresh_state()))
        .await
        .unwrap();

    assert_eq!(failing.call_count(), 1);
    assert_eq!(backup.call_count(), 1);
    assert_eq!(outcome.updated_summary.last_updated_chapter, 1);
    assert_eq!(outcome.diagnostics.phase(Phase::SummaryUpdate).calls, 2);
}

#[tokio::test]
async fn test_all_summarizers_failing_keeps_previous_summary() {
    let writer = Arc::new(writer().route(SUMMARY_SYSTEM, vec![Reply::text(r#"{"open_loops": []}"#)]));
    let orchestrator = GenerationOrchestrator::new(writer, &SerialistConfig::default()).unwrap();
    let mut state = fresh_state();
    state.open_loops = vec!["Who flooded the archive?".to_string()];

    let outcome = orchestrator
        .generate_chapter(&mut cache(), request(&state))
        .await
        .unwrap();

    assert_eq!(outcome.updated_summary, state.rolling_summary);
    assert_eq!(outcome.updated_open_loops, state.open_loops);
}

#[tokio::test]
async fn test_planning_failure_drafts_without_plan() {
    let writer = Arc::new(writer().route(PLAN_SYSTEM, vec![Reply::server_error()]));
    let orchestrator = GenerationOrchestrator::new(writer.clone(), &SerialistConfig::default()).unwrap();

    let outcome = orchestrator
        .generate_chapter(&mut cache(), request(&fresh_state()))
        .await
        .unwrap();

    assert!(outcome.qc_result.passed);
    let drafts = writer.requests_for(DRAFT_SYSTEM);
    assert!(!drafts[0].prompt.contains("## Scene plan"));
}

#[tokio::test]
async fn test_planning_can_be_disabled() {
    let config = SerialistConfig::default()
        .with_pipeline(PipelineConfig::default().with_enable_planning(false));
    let writer = Arc::new(writer());
    let orchestrator = GenerationOrchestrator::new(writer.clone(), &config).unwrap();

    let outcome = orchestrator
        .generate_chapter(&mut cache(), request(&fresh_state()))
        .await
        .unwrap();

    assert_eq!(writer.calls_for(PLAN_SYSTEM), 0);
    assert_eq!(outcome.diagnostics.phase(Phase::Plan).calls, 0);
}

fn full_qc_config() -> SerialistConfig {
    SerialistConfig::default().with_pipeline(PipelineConfig::default().with_enable_full_qc(true))
}

fn analyst(verdict: &str) -> ScriptedGenerator {
    ScriptedGenerator::new("analyst")
        .route(REVIEW_SYSTEM, vec![Reply::text(KEEP_REVIEW)])
        .route(CHARACTER_EXTRACTION_SYSTEM, vec![Reply::text(CHARACTER_RESPONSE)])
        .route(PLOT_EXTRACTION_SYSTEM, vec![Reply::text(PLOT_RESPONSE)])
        .route(TIMELINE_EXTRACTION_SYSTEM, vec![Reply::text(TIMELINE_RESPONSE)])
        .otherwise(vec![Reply::text(verdict)])
}

#[tokio::test]
async fn test_full_qc_failure_is_repaired() {
    let writer = Arc::new(writer());
    let analyst = Arc::new(analyst(CRITICAL_VERDICT));
    let orchestrator = GenerationOrchestrator::new(writer.clone(), &full_qc_config())
        .unwrap()
        .with_analyst(analyst.clone());

    let outcome = orchestrator
        .generate_chapter(&mut cache(), request(&fresh_state()))
        .await
        .unwrap();

    assert!(outcome.chapter_text.contains("Drowned Archive"));
    assert_eq!(outcome.rewrite_count, 1);
    assert!(outcome.qc_result.passed);
    assert_eq!(outcome.qc_result.gate, Severity::Major);

    let repair = writer.requests_for(REWRITE_SYSTEM);
    assert_eq!(repair.len(), 1);
    assert!(repair[0].prompt.contains("The ledger is never found"));
    assert_eq!(outcome.diagnostics.phase(Phase::FullQc).calls, 3);
    assert_eq!(outcome.diagnostics.phase(Phase::Repair).calls, 1);
    assert_eq!(writer.calls_for(REVIEW_SYSTEM), 0);
    assert_eq!(analyst.calls_for(REVIEW_SYSTEM), 1);
}

#[tokio::test]
async fn test_repair_failing_quick_qc_keeps_previous_text() {
    let writer = Arc::new(writer().route(REWRITE_SYSTEM, vec![Reply::text(short_chapter(1))]));
    let orchestrator = GenerationOrchestrator::new(writer, &full_qc_config())
        .unwrap()
        .with_analyst(Arc::new(analyst(CRITICAL_VERDICT)));

    let outcome = orchestrator
        .generate_chapter(&mut cache(), request(&fresh_state()))
        .await
        .unwrap();

    assert_eq!(outcome.chapter_text, good_chapter(1).trim());
    assert!(!outcome.was_rewritten);
    assert!(!outcome.qc_result.passed);
    assert_eq!(outcome.qc_result.gate, Severity::Critical);
}

#[tokio::test]
async fn test_passing_full_qc_needs_no_repair() {
    let writer = Arc::new(writer());
    let orchestrator = GenerationOrchestrator::new(writer.clone(), &full_qc_config())
        .unwrap()
        .with_analyst(Arc::new(analyst(r#"{"score": 92, "issues": []}"#)));

    let outcome = orchestrator
        .generate_chapter(&mut cache(), request(&fresh_state()))
        .await
        .unwrap();

    assert!(outcome.qc_result.passed);
    assert_eq!(outcome.qc_result.gate, Severity::Critical);
    assert!(outcome.qc_result.skipped.is_empty());
    assert_eq!(writer.calls_for(REWRITE_SYSTEM), 0);
}

#[tokio::test(start_paused = true)]
async fn test_provider_chain_falls_back_to_backup() {
    let primary = Arc::new(ScriptedGenerator::new("primary").otherwise(vec![Reply::server_error()]));
    let backup = Arc::new(writer());
    let orchestrator = GenerationOrchestrator::from_providers(
        vec![primary.clone(), backup.clone()],
        &SerialistConfig::default(),
    )
    .unwrap();

    let outcome = orchestrator
        .generate_chapter(&mut cache(), request(&fresh_state()))
        .await
        .unwrap();

    assert!(outcome.qc_result.passed);
    assert!(primary.call_count() > 0);
    assert_eq!(backup.calls_for(DRAFT_SYSTEM), 1);
}

#[tokio::test]
async fn test_empty_provider_list_is_rejected() {
    let err = GenerationOrchestrator::from_providers(Vec::new(), &SerialistConfig::default())
        .unwrap_err();
    assert_eq!(pipeline_kind(&err), &PipelineErrorKind::NoProviders);
}

#[tokio::test]
async fn test_provider_chain_rejects_invalid_config() {
    let config = SerialistConfig::default().with_retry(RetryPolicy::default().with_timeout_secs(0_u64));
    let backup = Arc::new(writer());
    let err = GenerationOrchestrator::from_providers(vec![backup.clone()], &config).unwrap_err();

    match err.kind() {
        SerialistErrorKind::Config(e) => assert_eq!(
            e.kind(),
            &ConfigErrorKind::InvalidValue {
                key: "retry.timeout_secs".to_string(),
                reason: "must be positive".to_string(),
            }
        ),
        other => panic!("expected a config error, got {}", other),
    }
    assert_eq!(backup.call_count(), 0);
}

#[tokio::test]
async fn test_chapter_outside_story_makes_no_calls() {
    let writer = Arc::new(writer());
    let orchestrator = GenerationOrchestrator::new(writer.clone(), &SerialistConfig::default()).unwrap();
    let state = fresh_state();

    let err = orchestrator
        .generate_chapter(&mut cache(), ChapterRequest::new("harbor-lights", 41, state))
        .await
        .unwrap_err();

    assert!(matches!(pipeline_kind(&err), PipelineErrorKind::InvalidInput(_)));
    assert_eq!(writer.call_count(), 0);
}

#[test]
fn test_request_builder_requires_state() {
    let err = ChapterRequest::builder()
        .project_id("harbor-lights")
        .chapter_index(2_u32)
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("state"));

    let request = ChapterRequest::builder()
        .project_id("harbor-lights")
        .chapter_index(2_u32)
        .state(fresh_state())
        .previous_pacing_target(4.5)
        .build()
        .unwrap();
    assert_eq!(request.previous_pacing_target, Some(4.5));
    assert!(request.recent_pacing_types.is_empty());
}
