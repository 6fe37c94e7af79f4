//! End-to-end pipeline runs against scripted collaborators.

mod common;

use std::sync::Arc;

use drillsmith::config::Config;
use drillsmith::draft::FailureKind;
use drillsmith::judge::{JudgeResult, ScriptedJudge};
use drillsmith::llm::ScriptedLlmClient;
use drillsmith::obligations;
use drillsmith::pipeline::GenerationPipeline;
use drillsmith::progress::{ProgressEvent, ProgressStream};
use drillsmith::spec::{Language, ProblemStyle};
use drillsmith::util::RunContext;

use common::*;

fn pipeline<'a>(
    llm: &'a ScriptedLlmClient,
    judge: &'a ScriptedJudge,
    progress: Arc<ProgressStream>,
) -> GenerationPipeline<'a> {
    let config = Config::default();
    GenerationPipeline::new(llm, judge, &config, progress)
}

/// Scenario: two easy stdout-style Python problems, everything healthy.
#[tokio::test]
async fn test_python_stdout_two_slots_end_to_end() {
    let llm = ScriptedLlmClient::new(vec![
        python_stdout_draft("Rotate Left"),
        python_stdout_draft("Rotate Left Again"),
    ]);
    // per slot: reference passes, starter and trivial baselines fail
    let judge = ScriptedJudge::new(vec![
        JudgeResult::passing("8 passed"),
        JudgeResult::failing("", "starter failed"),
        JudgeResult::failing("", "trivial failed"),
        JudgeResult::passing("8 passed"),
        JudgeResult::failing("", "starter failed"),
        JudgeResult::failing("", "trivial failed"),
    ]);
    let progress = Arc::new(ProgressStream::new());
    let ctx = RunContext::seeded("act-s1", 11);

    let outcome = pipeline(&llm, &judge, Arc::clone(&progress))
        .run(&python_spec(2, ProblemStyle::Stdout), &ctx)
        .await
        .unwrap();

    assert_eq!(outcome.problems.len(), 2);
    for problem in &outcome.problems {
        assert_eq!(problem.language, Language::Python);
        assert!(problem.test_suite.contains("test_case_8"));
        assert!(problem.test_suite.contains("capsys"));
        assert_eq!(problem.constraints, PY_CONSTRAINTS);
    }

    // reference material never leaves the core
    let json = serde_json::to_string(&outcome.problems).unwrap();
    assert!(!json.contains("reference_solution"));
    assert!(!json.contains("reference_workspace"));

    // completion event carries the caller's activity id
    let events = progress.events();
    assert!(events.iter().any(|e| matches!(
        &e.event,
        ProgressEvent::GenerationCompleted { activity_id, problem_count }
            if activity_id == "act-s1" && *problem_count == 2
    )));

    assert_eq!(llm.remaining(), 0);
    assert_eq!(judge.remaining(), 0);
}

/// A retry that returns byte-identical raw text is rejected before any
/// re-validation, and the slot still completes on a changed third attempt.
#[tokio::test]
async fn test_identical_retry_rejected_then_recovers() {
    let mut bad: serde_json::Value =
        serde_json::from_str(&python_stdout_draft("Broken")).unwrap();
    bad["constraints"] = serde_json::Value::String("WRONG".to_string());
    let bad = bad.to_string();

    let llm = ScriptedLlmClient::new(vec![
        bad.clone(),
        bad.clone(), // identical: must be rejected on the hash alone
        python_stdout_draft("Fixed"),
    ]);
    let judge = ScriptedJudge::new(vec![
        JudgeResult::passing(""),
        JudgeResult::failing("", ""),
        JudgeResult::failing("", ""),
    ]);
    let progress = Arc::new(ProgressStream::new());
    let ctx = RunContext::seeded("act-dedup", 5);

    let outcome = pipeline(&llm, &judge, Arc::clone(&progress))
        .run(&python_spec(1, ProblemStyle::Stdout), &ctx)
        .await
        .unwrap();
    assert_eq!(outcome.problems.len(), 1);

    let events = progress.events();
    let contract_failures: Vec<_> = events
        .iter()
        .filter_map(|e| match &e.event {
            ProgressEvent::SlotContractFailed {
                attempt,
                obligation_id,
                error,
                ..
            } => Some((*attempt, *obligation_id, error.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(contract_failures.len(), 2);
    assert!(contract_failures[0].2.contains("Invalid constraints"));
    assert_eq!(
        contract_failures[1].1,
        Some(obligations::RETRY_SUBSTANTIVE_CHANGE)
    );
}

/// Cancellation before the run starts: no slot completes, the failure is
/// surfaced as cancelled.
#[tokio::test]
async fn test_cancellation_emits_no_slot_completed() {
    let llm = ScriptedLlmClient::new(vec![python_stdout_draft("Never used")]);
    let judge = ScriptedJudge::new(vec![]);
    let progress = Arc::new(ProgressStream::new());
    let ctx = RunContext::seeded("act-cancel", 3);
    ctx.cancel();

    let err = pipeline(&llm, &judge, Arc::clone(&progress))
        .run(&python_spec(1, ProblemStyle::Stdout), &ctx)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Fatal);
    assert!(err.short_error.contains("cancelled"));

    let events = progress.events();
    assert!(!events
        .iter()
        .any(|e| matches!(e.event, ProgressEvent::SlotCompleted { .. })));
    assert!(events.iter().any(|e| matches!(
        &e.event,
        ProgressEvent::GenerationFailed { kind, .. } if kind == "cancelled"
    )));
    // no collaborator was invoked after the signal
    assert_eq!(llm.requests().len(), 0);
    assert_eq!(judge.requests().len(), 0);
}

/// An exhausted LLM script is a transport failure: fatal, no retries.
#[tokio::test]
async fn test_llm_transport_failure_is_fatal_without_retry() {
    let llm = ScriptedLlmClient::new(vec![]);
    let judge = ScriptedJudge::new(vec![]);
    let progress = Arc::new(ProgressStream::new());
    let ctx = RunContext::seeded("act-fatal", 2);

    let err = pipeline(&llm, &judge, Arc::clone(&progress))
        .run(&python_spec(1, ProblemStyle::Stdout), &ctx)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Fatal);
    assert_eq!(err.attempts, 1);
}

/// Unparsable output twice in a row escalates from contract to fatal.
#[tokio::test]
async fn test_unparsable_twice_becomes_fatal() {
    let llm = ScriptedLlmClient::new(vec![
        "I cannot produce JSON today".to_string(),
        "still not json, but different".to_string(),
        python_stdout_draft("unused"),
    ]);
    let judge = ScriptedJudge::new(vec![]);
    let progress = Arc::new(ProgressStream::new());
    let ctx = RunContext::seeded("act-unparsable", 2);

    let err = pipeline(&llm, &judge, Arc::clone(&progress))
        .run(&python_spec(1, ProblemStyle::Stdout), &ctx)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Fatal);
    assert!(err.short_error.contains("unparsable twice"));
    assert_eq!(llm.requests().len(), 2);
}

/// A failing run discards the drafts of previously successful slots.
#[tokio::test]
async fn test_prior_slots_discarded_when_a_later_slot_fails() {
    // slot 0 succeeds; slot 1 exhausts the LLM script and dies fatal
    let llm = ScriptedLlmClient::new(vec![python_stdout_draft("Only one")]);
    let judge = ScriptedJudge::new(vec![
        JudgeResult::passing(""),
        JudgeResult::failing("", ""),
        JudgeResult::failing("", ""),
    ]);
    let progress = Arc::new(ProgressStream::new());
    let ctx = RunContext::seeded("act-partial", 9);

    let err = pipeline(&llm, &judge, Arc::clone(&progress))
        .run(&python_spec(2, ProblemStyle::Stdout), &ctx)
        .await
        .unwrap_err();
    assert_eq!(err.slot_index, 1);
    assert_eq!(err.kind, FailureKind::Fatal);

    // the first slot's completion happened, but nothing was returned
    let events = progress.events();
    assert!(events
        .iter()
        .any(|e| matches!(e.event, ProgressEvent::SlotCompleted { slot_index: 0, .. })));
}

/// A late subscriber replays the full run history in order.
#[tokio::test]
async fn test_late_subscriber_sees_full_history() {
    let llm = ScriptedLlmClient::new(vec![python_stdout_draft("Replay")]);
    let judge = ScriptedJudge::new(vec![
        JudgeResult::passing(""),
        JudgeResult::failing("", ""),
        JudgeResult::failing("", ""),
    ]);
    let progress = Arc::new(ProgressStream::new());
    let ctx = RunContext::seeded("act-replay", 4);

    pipeline(&llm, &judge, Arc::clone(&progress))
        .run(&python_spec(1, ProblemStyle::Stdout), &ctx)
        .await
        .unwrap();

    let (history, _live) = progress.subscribe();
    assert!(matches!(
        history.first().map(|e| &e.event),
        Some(ProgressEvent::GenerationStarted { .. })
    ));
    assert!(matches!(
        history.last().map(|e| &e.event),
        Some(ProgressEvent::GenerationCompleted { .. })
    ));
    for pair in history.windows(2) {
        assert!(pair[0].seq < pair[1].seq);
    }
}

/// Slot events stay partitioned and ordered per slot.
#[tokio::test]
async fn test_slot_events_ordered_within_slot() {
    let llm = ScriptedLlmClient::new(vec![
        python_stdout_draft("A"),
        python_stdout_draft("B"),
    ]);
    let judge = ScriptedJudge::new(vec![
        JudgeResult::passing(""),
        JudgeResult::failing("", ""),
        JudgeResult::failing("", ""),
        JudgeResult::passing(""),
        JudgeResult::failing("", ""),
        JudgeResult::failing("", ""),
    ]);
    let progress = Arc::new(ProgressStream::new());
    let ctx = RunContext::seeded("act-order", 6);

    pipeline(&llm, &judge, Arc::clone(&progress))
        .run(&python_spec(2, ProblemStyle::Stdout), &ctx)
        .await
        .unwrap();

    let events = progress.events();
    for slot in 0..2usize {
        let slot_events: Vec<_> = events
            .iter()
            .filter(|e| e.event.slot_index() == Some(slot))
            .collect();
        assert!(matches!(
            slot_events.first().map(|e| &e.event),
            Some(ProgressEvent::SlotStarted { .. })
        ));
        assert!(matches!(
            slot_events.last().map(|e| &e.event),
            Some(ProgressEvent::SlotCompleted { .. })
        ));
    }
    // slot 1 starts only after slot 0 completed
    let slot0_done = events
        .iter()
        .position(|e| matches!(e.event, ProgressEvent::SlotCompleted { slot_index: 0, .. }))
        .unwrap();
    let slot1_start = events
        .iter()
        .position(|e| matches!(e.event, ProgressEvent::SlotStarted { slot_index: 1, .. }))
        .unwrap();
    assert!(slot0_done < slot1_start);
}
