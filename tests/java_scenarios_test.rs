//! Java slot scenarios: weak tests, structural-topic repair, soft fallback,
//! and the extra-public-type rewrite, driven through the full pipeline.

mod common;

use std::sync::Arc;

use drillsmith::config::Config;
use drillsmith::draft::FailureKind;
use drillsmith::judge::{JudgeResult, ScriptedJudge};
use drillsmith::llm::ScriptedLlmClient;
use drillsmith::obligations;
use drillsmith::pipeline::GenerationPipeline;
use drillsmith::progress::{ProgressEvent, ProgressStream};
use drillsmith::spec::Difficulty;
use drillsmith::util::RunContext;

use common::*;

fn run_config() -> Config {
    Config::default()
}

/// Tests too weak to reject the starter, and the user literally asked for
/// hard: no fallback, the run fails with a quality error.
#[tokio::test]
async fn test_weak_tests_with_explicit_hard_fail_the_run() {
    let llm = ScriptedLlmClient::new(vec![
        java_poly_draft("Billing v1"),
        java_poly_draft("Billing v2"),
        java_poly_draft("Billing v3"),
    ]);
    // per attempt: reference passes, then the starter baseline also passes
    let judge = ScriptedJudge::new(vec![
        JudgeResult::passing(""),
        JudgeResult::passing("starter sailed through"),
        JudgeResult::passing(""),
        JudgeResult::passing("starter sailed through"),
        JudgeResult::passing(""),
        JudgeResult::passing("starter sailed through"),
    ]);
    let progress = Arc::new(ProgressStream::new());
    let ctx = RunContext::seeded("act-s2", 21);
    let config = run_config();
    let pipeline = GenerationPipeline::new(&llm, &judge, &config, Arc::clone(&progress));

    let err = pipeline
        .run(&java_hard_poly_spec(true), &ctx)
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::Quality);
    assert_eq!(err.obligation_id, Some(obligations::TESTS_REJECT_BASELINES));
    assert_eq!(err.attempts, 3);

    // every attempt was reported as a judge-side failure, never a fallback
    let events = progress.events();
    assert!(!events.iter().any(|e| matches!(
        e.event,
        ProgressEvent::GenerationSoftFallbackApplied { .. }
    )));
}

/// Same weakness, but the user never demanded hard: the slot downgrades to
/// medium and the run completes.
#[tokio::test]
async fn test_soft_fallback_downgrades_hard_slot() {
    let llm = ScriptedLlmClient::new(vec![
        java_poly_draft("Billing v1"),
        java_poly_draft("Billing v2"),
        java_poly_draft("Billing v3"),
        java_poly_draft("Billing medium"),
    ]);
    let judge = ScriptedJudge::new(vec![
        // three hard attempts: starter baseline keeps passing
        JudgeResult::passing(""),
        JudgeResult::passing(""),
        JudgeResult::passing(""),
        JudgeResult::passing(""),
        JudgeResult::passing(""),
        JudgeResult::passing(""),
        // downgraded slot: reference passes, starter finally fails
        JudgeResult::passing(""),
        JudgeResult::failing("", "starter rejected"),
    ]);
    let progress = Arc::new(ProgressStream::new());
    let ctx = RunContext::seeded("act-fallback", 22);
    let config = run_config();
    let pipeline = GenerationPipeline::new(&llm, &judge, &config, Arc::clone(&progress));

    let outcome = pipeline
        .run(&java_hard_poly_spec(false), &ctx)
        .await
        .unwrap();

    assert_eq!(outcome.problems.len(), 1);
    assert_eq!(outcome.problems[0].difficulty, Difficulty::Medium);
    assert_eq!(outcome.soft_fallbacks.len(), 1);
    assert_eq!(outcome.soft_fallbacks[0].slot_index, 0);

    let events = progress.events();
    assert!(events.iter().any(|e| matches!(
        &e.event,
        ProgressEvent::GenerationSoftFallbackApplied { slot_index: 0, from, to }
            if from == "hard" && to == "medium"
    )));
}

/// A flat reference with no base type fails the polymorphism obligation on
/// attempt one; a properly shaped retry succeeds.
#[tokio::test]
async fn test_missing_base_type_contract_then_repair() {
    let llm = ScriptedLlmClient::new(vec![
        java_flat_draft("Flat Billing"),
        java_poly_draft("Shaped Billing"),
    ]);
    let judge = ScriptedJudge::new(vec![
        JudgeResult::passing(""),
        JudgeResult::failing("", "starter rejected"),
    ]);
    let progress = Arc::new(ProgressStream::new());
    let ctx = RunContext::seeded("act-s3", 23);
    let config = run_config();
    let pipeline = GenerationPipeline::new(&llm, &judge, &config, Arc::clone(&progress));

    let outcome = pipeline
        .run(&java_hard_poly_spec(true), &ctx)
        .await
        .unwrap();
    assert_eq!(outcome.problems.len(), 1);

    let events = progress.events();
    assert!(events.iter().any(|e| matches!(
        &e.event,
        ProgressEvent::SlotContractFailed { attempt: 1, obligation_id, .. }
            if *obligation_id == Some(obligations::JAVA_TOPIC_POLYMORPHISM)
    )));

    // the retry used a contract-repair prompt carrying the failure
    let requests = llm.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].user.contains("failed deterministic validation"));
}

/// A reference that fails its own tests takes the targeted repair path: one
/// call that rewrites only the reference solution, with the judge transcript
/// in the prompt and the test suite frozen.
#[tokio::test]
async fn test_failing_reference_takes_targeted_repair_path() {
    let repaired_reference = JAVA_POLY_REFERENCE.replace("units * 2", "units + units");
    let repair_response =
        serde_json::json!({ "reference_solution": repaired_reference }).to_string();
    let llm = ScriptedLlmClient::new(vec![java_poly_draft("Billing"), repair_response]);
    let judge = ScriptedJudge::new(vec![
        // attempt 1: the reference fails its own suite
        JudgeResult::failing("expected 6 but was 5", "AssertionError in testCase2"),
        // attempt 2 (repaired reference): passes, then the starter fails
        JudgeResult::passing(""),
        JudgeResult::failing("", "starter rejected"),
    ]);
    let progress = Arc::new(ProgressStream::new());
    let ctx = RunContext::seeded("act-exec-repair", 25);
    let config = run_config();
    let pipeline = GenerationPipeline::new(&llm, &judge, &config, Arc::clone(&progress));

    let outcome = pipeline
        .run(&java_hard_poly_spec(true), &ctx)
        .await
        .unwrap();
    assert_eq!(outcome.problems.len(), 1);

    let requests = llm.requests();
    assert_eq!(requests.len(), 2);
    // the second call is the targeted repair: frozen tests plus the judge
    // transcript, answering with a reference_solution object only
    assert!(requests[1].system.contains("\"reference_solution\""));
    assert!(requests[1].user.contains("expected 6 but was 5"));
    assert!(requests[1].user.contains("public class BillingTest"));

    let events = progress.events();
    assert!(events.iter().any(|e| matches!(
        &e.event,
        ProgressEvent::SlotDockerValidationFailed { attempt: 1, .. }
    )));
}

/// An extra top-level public type is demoted mechanically and the pipeline
/// proceeds, with the rewrite recorded on the outcome.
#[tokio::test]
async fn test_extra_public_type_demoted_and_recorded() {
    let reference_with_main = format!(
        "{}\npublic class Main {{\n    public static void main(String[] args) {{\n    }}\n}}\n",
        JAVA_POLY_REFERENCE.trim_end()
    );
    let draft = serde_json::json!({
        "title": "Billing with Main",
        "description": "Total a bill through a plan hierarchy.",
        "starter_code": "public class Billing {\n}\n",
        "reference_solution": reference_with_main,
        "test_suite": JAVA_POLY_TESTS,
        "constraints": JAVA_CONSTRAINTS,
        "sample_inputs": ["basic 3"],
        "sample_outputs": ["3"],
    })
    .to_string();

    let llm = ScriptedLlmClient::new(vec![draft]);
    let judge = ScriptedJudge::new(vec![
        JudgeResult::passing(""),
        JudgeResult::failing("", "starter rejected"),
    ]);
    let progress = Arc::new(ProgressStream::new());
    let ctx = RunContext::seeded("act-s4", 24);
    let config = run_config();
    let pipeline = GenerationPipeline::new(&llm, &judge, &config, Arc::clone(&progress));

    let outcome = pipeline
        .run(&java_hard_poly_spec(true), &ctx)
        .await
        .unwrap();

    let demotions: Vec<_> = outcome
        .rewrites
        .iter()
        .filter(|r| r.id == "java.demote_extra_public_types" && r.applied)
        .collect();
    assert_eq!(demotions.len(), 1);
    assert!(demotions[0]
        .detail
        .as_deref()
        .unwrap_or("")
        .contains("Main"));
}
