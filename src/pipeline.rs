//! Multi-slot generation driver.
//!
//! Slots run in order, so progress events are predictable and failures repeatable.
//! Per slot: a bounded attempt loop over the per-slot generator, the
//! reference executor, and the strength gate, with the repair input threaded
//! between attempts. Retries must be substantively different: the raw LLM
//! text of every attempt is hashed and a duplicate is rejected outright.
//!
//! After exhausting retries the slot fails the whole run and prior drafts
//! are discarded; a partial activity would be misleading to the user.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::draft::{
    AttemptError, ExternalProblemDraft, FailureKind, ProblemDraft, RewriteRecord, SlotFailure,
};
use crate::executor::ReferenceExecutor;
use crate::generator::{PerSlotGenerator, RepairInput, LLM_UNPARSABLE_JSON};
use crate::judge::JudgeAdapter;
use crate::llm::LlmClient;
use crate::planner;
use crate::progress::{ProgressEvent, ProgressStream};
use crate::spec::{ActivitySpec, Difficulty, ProblemSlot};
use crate::strength::TestStrengthGate;
use crate::util::{sha256_hex, RunContext};

const CANCELLED_ERROR: &str = "generation cancelled";

/// One applied hard→medium downgrade.
#[derive(Debug, Clone, Serialize)]
pub struct SoftFallback {
    pub slot_index: usize,
    pub from: Difficulty,
    pub to: Difficulty,
}

/// What the caller gets back. Reference material is already stripped.
#[derive(Debug, Serialize)]
pub struct GenerationOutcome {
    pub problems: Vec<ExternalProblemDraft>,
    pub rewrites: Vec<RewriteRecord>,
    pub soft_fallbacks: Vec<SoftFallback>,
}

pub struct GenerationPipeline<'a> {
    llm: &'a dyn LlmClient,
    judge: &'a dyn JudgeAdapter,
    max_attempts: usize,
    soft_fallback_enabled: bool,
    trace_test_suites: bool,
    llm_timeout: Duration,
    judge_timeout: Duration,
    progress: Arc<ProgressStream>,
}

impl<'a> GenerationPipeline<'a> {
    pub fn new(
        llm: &'a dyn LlmClient,
        judge: &'a dyn JudgeAdapter,
        config: &Config,
        progress: Arc<ProgressStream>,
    ) -> Self {
        Self {
            llm,
            judge,
            max_attempts: config.generation.max_attempts_per_slot.max(1),
            soft_fallback_enabled: config.generation.soft_fallback_enabled,
            trace_test_suites: config.generation.trace_test_suites,
            llm_timeout: Duration::from_millis(config.generation.llm_timeout_ms),
            judge_timeout: Duration::from_millis(config.judge.timeout_ms),
            progress,
        }
    }

    pub fn progress(&self) -> Arc<ProgressStream> {
        Arc::clone(&self.progress)
    }

    /// Generate the whole activity. The first slot to exhaust its budget
    /// fails the run; prior drafts are discarded.
    pub async fn run(
        &self,
        spec: &ActivitySpec,
        ctx: &RunContext,
    ) -> Result<GenerationOutcome, SlotFailure> {
        let slots = match planner::plan(spec) {
            Ok(slots) => slots,
            Err(e) => {
                let failure = SlotFailure {
                    slot_index: 0,
                    attempts: 0,
                    kind: FailureKind::Fatal,
                    obligation_id: None,
                    short_error: format!("invalid plan: {}", e),
                };
                self.emit_run_failed(&failure);
                return Err(failure);
            }
        };

        self.progress.emit(ProgressEvent::GenerationStarted {
            activity_id: ctx.activity_id().to_string(),
            slot_count: slots.len(),
        });

        let mut drafts: Vec<ProblemDraft> = Vec::with_capacity(slots.len());
        let mut soft_fallbacks = Vec::new();

        for slot in &slots {
            match self.drive_slot(slot, ctx).await {
                Ok(draft) => drafts.push(draft),
                Err((failure, all_quality)) => {
                    let eligible = self.soft_fallback_enabled
                        && !spec.explicit_hard_requested
                        && slot.difficulty == Difficulty::Hard
                        && all_quality;
                    if !eligible {
                        self.emit_run_failed(&failure);
                        return Err(failure);
                    }

                    info!(
                        "Slot {}: soft fallback hard -> medium after quality failures",
                        slot.index
                    );
                    let downgraded = planner::downgrade_to_medium(slot);
                    self.progress
                        .emit(ProgressEvent::GenerationSoftFallbackApplied {
                            slot_index: slot.index,
                            from: Difficulty::Hard.as_str().to_string(),
                            to: Difficulty::Medium.as_str().to_string(),
                        });
                    soft_fallbacks.push(SoftFallback {
                        slot_index: slot.index,
                        from: Difficulty::Hard,
                        to: Difficulty::Medium,
                    });

                    match self.drive_slot(&downgraded, ctx).await {
                        Ok(draft) => drafts.push(draft),
                        Err((failure, _)) => {
                            self.emit_run_failed(&failure);
                            return Err(failure);
                        }
                    }
                }
            }
        }

        let rewrites: Vec<RewriteRecord> = drafts
            .iter()
            .flat_map(|d| d.rewrites.iter().cloned())
            .collect();
        let problems: Vec<ExternalProblemDraft> =
            drafts.iter().map(ExternalProblemDraft::from).collect();

        self.progress.emit(ProgressEvent::GenerationCompleted {
            activity_id: ctx.activity_id().to_string(),
            problem_count: problems.len(),
        });

        Ok(GenerationOutcome {
            problems,
            rewrites,
            soft_fallbacks,
        })
    }

    /// The bounded attempt loop for one slot. On failure, reports whether
    /// every attempt failed on quality (the soft-fallback precondition).
    async fn drive_slot(
        &self,
        slot: &ProblemSlot,
        ctx: &RunContext,
    ) -> Result<ProblemDraft, (SlotFailure, bool)> {
        self.progress.emit(ProgressEvent::SlotStarted {
            slot_index: slot.index,
            difficulty: slot.difficulty.as_str().to_string(),
            topics: slot.topics.clone(),
        });

        let generator = PerSlotGenerator::new(self.llm, self.judge, self.llm_timeout);
        let executor = ReferenceExecutor::new(self.judge, self.judge_timeout);
        let gate = TestStrengthGate::new(self.judge, self.judge_timeout);

        let mut hashes: HashSet<String> = HashSet::new();
        let mut repair: Option<RepairInput> = None;
        let mut failure_kinds: Vec<FailureKind> = Vec::new();
        let mut consecutive_unparsable = 0usize;

        for attempt in 1..=self.max_attempts {
            if let Err(failure) = self.check_cancelled(ctx, slot.index, attempt) {
                return Err((failure, false));
            }

            self.progress.emit(ProgressEvent::SlotLlmAttemptStarted {
                slot_index: slot.index,
                attempt,
            });

            let outcome = generator
                .generate(slot, ctx, repair.as_ref(), &hashes)
                .await;
            let raw_text = outcome.raw_text.clone();
            if let Some(raw) = &raw_text {
                hashes.insert(sha256_hex(raw));
            }

            let error = match outcome.result {
                Ok(draft) => {
                    consecutive_unparsable = 0;
                    self.progress.emit(ProgressEvent::SlotContractValidated {
                        slot_index: slot.index,
                        attempt,
                    });
                    self.progress.emit(ProgressEvent::SlotEvidence {
                        slot_index: slot.index,
                        attempt,
                        obligations: outcome.obligations,
                        rewrites: draft.rewrites.clone(),
                    });

                    match self.execute_and_gate(&executor, &gate, slot, attempt, &draft).await {
                        Ok(()) => {
                            if let Err(failure) = self.check_cancelled(ctx, slot.index, attempt) {
                                return Err((failure, false));
                            }
                            self.progress.emit(ProgressEvent::SlotCompleted {
                                slot_index: slot.index,
                                problem_id: draft.id.clone(),
                            });
                            return Ok(draft);
                        }
                        Err(e) => {
                            repair = Some(self.repair_input(&e, raw_text.clone(), Some(&draft)));
                            e
                        }
                    }
                }
                Err(e) => {
                    // Two unparsable responses in a row are a transport-shaped
                    // problem, not a content problem
                    let e = if e.obligation_id() == Some(LLM_UNPARSABLE_JSON) {
                        consecutive_unparsable += 1;
                        if consecutive_unparsable >= 2 {
                            AttemptError::fatal("LLM output unparsable twice in a row")
                        } else {
                            e
                        }
                    } else {
                        consecutive_unparsable = 0;
                        e
                    };
                    if e.kind() == FailureKind::Contract {
                        self.progress.emit(ProgressEvent::SlotContractFailed {
                            slot_index: slot.index,
                            attempt,
                            obligation_id: e.obligation_id(),
                            error: e.short_error(),
                        });
                    }
                    repair = Some(self.repair_input(&e, raw_text.clone(), None));
                    e
                }
            };

            failure_kinds.push(error.kind());
            warn!(
                "Slot {} attempt {} failed ({}): {}",
                slot.index,
                attempt,
                error.kind(),
                error.short_error()
            );

            let out_of_budget = error.kind() == FailureKind::Fatal || attempt == self.max_attempts;
            if out_of_budget {
                let all_quality = !failure_kinds.is_empty()
                    && failure_kinds.iter().all(|k| *k == FailureKind::Quality);
                let failure = SlotFailure {
                    slot_index: slot.index,
                    attempts: attempt,
                    kind: error.kind(),
                    obligation_id: error.obligation_id(),
                    short_error: error.short_error(),
                };
                return Err((failure, all_quality));
            }
        }

        unreachable!("attempt loop returns before exhausting its range")
    }

    /// Reference execution then the strength gate, with progress events.
    async fn execute_and_gate(
        &self,
        executor: &ReferenceExecutor<'_>,
        gate: &TestStrengthGate<'_>,
        slot: &ProblemSlot,
        attempt: usize,
        draft: &ProblemDraft,
    ) -> Result<(), AttemptError> {
        self.progress
            .emit(ProgressEvent::SlotDockerValidationStarted {
                slot_index: slot.index,
                attempt,
            });

        let result = match executor.execute(draft).await {
            Ok(_) => gate.enforce(draft).await,
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            // Events stay redacted of code unless tracing is explicitly on
            let error = if self.trace_test_suites {
                match e {
                    AttemptError::Execution {
                        message,
                        judge_stdout,
                        judge_stderr,
                    } => format!(
                        "{}\nstdout: {}\nstderr: {}\ntest_suite:\n{}",
                        message, judge_stdout, judge_stderr, draft.test_suite
                    ),
                    other => other.short_error(),
                }
            } else {
                e.short_error()
            };
            self.progress
                .emit(ProgressEvent::SlotDockerValidationFailed {
                    slot_index: slot.index,
                    attempt,
                    kind: e.kind(),
                    error,
                });
        }
        result
    }

    fn repair_input(
        &self,
        error: &AttemptError,
        raw_text: Option<String>,
        draft: Option<&ProblemDraft>,
    ) -> RepairInput {
        let (judge_stdout, judge_stderr) = match error {
            AttemptError::Execution {
                judge_stdout,
                judge_stderr,
                ..
            } => (Some(judge_stdout.clone()), Some(judge_stderr.clone())),
            _ => (None, None),
        };
        RepairInput {
            previous_draft: draft.cloned(),
            previous_raw: raw_text,
            error_message: Some(error.short_error()),
            failure_kind: Some(error.kind()),
            judge_stdout,
            judge_stderr,
        }
    }

    fn check_cancelled(
        &self,
        ctx: &RunContext,
        slot_index: usize,
        attempt: usize,
    ) -> Result<(), SlotFailure> {
        if !ctx.is_cancelled() {
            return Ok(());
        }
        Err(SlotFailure {
            slot_index,
            attempts: attempt.saturating_sub(1),
            kind: FailureKind::Fatal,
            obligation_id: None,
            short_error: CANCELLED_ERROR.to_string(),
        })
    }

    fn emit_run_failed(&self, failure: &SlotFailure) {
        let kind = if failure.short_error == CANCELLED_ERROR {
            "cancelled".to_string()
        } else {
            failure.kind.to_string()
        };
        self.progress.emit(ProgressEvent::GenerationFailed {
            kind,
            error: failure.short_error.clone(),
        });
    }
}
