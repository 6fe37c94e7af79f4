//! Per-slot generation: one linear state machine per attempt.
//!
//! prompt_build → llm_call → json_parse → normalize_fields →
//! mechanical_rewrites → shape_validate(test_suite) → obligation_check →
//! draft_ready. The first failure short-circuits the rest of the attempt.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::draft::{AttemptError, FailureKind, ObligationResult, ProblemDraft, RewriteRecord};
use crate::judge::JudgeAdapter;
use crate::llm::extract::extract_json_object;
use crate::llm::{prompts, CompletionRequest, LlmClient};
use crate::obligations;
use crate::rewrite;
use crate::scanner::JavaScanner;
use crate::spec::{Language, ProblemSlot};
use crate::testsuite;
use crate::testsuite::repair::TestSuiteRepairer;
use crate::util::{sha256_hex, RunContext};

/// Pseudo-obligation id marking a response with no parsable JSON. The
/// pipeline escalates two of these in a row to a fatal failure.
pub const LLM_UNPARSABLE_JSON: &str = "llm.unparsable_json";

const MAX_SAMPLES: usize = 10;
const PLACEHOLDER_INPUT: &str = "example input";
const PLACEHOLDER_OUTPUT: &str = "example output";

/// Carry-over from a failed attempt, feeding the repair prompt variants.
#[derive(Debug, Clone, Default)]
pub struct RepairInput {
    pub previous_draft: Option<ProblemDraft>,
    pub previous_raw: Option<String>,
    pub error_message: Option<String>,
    pub failure_kind: Option<FailureKind>,
    pub judge_stdout: Option<String>,
    pub judge_stderr: Option<String>,
}

/// Outcome of one attempt. `raw_text` is present whenever the LLM answered,
/// so the pipeline can hash it for the substantive-change gate even when the
/// attempt failed.
pub struct SlotAttempt {
    pub raw_text: Option<String>,
    pub obligations: Vec<ObligationResult>,
    pub result: Result<ProblemDraft, AttemptError>,
}

impl SlotAttempt {
    fn failed(raw_text: Option<String>, error: AttemptError) -> Self {
        Self {
            raw_text,
            obligations: Vec::new(),
            result: Err(error),
        }
    }
}

/// The fields the model is allowed to produce. Everything else in its
/// output is ignored.
#[derive(Debug, Deserialize)]
struct RawDraft {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    starter_code: Option<String>,
    #[serde(default)]
    reference_solution: Option<String>,
    #[serde(default)]
    reference_workspace: Option<BTreeMap<String, String>>,
    #[serde(default)]
    workspace: Option<BTreeMap<String, String>>,
    #[serde(default)]
    test_suite: Option<String>,
    #[serde(default)]
    constraints: Option<String>,
    #[serde(default)]
    sample_inputs: Option<Vec<String>>,
    #[serde(default)]
    sample_outputs: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ReferenceRepairResponse {
    reference_solution: String,
}

pub struct PerSlotGenerator<'a> {
    llm: &'a dyn LlmClient,
    judge: &'a dyn JudgeAdapter,
    llm_timeout: Duration,
}

impl<'a> PerSlotGenerator<'a> {
    pub fn new(llm: &'a dyn LlmClient, judge: &'a dyn JudgeAdapter, llm_timeout: Duration) -> Self {
        Self {
            llm,
            judge,
            llm_timeout,
        }
    }

    /// Run one attempt for `slot`. `prior_hashes` holds sha-256 hex of raw
    /// LLM text from earlier attempts in the same slot; a duplicate response
    /// is rejected before any parsing or validation re-runs.
    pub async fn generate(
        &self,
        slot: &ProblemSlot,
        ctx: &RunContext,
        repair: Option<&RepairInput>,
        prior_hashes: &HashSet<String>,
    ) -> SlotAttempt {
        // Targeted reference-solution repair: Java, prior draft in hand,
        // and the failure was the reference failing its own tests.
        if let Some(input) = repair {
            if input.failure_kind == Some(FailureKind::Execution)
                && slot.language == Language::Java
                && input
                    .previous_draft
                    .as_ref()
                    .map(|d| !d.is_workspace())
                    .unwrap_or(false)
            {
                return self.repair_reference(slot, input, prior_hashes).await;
            }
        }

        let request = self.build_prompt(slot, repair);
        let raw = match self.call_llm(&request).await {
            Ok(raw) => raw,
            Err(e) => return SlotAttempt::failed(None, e),
        };

        let hash = sha256_hex(&raw);
        if prior_hashes.contains(&hash) {
            return SlotAttempt::failed(
                Some(raw),
                AttemptError::obligation(
                    obligations::RETRY_SUBSTANTIVE_CHANGE,
                    "retry returned byte-identical output",
                ),
            );
        }

        let parsed: RawDraft = match extract_json_object(&raw)
            .ok_or(())
            .and_then(|json| serde_json::from_str(json).map_err(|_| ()))
        {
            Ok(parsed) => parsed,
            Err(()) => {
                return SlotAttempt::failed(
                    Some(raw),
                    AttemptError::obligation(
                        LLM_UNPARSABLE_JSON,
                        "response carried no parsable JSON object",
                    ),
                );
            }
        };

        let mut rewrites = Vec::new();
        let mut draft = match self.normalize(slot, ctx, parsed, &mut rewrites) {
            Ok(draft) => draft,
            Err(e) => return SlotAttempt::failed(Some(raw), e),
        };

        if let Err(e) = self.apply_rewrites(slot, &mut draft, &mut rewrites).await {
            return SlotAttempt::failed(Some(raw), e);
        }

        if let Err(e) = self.validate_test_suite(slot, &mut draft, &mut rewrites).await {
            return SlotAttempt::failed(Some(raw), e);
        }

        draft.rewrites = rewrites;

        match obligations::check(&draft, slot) {
            Ok(results) => {
                info!(
                    "Slot {} attempt validated: {} obligations ok, {} rewrites applied",
                    slot.index,
                    results.len(),
                    draft.rewrites.iter().filter(|r| r.applied).count()
                );
                SlotAttempt {
                    raw_text: Some(raw),
                    obligations: results,
                    result: Ok(draft),
                }
            }
            Err(e) => SlotAttempt::failed(Some(raw), e),
        }
    }

    fn build_prompt(&self, slot: &ProblemSlot, repair: Option<&RepairInput>) -> CompletionRequest {
        let Some(input) = repair else {
            return prompts::generation(slot);
        };
        let previous = input.previous_raw.as_deref().unwrap_or("(unavailable)");
        let error = input.error_message.as_deref().unwrap_or("(unspecified)");
        match input.failure_kind {
            Some(FailureKind::Quality) => prompts::quality_repair(slot, previous, error),
            Some(FailureKind::Execution) => {
                // Non-targeted execution retry: regenerate with the judge
                // transcript folded into the error context
                let stdout = input.judge_stdout.as_deref().unwrap_or("");
                let stderr = input.judge_stderr.as_deref().unwrap_or("");
                let detail = format!(
                    "{}\n\nJudge stdout:\n{}\n\nJudge stderr:\n{}",
                    error, stdout, stderr
                );
                prompts::contract_repair(slot, previous, &detail)
            }
            _ => prompts::contract_repair(slot, previous, error),
        }
    }

    async fn call_llm(&self, request: &CompletionRequest) -> Result<String, AttemptError> {
        match tokio::time::timeout(self.llm_timeout, self.llm.complete(request)).await {
            Ok(Ok(raw)) => Ok(raw),
            Ok(Err(e)) => Err(AttemptError::fatal(format!("LLM transport failed: {}", e))),
            Err(_) => Err(AttemptError::fatal(format!(
                "LLM call timed out after {:?}",
                self.llm_timeout
            ))),
        }
    }

    /// Targeted repair path: one LLM call whose sole job is to rewrite
    /// `reference_solution` so the frozen test suite passes.
    async fn repair_reference(
        &self,
        slot: &ProblemSlot,
        input: &RepairInput,
        prior_hashes: &HashSet<String>,
    ) -> SlotAttempt {
        let Some(draft) = input.previous_draft.as_ref() else {
            return SlotAttempt::failed(
                None,
                AttemptError::fatal("reference repair invoked without a prior draft"),
            );
        };
        info!("Slot {}: targeted reference-solution repair", slot.index);

        let request = prompts::reference_repair(
            slot,
            draft,
            input.judge_stdout.as_deref().unwrap_or(""),
            input.judge_stderr.as_deref().unwrap_or(""),
        );
        let raw = match self.call_llm(&request).await {
            Ok(raw) => raw,
            Err(e) => return SlotAttempt::failed(None, e),
        };

        let hash = sha256_hex(&raw);
        if prior_hashes.contains(&hash) {
            return SlotAttempt::failed(
                Some(raw),
                AttemptError::obligation(
                    obligations::RETRY_SUBSTANTIVE_CHANGE,
                    "reference repair returned byte-identical output",
                ),
            );
        }

        let response: ReferenceRepairResponse = match extract_json_object(&raw)
            .ok_or(())
            .and_then(|json| serde_json::from_str(json).map_err(|_| ()))
        {
            Ok(parsed) => parsed,
            Err(()) => {
                return SlotAttempt::failed(
                    Some(raw),
                    AttemptError::obligation(
                        LLM_UNPARSABLE_JSON,
                        "reference repair response carried no parsable JSON",
                    ),
                );
            }
        };

        if response.reference_solution.trim() == draft.reference_solution.trim() {
            return SlotAttempt::failed(
                Some(raw),
                AttemptError::Execution {
                    message: "reference repair returned the source unchanged".to_string(),
                    judge_stdout: input.judge_stdout.clone().unwrap_or_default(),
                    judge_stderr: input.judge_stderr.clone().unwrap_or_default(),
                },
            );
        }

        // Any other field change is ignored: only the reference moves
        let mut repaired = draft.clone();
        repaired.reference_solution = response.reference_solution;

        let mut rewrites = repaired.rewrites.clone();
        if let Err(e) = self.apply_rewrites(slot, &mut repaired, &mut rewrites).await {
            return SlotAttempt::failed(Some(raw), e);
        }
        repaired.rewrites = rewrites;

        match obligations::check(&repaired, slot) {
            Ok(results) => SlotAttempt {
                raw_text: Some(raw),
                obligations: results,
                result: Ok(repaired),
            },
            Err(e) => SlotAttempt::failed(Some(raw), e),
        }
    }

    fn normalize(
        &self,
        slot: &ProblemSlot,
        ctx: &RunContext,
        raw: RawDraft,
        rewrites: &mut Vec<RewriteRecord>,
    ) -> Result<ProblemDraft, AttemptError> {
        let title = raw.title.map(|t| t.trim().to_string()).unwrap_or_default();
        let description = raw
            .description
            .map(|d| d.trim().to_string())
            .unwrap_or_default();
        if title.is_empty() || description.is_empty() {
            return Err(AttemptError::contract("draft is missing title or description"));
        }

        let test_suite = raw.test_suite.unwrap_or_default();
        if test_suite.trim().is_empty() {
            return Err(AttemptError::contract("draft is missing a test suite"));
        }

        // Reference: a single unit, or a Java workspace
        let reference_solution = raw.reference_solution.unwrap_or_default();
        let reference_workspace = raw.reference_workspace.filter(|w| !w.is_empty());
        let workspace = raw.workspace.filter(|w| !w.is_empty());
        if reference_workspace.is_some() && slot.language != Language::Java {
            return Err(AttemptError::contract(
                "workspace-shaped drafts are only supported for Java",
            ));
        }
        if reference_workspace.is_none() && reference_solution.trim().is_empty() {
            return Err(AttemptError::contract("draft is missing a reference solution"));
        }
        if let (Some(reference_files), Some(starter_files)) = (&reference_workspace, &workspace) {
            let ref_paths: Vec<&String> = reference_files.keys().collect();
            let starter_paths: Vec<&String> = starter_files.keys().collect();
            if ref_paths != starter_paths {
                return Err(AttemptError::contract(
                    "workspace and reference_workspace must carry the same file paths",
                ));
            }
        }
        if reference_workspace.is_some() && workspace.is_none() {
            return Err(AttemptError::contract(
                "workspace-shaped draft is missing its starter workspace",
            ));
        }

        // Constraint drift: absent is filled, present-but-wrong is rejected
        let constraints = match raw.constraints {
            Some(c) if !c.trim().is_empty() => {
                if c != slot.constraints {
                    return Err(AttemptError::contract(format!(
                        "Invalid constraints: expected the slot's canonical constraints, got {:?}",
                        c
                    )));
                }
                c
            }
            _ => {
                rewrites.push(RewriteRecord::applied(
                    rewrite::FILL_CONSTRAINTS,
                    "constraints filled from slot",
                ));
                slot.constraints.clone()
            }
        };

        // Samples: trim, cap, and fall back to a placeholder pair
        let mut sample_inputs: Vec<String> = raw
            .sample_inputs
            .unwrap_or_default()
            .into_iter()
            .map(|s| s.trim().to_string())
            .collect();
        let mut sample_outputs: Vec<String> = raw
            .sample_outputs
            .unwrap_or_default()
            .into_iter()
            .map(|s| s.trim().to_string())
            .collect();
        sample_inputs.truncate(MAX_SAMPLES);
        sample_outputs.truncate(MAX_SAMPLES);
        if sample_inputs.is_empty()
            || sample_outputs.is_empty()
            || sample_inputs.len() != sample_outputs.len()
        {
            sample_inputs = vec![PLACEHOLDER_INPUT.to_string()];
            sample_outputs = vec![PLACEHOLDER_OUTPUT.to_string()];
            rewrites.push(RewriteRecord::applied(
                rewrite::NORMALIZE_SAMPLES,
                "samples replaced with a placeholder pair",
            ));
        }

        let starter_code = raw
            .starter_code
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default();
        // C++ scaffolds without a solve declaration are as useless as empty
        // ones; resynthesize from the reference signature
        let starter_unusable = starter_code.trim().is_empty()
            || (slot.language == Language::Cpp
                && !crate::scanner::CppScanner::new(&starter_code).mentions_solve());
        let starter_code = if starter_unusable && workspace.is_none() {
            let synthesized = self.synthesize_starter(slot, &reference_solution)?;
            rewrites.push(RewriteRecord::applied(
                rewrite::SYNTHESIZE_STARTER,
                "starter scaffold synthesized from the reference",
            ));
            synthesized
        } else {
            starter_code
        };

        Ok(ProblemDraft {
            id: ctx.next_id("prob"),
            title,
            description,
            language: slot.language,
            difficulty: slot.difficulty,
            topic_tag: slot.primary_topic().to_string(),
            problem_style: slot.problem_style,
            starter_code,
            test_suite,
            reference_solution,
            workspace,
            reference_workspace,
            constraints,
            sample_inputs,
            sample_outputs,
            rewrites: Vec::new(),
        })
    }

    /// A scaffold that compiles (or parses) without leaking solution logic.
    fn synthesize_starter(
        &self,
        slot: &ProblemSlot,
        reference: &str,
    ) -> Result<String, AttemptError> {
        match slot.language {
            Language::Java => {
                let scanner = JavaScanner::new(reference);
                let name = scanner
                    .primary_public_type()
                    .map(|t| t.name.clone())
                    .or_else(|| scanner.top_level_types().first().map(|t| t.name.clone()))
                    .ok_or_else(|| {
                        AttemptError::contract(
                            "cannot synthesize a Java starter: reference declares no types",
                        )
                    })?;
                Ok(format!("public class {} {{\n    // TODO: implement\n}}\n", name))
            }
            Language::Cpp => {
                let scanner = crate::scanner::CppScanner::new(reference);
                let signature = scanner.solve_signature().ok_or_else(|| {
                    AttemptError::contract(
                        "cannot synthesize a C++ starter: reference has no solve(...) definition",
                    )
                })?;
                Ok(format!(
                    "#include <stdexcept>\n\n{} solve({}) {{\n    // TODO: implement\n    throw std::logic_error(\"not implemented\");\n}}\n",
                    signature.return_type, signature.params
                ))
            }
            Language::Python => Err(AttemptError::contract(
                "draft is missing starter_code",
            )),
            Language::Sql => Err(AttemptError::contract(
                "draft is missing starter_code",
            )),
        }
    }

    /// Java mechanical rewrites, applied in a fixed order before validation.
    async fn apply_rewrites(
        &self,
        slot: &ProblemSlot,
        draft: &mut ProblemDraft,
        rewrites: &mut Vec<RewriteRecord>,
    ) -> Result<(), AttemptError> {
        if slot.language != Language::Java {
            return Ok(());
        }

        if draft.is_workspace() {
            // Per-unit conformance only; cross-file renames are the model's
            // problem to get right
            if let Some(files) = draft.reference_workspace.as_mut() {
                for (path, content) in files.iter_mut() {
                    let out = rewrite::demote_extra_public_types(content, None);
                    if out.changed {
                        rewrites.push(RewriteRecord::applied(
                            rewrite::DEMOTE_EXTRA_PUBLIC_TYPES,
                            format!("{}: {}", path, out.detail),
                        ));
                        *content = out.source;
                    }
                }
            }
            if let Some(files) = draft.workspace.as_mut() {
                for (path, content) in files.iter_mut() {
                    let out = rewrite::demote_extra_public_types(content, None);
                    if out.changed {
                        rewrites.push(RewriteRecord::applied(
                            rewrite::DEMOTE_EXTRA_PUBLIC_TYPES,
                            format!("workspace {}: {}", path, out.detail),
                        ));
                        *content = out.source;
                    }
                }
            }
            return Ok(());
        }

        let starter_primary = JavaScanner::new(&draft.starter_code)
            .primary_public_type()
            .map(|t| t.name.clone());

        // Reference first: demote extras, promote when nothing is public
        let out =
            rewrite::demote_extra_public_types(&draft.reference_solution, starter_primary.as_deref());
        if out.changed {
            rewrites.push(RewriteRecord::applied(
                rewrite::DEMOTE_EXTRA_PUBLIC_TYPES,
                out.detail.clone(),
            ));
            draft.reference_solution = out.source;
        }
        let out = rewrite::promote_public_type(&draft.reference_solution, starter_primary.as_deref());
        if out.changed {
            rewrites.push(RewriteRecord::applied(
                rewrite::PROMOTE_PUBLIC_TYPE,
                out.detail.clone(),
            ));
            draft.reference_solution = out.source;
        }

        // Starter follows the reference's primary type
        let reference_primary = JavaScanner::new(&draft.reference_solution)
            .primary_public_type()
            .map(|t| t.name.clone());
        let out =
            rewrite::demote_extra_public_types(&draft.starter_code, reference_primary.as_deref());
        if out.changed {
            rewrites.push(RewriteRecord::applied(
                rewrite::DEMOTE_EXTRA_PUBLIC_TYPES,
                format!("starter: {}", out.detail),
            ));
            draft.starter_code = out.source;
        }
        let out = rewrite::promote_public_type(&draft.starter_code, reference_primary.as_deref());
        if out.changed {
            rewrites.push(RewriteRecord::applied(
                rewrite::PROMOTE_PUBLIC_TYPE,
                format!("starter: {}", out.detail),
            ));
            draft.starter_code = out.source;
        }

        // Test class renamed to <Target>Test
        if let Some(target) = &reference_primary {
            let expected = format!("{}Test", target);
            let out = rewrite::rename_public_class(&draft.test_suite, &expected);
            if out.changed {
                rewrites.push(RewriteRecord::applied(
                    rewrite::RENAME_PUBLIC_CLASS,
                    out.detail.clone(),
                ));
                draft.test_suite = out.source;
            }
        }

        // Brittle whitespace inside test string literals
        let out = rewrite::sanitize_string_literal_whitespace(&draft.test_suite);
        if out.changed {
            rewrites.push(RewriteRecord::applied(
                rewrite::SANITIZE_STRING_WHITESPACE,
                out.detail.clone(),
            ));
            draft.test_suite = out.source;
        }

        // A stdin-reading reference gets a deterministic sample-driven suite
        let reference_scanner = JavaScanner::new(&draft.reference_solution);
        if reference_scanner.reads_stdin() && !draft.sample_inputs.is_empty() {
            if let Some(target) = &reference_primary {
                debug!("Slot {}: rebuilding stdin test suite from samples", slot.index);
                let suite = rewrite::rebuild_stdin_test_suite(
                    self.judge,
                    target,
                    &draft.reference_solution,
                    &draft.sample_inputs,
                )
                .await?;
                draft.test_suite = suite;
                rewrites.push(RewriteRecord::applied(
                    rewrite::REBUILD_STDIN_TEST_SUITE,
                    format!("rebuilt from {} samples", draft.sample_inputs.len()),
                ));
            }
        }

        Ok(())
    }

    /// Shape validation with the one-shot repair escape hatch.
    async fn validate_test_suite(
        &self,
        slot: &ProblemSlot,
        draft: &mut ProblemDraft,
        rewrites: &mut Vec<RewriteRecord>,
    ) -> Result<(), AttemptError> {
        let Err(violation) = testsuite::validate(slot, &draft.test_suite) else {
            return Ok(());
        };

        warn!(
            "Slot {}: test suite failed shape validation ({}), attempting repair",
            slot.index, violation.message
        );

        let repairer = TestSuiteRepairer::new(self.llm);
        let repaired = match tokio::time::timeout(
            self.llm_timeout,
            repairer.repair(slot, &draft.test_suite, &violation.message),
        )
        .await
        {
            Ok(Ok(suite)) => suite,
            Ok(Err(_)) | Err(_) => {
                return Err(AttemptError::contract(format!(
                    "test suite invalid and repair failed: {}",
                    violation.message
                )));
            }
        };

        testsuite::validate(slot, &repaired).map_err(|second| {
            AttemptError::contract(format!(
                "test suite invalid after repair: {}",
                second.message
            ))
        })?;

        draft.test_suite = repaired;
        rewrites.push(RewriteRecord::applied(
            "tests.llm_repair",
            format!("repaired: {}", violation.message),
        ));
        Ok(())
    }
}
