//! Problem drafts, rewrite records, obligation results, and the failure
//! taxonomy the retry policy dispatches on.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spec::{Difficulty, Language, ProblemStyle};

/// Record of one mechanical rewrite applied to a draft. Carried forward so
/// the progress stream can surface what changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRecord {
    pub id: String,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl RewriteRecord {
    pub fn applied(id: &str, detail: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            applied: true,
            detail: Some(detail.into()),
        }
    }

    pub fn noop(id: &str) -> Self {
        Self {
            id: id.to_string(),
            applied: false,
            detail: None,
        }
    }
}

/// Outcome of evaluating one named structural rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObligationResult {
    pub id: &'static str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ObligationResult {
    pub fn ok(id: &'static str) -> Self {
        Self {
            id,
            ok: true,
            message: None,
        }
    }

    pub fn violated(id: &'static str, message: impl Into<String>) -> Self {
        Self {
            id,
            ok: false,
            message: Some(message.into()),
        }
    }
}

/// A complete generated problem, reference material included. Never leaves
/// the core: callers receive [`ExternalProblemDraft`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDraft {
    pub id: String,
    pub title: String,
    pub description: String,
    pub language: Language,
    pub difficulty: Difficulty,
    pub topic_tag: String,
    pub problem_style: ProblemStyle,
    pub starter_code: String,
    pub test_suite: String,
    /// Single-unit reference solution. Empty when the draft is
    /// workspace-shaped (multi-file Java).
    pub reference_solution: String,
    /// Starter files for workspace-shaped drafts; path → content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_workspace: Option<BTreeMap<String, String>>,
    pub constraints: String,
    pub sample_inputs: Vec<String>,
    pub sample_outputs: Vec<String>,
    pub rewrites: Vec<RewriteRecord>,
}

impl ProblemDraft {
    pub fn is_workspace(&self) -> bool {
        self.reference_workspace.is_some()
    }

    /// All reference compilation units: the single solution, or every
    /// workspace file.
    pub fn reference_units(&self) -> Vec<(&str, &str)> {
        match &self.reference_workspace {
            Some(files) => files
                .iter()
                .map(|(p, c)| (p.as_str(), c.as_str()))
                .collect(),
            None => vec![("solution", self.reference_solution.as_str())],
        }
    }
}

/// The draft shape handed outside the core: reference material stripped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalProblemDraft {
    pub id: String,
    pub title: String,
    pub description: String,
    pub language: Language,
    pub difficulty: Difficulty,
    pub topic_tag: String,
    pub problem_style: ProblemStyle,
    pub starter_code: String,
    pub test_suite: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<BTreeMap<String, String>>,
    pub constraints: String,
    pub sample_inputs: Vec<String>,
    pub sample_outputs: Vec<String>,
    pub rewrites: Vec<RewriteRecord>,
}

impl From<&ProblemDraft> for ExternalProblemDraft {
    fn from(draft: &ProblemDraft) -> Self {
        Self {
            id: draft.id.clone(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            language: draft.language,
            difficulty: draft.difficulty,
            topic_tag: draft.topic_tag.clone(),
            problem_style: draft.problem_style,
            starter_code: draft.starter_code.clone(),
            test_suite: draft.test_suite.clone(),
            workspace: draft.workspace.clone(),
            constraints: draft.constraints.clone(),
            sample_inputs: draft.sample_inputs.clone(),
            sample_outputs: draft.sample_outputs.clone(),
            rewrites: draft.rewrites.clone(),
        }
    }
}

/// Failure category. The retry table in the pipeline matches exhaustively on
/// this, so a new category cannot silently become retriable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Contract,
    Execution,
    Quality,
    Fatal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Contract => "contract",
            FailureKind::Execution => "execution",
            FailureKind::Quality => "quality",
            FailureKind::Fatal => "fatal",
        };
        write!(f, "{}", s)
    }
}

/// Error from one slot attempt, before the pipeline stamps slot and attempt
/// numbers onto it.
#[derive(Debug, Clone, Error)]
pub enum AttemptError {
    #[error("contract violation: {message}")]
    Contract {
        obligation: Option<&'static str>,
        message: String,
    },
    #[error("reference execution failed: {message}")]
    Execution {
        message: String,
        judge_stdout: String,
        judge_stderr: String,
    },
    #[error("tests too weak: {message}")]
    Quality {
        obligation: &'static str,
        message: String,
    },
    #[error("fatal: {message}")]
    Fatal { message: String },
}

impl AttemptError {
    pub fn contract(message: impl Into<String>) -> Self {
        AttemptError::Contract {
            obligation: None,
            message: message.into(),
        }
    }

    pub fn obligation(id: &'static str, message: impl Into<String>) -> Self {
        AttemptError::Contract {
            obligation: Some(id),
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        AttemptError::Fatal {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            AttemptError::Contract { .. } => FailureKind::Contract,
            AttemptError::Execution { .. } => FailureKind::Execution,
            AttemptError::Quality { .. } => FailureKind::Quality,
            AttemptError::Fatal { .. } => FailureKind::Fatal,
        }
    }

    pub fn obligation_id(&self) -> Option<&'static str> {
        match self {
            AttemptError::Contract { obligation, .. } => *obligation,
            AttemptError::Quality { obligation, .. } => Some(obligation),
            _ => None,
        }
    }

    /// One-line message safe for progress events: no code snippets, first
    /// line only.
    pub fn short_error(&self) -> String {
        let message = match self {
            AttemptError::Contract { message, .. } => message,
            AttemptError::Execution { message, .. } => message,
            AttemptError::Quality { message, .. } => message,
            AttemptError::Fatal { message } => message,
        };
        message.lines().next().unwrap_or("").to_string()
    }
}

/// The single user-visible failure for a run: the first slot that exhausted
/// its budget, with a redacted one-line message. Full diagnostics live only
/// in the progress stream.
#[derive(Debug, Clone, Error)]
#[error("slot {slot_index} failed after {attempts} attempt(s) ({kind}): {short_error}")]
pub struct SlotFailure {
    pub slot_index: usize,
    pub attempts: usize,
    pub kind: FailureKind,
    pub obligation_id: Option<&'static str>,
    pub short_error: String,
}
