//! Reference-solution execution: one judge call per completed draft.
//!
//! Pass/fail is binary here. On failure the judge's stdout/stderr travel
//! upward (truncated) so the repair prompt can quote real assertion
//! failures. The executor itself never retries; the pipeline decides.

use std::time::Duration;

use tracing::{info, warn};

use crate::draft::{AttemptError, ProblemDraft};
use crate::judge::{JudgeAdapter, JudgeRequest, JudgeResult};
use crate::util::truncate_bytes;

/// Byte budget for the judge transcript snippets forwarded to repairs.
pub const JUDGE_OUTPUT_BUDGET: usize = 4096;

pub struct ReferenceExecutor<'a> {
    judge: &'a dyn JudgeAdapter,
    timeout: Duration,
}

impl<'a> ReferenceExecutor<'a> {
    pub fn new(judge: &'a dyn JudgeAdapter, timeout: Duration) -> Self {
        Self { judge, timeout }
    }

    /// Run the reference solution against the draft's own test suite.
    pub async fn execute(&self, draft: &ProblemDraft) -> Result<JudgeResult, AttemptError> {
        let request = match &draft.reference_workspace {
            Some(files) => JudgeRequest::Files {
                files: files.clone(),
                test_suite: draft.test_suite.clone(),
            },
            None => JudgeRequest::Code {
                code: draft.reference_solution.clone(),
                test_suite: draft.test_suite.clone(),
            },
        };

        info!("Executing reference solution for draft {}", draft.id);

        let result = match tokio::time::timeout(self.timeout, self.judge.judge(&request)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                return Err(AttemptError::fatal(format!("judge transport failed: {}", e)))
            }
            Err(_) => {
                return Err(AttemptError::Execution {
                    message: format!("judge call timed out after {:?}", self.timeout),
                    judge_stdout: String::new(),
                    judge_stderr: String::new(),
                })
            }
        };

        if result.timed_out {
            return Err(AttemptError::Execution {
                message: "reference solution timed out in the judge".to_string(),
                judge_stdout: truncate_bytes(&result.stdout, JUDGE_OUTPUT_BUDGET),
                judge_stderr: truncate_bytes(&result.stderr, JUDGE_OUTPUT_BUDGET),
            });
        }

        if !result.success {
            warn!(
                "Reference solution failed its own tests ({} failed)",
                result.failed_tests.len()
            );
            return Err(AttemptError::Execution {
                message: format!(
                    "reference solution failed its own tests (exit {})",
                    result.exit_code
                ),
                judge_stdout: truncate_bytes(&result.stdout, JUDGE_OUTPUT_BUDGET),
                judge_stderr: truncate_bytes(&result.stderr, JUDGE_OUTPUT_BUDGET),
            });
        }

        Ok(result)
    }
}
