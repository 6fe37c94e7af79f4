//! The anti-baseline gate: a test suite only counts if it separates a
//! correct solution from degenerate code.
//!
//! Two baselines per draft go to the judge with the draft's own suite: the
//! starter scaffold as emitted, and a language-appropriate trivial constant
//! (Java gets only the starter; its scaffold is already a minimal stub).
//! Every baseline must fail; any baseline passing fails the slot with a
//! `quality` error on `tests.reject_baselines`.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::draft::{AttemptError, ProblemDraft};
use crate::judge::{JudgeAdapter, JudgeRequest};
use crate::obligations::TESTS_REJECT_BASELINES;
use crate::scanner::CppScanner;
use crate::spec::Language;

pub struct TestStrengthGate<'a> {
    judge: &'a dyn JudgeAdapter,
    timeout: Duration,
}

impl<'a> TestStrengthGate<'a> {
    pub fn new(judge: &'a dyn JudgeAdapter, timeout: Duration) -> Self {
        Self { judge, timeout }
    }

    /// Submit every baseline; all must fail.
    pub async fn enforce(&self, draft: &ProblemDraft) -> Result<(), AttemptError> {
        let baselines = self.baselines(draft);
        info!(
            "Strength gate: submitting {} baseline(s) for draft {}",
            baselines.len(),
            draft.id
        );

        for (name, request) in baselines {
            debug!("Strength gate: running baseline '{}'", name);
            let result = match tokio::time::timeout(self.timeout, self.judge.judge(&request)).await
            {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    return Err(AttemptError::fatal(format!("judge transport failed: {}", e)))
                }
                Err(_) => {
                    return Err(AttemptError::Execution {
                        message: format!(
                            "judge call timed out after {:?} on baseline '{}'",
                            self.timeout, name
                        ),
                        judge_stdout: String::new(),
                        judge_stderr: String::new(),
                    })
                }
            };

            if result.success {
                warn!("Baseline '{}' passed the test suite", name);
                return Err(AttemptError::Quality {
                    obligation: TESTS_REJECT_BASELINES,
                    message: format!(
                        "baseline '{}' passed the test suite; tests are too weak",
                        name
                    ),
                });
            }
        }

        Ok(())
    }

    fn baselines(&self, draft: &ProblemDraft) -> Vec<(&'static str, JudgeRequest)> {
        let mut baselines = Vec::new();

        let starter = match &draft.workspace {
            Some(files) => JudgeRequest::Files {
                files: files.clone(),
                test_suite: draft.test_suite.clone(),
            },
            None => JudgeRequest::Code {
                code: draft.starter_code.clone(),
                test_suite: draft.test_suite.clone(),
            },
        };
        baselines.push(("starter_scaffold", starter));

        if let Some(trivial) = trivial_baseline(draft) {
            baselines.push((
                "trivial_constant",
                JudgeRequest::Code {
                    code: trivial,
                    test_suite: draft.test_suite.clone(),
                },
            ));
        }

        baselines
    }
}

/// The language-specific constant-returning candidate. Java has none: its
/// starter scaffold is already a minimal stub.
fn trivial_baseline(draft: &ProblemDraft) -> Option<String> {
    match draft.language {
        Language::Java => None,
        Language::Python => Some(if draft.problem_style.prints() {
            "def solve(*args, **kwargs):\n    print(0)\n".to_string()
        } else {
            "def solve(*args, **kwargs):\n    return 0\n".to_string()
        }),
        Language::Cpp => {
            let scanner = CppScanner::new(&draft.reference_solution);
            let signature = scanner.solve_signature()?;
            let mut body = String::new();
            if draft.problem_style.prints() {
                body.push_str("    std::cout << 0 << \"\\n\";\n");
            }
            if !signature.is_void() {
                body.push_str("    return {};\n");
            }
            Some(format!(
                "#include <iostream>\n\n{} solve({}) {{\n{}}}\n",
                signature.return_type, signature.params, body
            ))
        }
        Language::Sql => Some("SELECT 1;".to_string()),
    }
}
