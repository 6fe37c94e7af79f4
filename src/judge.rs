//! The sandboxed judge, consumed by interface only.
//!
//! The judge itself (container build, filesystem layout, resource limits) is
//! an external collaborator. The core talks to it through [`JudgeAdapter`]
//! and requires only that identical inputs produce identical verdicts.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// What to run. `Program` executes a main entry point against the given
/// stdin and is used to rebuild stdin-driven Java test suites from samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JudgeRequest {
    Code {
        code: String,
        test_suite: String,
    },
    Files {
        files: BTreeMap<String, String>,
        test_suite: String,
    },
    Program {
        code: String,
        stdin: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeResult {
    pub success: bool,
    #[serde(default)]
    pub passed_tests: Vec<String>,
    #[serde(default)]
    pub failed_tests: Vec<String>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub execution_time_ms: u64,
    #[serde(default)]
    pub exit_code: i32,
    #[serde(default)]
    pub timed_out: bool,
}

impl JudgeResult {
    pub fn passing(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            passed_tests: Vec::new(),
            failed_tests: Vec::new(),
            stdout: stdout.into(),
            stderr: String::new(),
            execution_time_ms: 0,
            exit_code: 0,
            timed_out: false,
        }
    }

    pub fn failing(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            passed_tests: Vec::new(),
            failed_tests: Vec::new(),
            stdout: stdout.into(),
            stderr: stderr.into(),
            execution_time_ms: 0,
            exit_code: 1,
            timed_out: false,
        }
    }
}

#[async_trait]
pub trait JudgeAdapter: Send + Sync {
    async fn judge(&self, request: &JudgeRequest) -> Result<JudgeResult>;
}

// ============================================================================
// Remote judge service client
// ============================================================================

/// Thin client for a judge running as a service. The judge stays opaque: one
/// POST per request, one verdict per response.
pub struct RemoteJudge {
    base_url: String,
    client: Client,
}

impl RemoteJudge {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::builder()
                .timeout(timeout)
                .build()
                .context("failed to build HTTP client")?,
        })
    }
}

#[async_trait]
impl JudgeAdapter for RemoteJudge {
    async fn judge(&self, request: &JudgeRequest) -> Result<JudgeResult> {
        let url = format!("{}/judge", self.base_url);
        debug!("Submitting judge request to {}", url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .context("Failed to send request to judge service")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("Judge service error {}: {}", status, error_text);
        }

        response
            .json()
            .await
            .context("Failed to parse judge service response")
    }
}

// ============================================================================
// Offline judge (dry runs)
// ============================================================================

/// Dry-run stand-in: submissions that look like stubs fail, everything else
/// passes, program runs echo a fixed line. Good enough to exercise the whole
/// pipeline without a sandbox.
pub struct OfflineJudge;

fn looks_like_stub(code: &str) -> bool {
    let trimmed = code.trim();
    if trimmed.is_empty() || trimmed == "SELECT 1;" {
        return true;
    }
    if code.contains("TODO")
        || code.contains("UnsupportedOperationException")
        || code.contains("NotImplementedError")
        || code.contains("throw std::logic_error")
    {
        return true;
    }
    // Single-expression bodies that return a constant
    let last = trimmed.lines().last().map(str::trim).unwrap_or("");
    matches!(last, "pass" | "return 0" | "return 0;" | "print(0)")
}

#[async_trait]
impl JudgeAdapter for OfflineJudge {
    async fn judge(&self, request: &JudgeRequest) -> Result<JudgeResult> {
        let result = match request {
            JudgeRequest::Program { .. } => JudgeResult::passing("0\n"),
            JudgeRequest::Code { code, .. } => {
                if looks_like_stub(code) {
                    JudgeResult::failing("", "stub rejected")
                } else {
                    JudgeResult::passing("")
                }
            }
            JudgeRequest::Files { files, .. } => {
                if files.values().any(|c| looks_like_stub(c)) {
                    JudgeResult::failing("", "stub rejected")
                } else {
                    JudgeResult::passing("")
                }
            }
        };
        Ok(result)
    }
}

// ============================================================================
// Scripted judge (tests)
// ============================================================================

/// Test double that replays queued verdicts in order and records every
/// request it saw.
pub struct ScriptedJudge {
    queue: Mutex<VecDeque<JudgeResult>>,
    seen: Mutex<Vec<JudgeRequest>>,
}

impl ScriptedJudge {
    pub fn new(results: Vec<JudgeResult>) -> Self {
        Self {
            queue: Mutex::new(results.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<JudgeRequest> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn remaining(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl JudgeAdapter for ScriptedJudge {
    async fn judge(&self, request: &JudgeRequest) -> Result<JudgeResult> {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        let next = self
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match next {
            Some(result) => Ok(result),
            None => bail!("ScriptedJudge exhausted: no verdict queued for request"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_judge_rejects_stubs() {
        let judge = OfflineJudge;
        let stub = JudgeRequest::Code {
            code: "def solve(a, b):\n    pass".to_string(),
            test_suite: String::new(),
        };
        assert!(!judge.judge(&stub).await.unwrap().success);

        let real = JudgeRequest::Code {
            code: "def solve(a, b):\n    return a + b".to_string(),
            test_suite: String::new(),
        };
        assert!(judge.judge(&real).await.unwrap().success);
    }

    #[tokio::test]
    async fn test_offline_judge_rejects_trivial_sql() {
        let judge = OfflineJudge;
        let req = JudgeRequest::Code {
            code: "SELECT 1;".to_string(),
            test_suite: String::new(),
        };
        assert!(!judge.judge(&req).await.unwrap().success);
    }

    #[tokio::test]
    async fn test_scripted_judge_replays_in_order() {
        let judge = ScriptedJudge::new(vec![
            JudgeResult::passing("first"),
            JudgeResult::failing("", "second"),
        ]);
        let req = JudgeRequest::Program {
            code: "x".to_string(),
            stdin: String::new(),
        };
        assert!(judge.judge(&req).await.unwrap().success);
        assert!(!judge.judge(&req).await.unwrap().success);
        assert!(judge.judge(&req).await.is_err());
        assert_eq!(judge.requests().len(), 3);
    }

    #[test]
    fn test_judge_request_serializes_with_kind_tag() {
        let req = JudgeRequest::Code {
            code: "x".to_string(),
            test_suite: "t".to_string(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"kind\":\"code\""));
    }

    #[test]
    fn test_judge_result_deserializes_with_defaults() {
        let result: JudgeResult = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(result.success);
        assert!(result.passed_tests.is_empty());
        assert!(!result.timed_out);
    }
}
