//! The LLM client seam. The pipeline treats model output as bytes; all JSON
//! parsing happens on this side of the trait, and implementations must not
//! retry internally.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

/// One completion call. `system` fixes the contract, `user` carries the slot
/// payload.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: None,
            max_tokens: None,
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

impl std::fmt::Debug for dyn LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn LlmClient")
    }
}

/// Test double that replays queued responses in order and records every
/// request it saw. Exhausting the queue is an error, which surfaces as a
/// fatal transport failure in the pipeline.
pub struct ScriptedLlmClient {
    queue: Mutex<VecDeque<String>>,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlmClient {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            queue: Mutex::new(responses.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn remaining(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
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
            Some(response) => Ok(response),
            None => bail!("ScriptedLlmClient exhausted: no response queued"),
        }
    }
}

/// Canned client for dry runs. Answers Python generation prompts with a
/// small fixed draft; anything else gets rejected so a dry run never
/// pretends to cover languages it cannot.
pub struct MockLlmClient;

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self
    }
}

const MOCK_PYTHON_STDOUT_DRAFT: &str = r#"{
  "title": "Echo Reversed",
  "description": "Print the input string reversed.",
  "starter_code": "def solve(s):\n    # TODO: implement\n    pass\n",
  "reference_solution": "def solve(s):\n    print(s[::-1])\n",
  "test_suite": "from solution import solve\n\ndef test_case_1(capsys):\n    solve('ab')\n    assert capsys.readouterr().out == 'ba\\n'\n\ndef test_case_2(capsys):\n    solve('x')\n    assert capsys.readouterr().out == 'x\\n'\n\ndef test_case_3(capsys):\n    solve('abc')\n    assert capsys.readouterr().out == 'cba\\n'\n\ndef test_case_4(capsys):\n    solve('ok')\n    assert capsys.readouterr().out == 'ko\\n'\n\ndef test_case_5(capsys):\n    solve('aa')\n    assert capsys.readouterr().out == 'aa\\n'\n\ndef test_case_6(capsys):\n    solve('race')\n    assert capsys.readouterr().out == 'ecar\\n'\n\ndef test_case_7(capsys):\n    solve('12345')\n    assert capsys.readouterr().out == '54321\\n'\n\ndef test_case_8(capsys):\n    solve('drill')\n    assert capsys.readouterr().out == 'llird\\n'\n",
  "sample_inputs": ["ab", "abc"],
  "sample_outputs": ["ba", "cba"]
}"#;

const MOCK_PYTHON_RETURN_DRAFT: &str = r#"{
  "title": "Reverse String",
  "description": "Return the input string reversed.",
  "starter_code": "def solve(s):\n    # TODO: implement\n    pass\n",
  "reference_solution": "def solve(s):\n    return s[::-1]\n",
  "test_suite": "from solution import solve\n\ndef test_case_1():\n    assert solve('ab') == 'ba'\n\ndef test_case_2():\n    assert solve('x') == 'x'\n\ndef test_case_3():\n    assert solve('abc') == 'cba'\n\ndef test_case_4():\n    assert solve('ok') == 'ko'\n\ndef test_case_5():\n    assert solve('aa') == 'aa'\n\ndef test_case_6():\n    assert solve('race') == 'ecar'\n\ndef test_case_7():\n    assert solve('12345') == '54321'\n\ndef test_case_8():\n    assert solve('drill') == 'llird'\n",
  "sample_inputs": ["ab", "abc"],
  "sample_outputs": ["ba", "cba"]
}"#;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let prompt = format!("{}\n{}", request.system, request.user);
        if prompt.contains("Language: python") {
            if prompt.contains("Style: stdout") || prompt.contains("Style: mixed") {
                Ok(MOCK_PYTHON_STDOUT_DRAFT.to_string())
            } else {
                Ok(MOCK_PYTHON_RETURN_DRAFT.to_string())
            }
        } else {
            bail!("MockLlmClient only supports python dry runs")
        }
    }
}
