//! One-shot LLM repair of an invalid test suite.
//!
//! Authorized only when the suite is the draft's *sole* validation failure.
//! The repair call gets the prior suite and the structured reason, must
//! answer `{"test_suite": "..."}`, and its output is re-validated by the
//! caller. One attempt per slot attempt; further failures become a contract
//! failure.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::llm::extract::extract_json_object;
use crate::llm::prompts;
use crate::llm::LlmClient;
use crate::spec::ProblemSlot;

#[derive(Debug, Deserialize)]
struct RepairResponse {
    test_suite: String,
}

pub struct TestSuiteRepairer<'a> {
    client: &'a dyn LlmClient,
}

impl<'a> TestSuiteRepairer<'a> {
    pub fn new(client: &'a dyn LlmClient) -> Self {
        Self { client }
    }

    /// Ask the model to rewrite the suite against the fixed contract.
    /// Returns the replacement suite text; the caller re-validates it.
    pub async fn repair(
        &self,
        slot: &ProblemSlot,
        invalid_suite: &str,
        reason: &str,
    ) -> Result<String> {
        info!(
            "Repairing test suite for slot {} ({})",
            slot.index, reason
        );

        let request = prompts::test_suite_repair(slot, invalid_suite, reason);
        let raw = self.client.complete(&request).await?;

        let json = extract_json_object(&raw)
            .context("test suite repair response carried no JSON object")?;
        let response: RepairResponse = serde_json::from_str(json)
            .context("test suite repair response did not match {\"test_suite\": ...}")?;

        if response.test_suite.trim().is_empty() {
            warn!("Test suite repair returned an empty suite");
            anyhow::bail!("test suite repair returned an empty suite");
        }

        Ok(response.test_suite)
    }
}
