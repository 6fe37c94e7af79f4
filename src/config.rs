use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::spec::TEST_CASE_COUNT;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub judge: JudgeConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// For OpenAI-compatible endpoints (ollama and similar).
    #[serde(default)]
    pub base_url: Option<String>,

    /// Optional: override max_tokens for LLM requests. Provider defaults
    /// otherwise: anthropic/openai 8192, openai-compatible 16384.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key_env: None,
            base_url: None,
            max_tokens: None,
        }
    }
}

impl LlmConfig {
    pub fn get_max_tokens(&self) -> u32 {
        if let Some(tokens) = self.max_tokens {
            return tokens;
        }
        match self.provider.as_str() {
            "anthropic" => 8192,
            "openai" => 8192,
            "openai-compatible" => 16384,
            _ => 8192,
        }
    }

    pub fn get_api_key(&self) -> Result<String> {
        match &self.api_key_env {
            Some(var) => env::var(var)
                .with_context(|| format!("API key not found in environment variable: {}", var)),
            None => Ok(String::new()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// Base URL of the judge service.
    #[serde(default = "default_judge_url")]
    pub base_url: String,

    /// Timeout per judge call in milliseconds.
    #[serde(default = "default_judge_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            base_url: default_judge_url(),
            timeout_ms: default_judge_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Attempts per slot before the run fails (default 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts_per_slot: usize,

    /// Fixed at 8 for v1; kept here so the wire shape is explicit.
    #[serde(default = "default_test_case_count")]
    pub test_case_count: usize,

    /// Downgrade a failing hard slot to medium when the user did not
    /// explicitly ask for hard (default true).
    #[serde(default = "default_true")]
    pub soft_fallback_enabled: bool,

    /// Timeout per LLM call in milliseconds. An expired LLM call is a
    /// transport failure, not a content failure.
    #[serde(default = "default_llm_timeout_ms")]
    pub llm_timeout_ms: u64,

    /// Include test-suite text in progress diagnostics (debug only).
    #[serde(default)]
    pub trace_test_suites: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts_per_slot: default_max_attempts(),
            test_case_count: default_test_case_count(),
            soft_fallback_enabled: true,
            llm_timeout_ms: default_llm_timeout_ms(),
            trace_test_suites: false,
        }
    }
}

fn default_provider() -> String {
    "anthropic".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_judge_url() -> String {
    "http://localhost:8799".to_string()
}

fn default_judge_timeout_ms() -> u64 {
    90_000
}

fn default_max_attempts() -> usize {
    3
}

fn default_test_case_count() -> usize {
    TEST_CASE_COUNT
}

fn default_llm_timeout_ms() -> u64 {
    60_000
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration: an explicit path, else `./drillsmith.toml`, else
    /// the user config directory, else built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let local = PathBuf::from("drillsmith.toml");
        if local.exists() {
            return Self::from_file(&local);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user = config_dir.join("drillsmith").join("config.toml");
            if user.exists() {
                return Self::from_file(&user);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Config::default())
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}
