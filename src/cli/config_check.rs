use std::env;
use std::path::Path;

use anyhow::Result;

use crate::config::Config;

struct CheckResult {
    passed: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl CheckResult {
    fn new() -> Self {
        Self {
            passed: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn pass(&mut self, msg: impl Into<String>) {
        self.passed.push(msg.into());
    }

    fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }
}

/// Diagnose the configuration: load it, sanity-check the provider, and
/// report whether the API key resolves. Always exits 0; this is a
/// diagnostic command, findings go to the user, not the exit code.
pub fn run(config_path: Option<String>) -> Result<()> {
    let mut results = CheckResult::new();

    let config = match Config::load(config_path.as_deref().map(Path::new)) {
        Ok(config) => {
            let source = config_path.as_deref().unwrap_or("default search path");
            results.pass(format!("Config loaded from {}", source));
            config
        }
        Err(e) => {
            results.error(format!("Failed to load config: {}", e));
            print_results(&results);
            return Ok(());
        }
    };

    let valid_providers = ["anthropic", "openai", "openai-compatible"];
    if valid_providers.contains(&config.llm.provider.as_str()) {
        results.pass(format!(
            "LLM provider: {} (model: {})",
            config.llm.provider, config.llm.model
        ));
    } else {
        results.error(format!(
            "Unknown LLM provider: {} (expected one of {})",
            config.llm.provider,
            valid_providers.join(", ")
        ));
    }

    match &config.llm.api_key_env {
        Some(var) => match env::var(var) {
            Ok(value) if !value.is_empty() => {
                results.pass(format!("API key present in ${}", var));
            }
            _ => results.error(format!("API key env var ${} is unset or empty", var)),
        },
        None => {
            if config.llm.provider == "openai-compatible" {
                results.pass("No API key configured (local endpoint)");
            } else {
                results.warn("No api_key_env configured; generation will fail without one");
            }
        }
    }

    if config.judge.base_url.starts_with("http://") || config.judge.base_url.starts_with("https://")
    {
        results.pass(format!("Judge endpoint: {}", config.judge.base_url));
    } else {
        results.error(format!(
            "Judge base_url does not look like a URL: {}",
            config.judge.base_url
        ));
    }

    if config.generation.max_attempts_per_slot == 0 {
        results.warn("max_attempts_per_slot is 0; treated as 1 at runtime");
    }

    print_results(&results);
    Ok(())
}

fn print_results(results: &CheckResult) {
    for msg in &results.passed {
        println!("  ok    {}", msg);
    }
    for msg in &results.warnings {
        println!("  warn  {}", msg);
    }
    for msg in &results.errors {
        println!("  error {}", msg);
    }
    if results.errors.is_empty() {
        println!("\nConfiguration looks usable.");
    } else {
        println!("\n{} problem(s) found.", results.errors.len());
    }
}
