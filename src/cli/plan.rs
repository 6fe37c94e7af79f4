use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::planner;
use crate::spec::ActivitySpec;

/// Print the deterministic slot plan for a spec file without calling any
/// collaborator.
pub fn run(spec_path: String) -> Result<()> {
    let content = fs::read_to_string(Path::new(&spec_path))
        .with_context(|| format!("Failed to read spec file: {}", spec_path))?;
    let spec: ActivitySpec =
        serde_json::from_str(&content).context("Failed to parse activity spec")?;

    let slots = planner::plan(&spec)?;

    println!(
        "Plan for {} ({} problems, style {}):",
        spec.language.as_str(),
        spec.problem_count,
        spec.problem_style.as_str()
    );
    for slot in &slots {
        println!(
            "  slot {:>2}  {:<6}  topics: {}",
            slot.index,
            slot.difficulty.as_str(),
            slot.topics.join(" + ")
        );
    }
    Ok(())
}
