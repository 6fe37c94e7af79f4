//! Activity specification: the validated input the dialogue layer hands to
//! the generation pipeline.

use std::str::FromStr;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Hard cap on problems per activity.
pub const MAX_PROBLEM_COUNT: usize = 7;

/// Fixed test-case count for v1 activities.
pub const TEST_CASE_COUNT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Java,
    Python,
    Cpp,
    Sql,
}

impl Language {
    pub fn as_str(&self) -> &str {
        match self {
            Language::Java => "java",
            Language::Python => "python",
            Language::Cpp => "cpp",
            Language::Sql => "sql",
        }
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "java" => Ok(Language::Java),
            "python" | "py" => Ok(Language::Python),
            "cpp" | "c++" | "cxx" => Ok(Language::Cpp),
            "sql" => Ok(Language::Sql),
            _ => bail!("Unknown language: {}", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemStyle {
    Return,
    Stdout,
    Mixed,
}

impl ProblemStyle {
    pub fn as_str(&self) -> &str {
        match self {
            ProblemStyle::Return => "return",
            ProblemStyle::Stdout => "stdout",
            ProblemStyle::Mixed => "mixed",
        }
    }

    /// Stdout and mixed problems both print; return problems never do.
    pub fn prints(&self) -> bool {
        !matches!(self, ProblemStyle::Return)
    }
}

/// One entry of the difficulty plan: `count` problems at `difficulty`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifficultyPhase {
    pub difficulty: Difficulty,
    pub count: usize,
}

/// The activity request produced by the dialogue layer. Immutable while the
/// pipeline runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivitySpec {
    pub language: Language,
    pub problem_count: usize,
    pub difficulty_plan: Vec<DifficultyPhase>,
    pub topic_tags: Vec<String>,
    pub problem_style: ProblemStyle,
    /// Language-specific canonical constraint string, copied verbatim into
    /// every slot.
    pub constraints: String,
    #[serde(default = "default_test_case_count")]
    pub test_case_count: usize,
    /// Set by the dialogue layer when the user literally asked for hard
    /// problems. Gates the soft-fallback policy.
    #[serde(default)]
    pub explicit_hard_requested: bool,
    /// Optional guided subset of topic_tags to round-robin over instead.
    #[serde(default)]
    pub focus_concepts: Vec<String>,
}

fn default_test_case_count() -> usize {
    TEST_CASE_COUNT
}

impl ActivitySpec {
    /// Validate the spec's internal constraints. A failing spec is a caller
    /// bug, not a retriable generation failure.
    pub fn validate(&self) -> Result<()> {
        if self.problem_count == 0 || self.problem_count > MAX_PROBLEM_COUNT {
            bail!(
                "problem_count must be in [1, {}], got {}",
                MAX_PROBLEM_COUNT,
                self.problem_count
            );
        }
        if self.difficulty_plan.is_empty() {
            bail!("difficulty_plan must not be empty");
        }
        if self.difficulty_plan.iter().any(|p| p.count == 0) {
            bail!("difficulty_plan entries must have count >= 1");
        }
        let planned: usize = self.difficulty_plan.iter().map(|p| p.count).sum();
        if planned != self.problem_count {
            bail!(
                "difficulty_plan sums to {} but problem_count is {}",
                planned,
                self.problem_count
            );
        }
        if self.topic_tags.is_empty() || self.topic_tags.iter().any(|t| t.trim().is_empty()) {
            bail!("topic_tags must be a non-empty list of non-empty tags");
        }
        if self.test_case_count != TEST_CASE_COUNT {
            bail!(
                "test_case_count is fixed at {} in v1, got {}",
                TEST_CASE_COUNT,
                self.test_case_count
            );
        }
        for concept in &self.focus_concepts {
            if !self.topic_tags.contains(concept) {
                bail!("focus_concept {:?} is not one of topic_tags", concept);
            }
        }
        Ok(())
    }
}

/// One problem-generation unit carved out of an ActivitySpec. Immutable once
/// produced by the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemSlot {
    pub index: usize,
    pub language: Language,
    pub difficulty: Difficulty,
    /// Primary topic, plus a secondary topic for hard slots when available.
    pub topics: Vec<String>,
    pub problem_style: ProblemStyle,
    pub constraints: String,
    pub test_case_count: usize,
}

impl ProblemSlot {
    pub fn primary_topic(&self) -> &str {
        self.topics.first().map(String::as_str).unwrap_or("")
    }
}
