//! Deterministic expansion of an ActivitySpec into an ordered slot list.
//!
//! No LLM involvement: the same spec always yields the same plan, which is
//! what makes progress events predictable and failures repeatable.

use anyhow::{bail, Result};
use tracing::debug;

use crate::spec::{ActivitySpec, Difficulty, ProblemSlot};

/// Expand the spec into its slots:
/// 1. difficulty phases sorted easy < medium < hard (stable),
/// 2. flattened into one difficulty per slot,
/// 3. topics assigned round-robin (over `focus_concepts` when provided),
///    with hard slots picking up a distinct secondary topic when one exists,
/// 4. language, style, constraints, and test_case_count copied verbatim.
///
/// A failure here is a programmer error in the caller, never retriable.
pub fn plan(spec: &ActivitySpec) -> Result<Vec<ProblemSlot>> {
    spec.validate()?;

    let mut phases = spec.difficulty_plan.clone();
    phases.sort_by_key(|p| p.difficulty);

    let difficulties: Vec<Difficulty> = phases
        .iter()
        .flat_map(|p| std::iter::repeat_n(p.difficulty, p.count))
        .collect();

    let pool: &[String] = if spec.focus_concepts.is_empty() {
        &spec.topic_tags
    } else {
        &spec.focus_concepts
    };

    let mut slots = Vec::with_capacity(difficulties.len());
    for (index, difficulty) in difficulties.iter().enumerate() {
        let primary = pool[index % pool.len()].clone();
        let mut topics = vec![primary.clone()];

        if *difficulty == Difficulty::Hard && pool.len() >= 2 {
            if let Some(secondary) = next_distinct_topic(pool, index, &primary) {
                topics.push(secondary);
            }
        }

        slots.push(ProblemSlot {
            index,
            language: spec.language,
            difficulty: *difficulty,
            topics,
            problem_style: spec.problem_style,
            constraints: spec.constraints.clone(),
            test_case_count: spec.test_case_count,
        });
    }

    validate_plan(spec, &slots)?;
    debug!("Planned {} slots", slots.len());
    Ok(slots)
}

/// Replacement slot for a soft fallback: same position and topics trimmed to
/// the primary, difficulty downgraded to medium.
pub fn downgrade_to_medium(slot: &ProblemSlot) -> ProblemSlot {
    ProblemSlot {
        index: slot.index,
        language: slot.language,
        difficulty: Difficulty::Medium,
        topics: vec![slot.primary_topic().to_string()],
        problem_style: slot.problem_style,
        constraints: slot.constraints.clone(),
        test_case_count: slot.test_case_count,
    }
}

/// The next round-robin tag distinct from `primary`, scanning forward until
/// a distinct one is found or only the primary remains.
fn next_distinct_topic(pool: &[String], index: usize, primary: &str) -> Option<String> {
    for step in 1..=pool.len() {
        let candidate = &pool[(index + step) % pool.len()];
        if candidate != primary {
            return Some(candidate.clone());
        }
    }
    None
}

fn validate_plan(spec: &ActivitySpec, slots: &[ProblemSlot]) -> Result<()> {
    if slots.len() != spec.problem_count {
        bail!(
            "plan produced {} slots for problem_count {}",
            slots.len(),
            spec.problem_count
        );
    }
    for (i, slot) in slots.iter().enumerate() {
        if slot.index != i {
            bail!("slot {} carries index {}", i, slot.index);
        }
        if slot.topics.is_empty() || slot.topics.len() > 2 {
            bail!("slot {} has {} topics", i, slot.topics.len());
        }
        if slot.constraints != spec.constraints {
            bail!("slot {} constraints drifted from the spec", i);
        }
    }
    // Difficulties must be monotonically non-decreasing after the sort
    for pair in slots.windows(2) {
        if pair[0].difficulty > pair[1].difficulty {
            bail!("plan difficulties are out of order");
        }
    }
    Ok(())
}
