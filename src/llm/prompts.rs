//! Prompt builders for the per-slot generation and repair calls.
//!
//! Every prompt pins the same output contract: a single JSON object, no
//! commentary, fields exactly as named. Validation downstream is
//! deterministic, so the contract text here is the only place the model
//! learns the rules it will be held to.

use super::client::CompletionRequest;
use crate::draft::ProblemDraft;
use crate::spec::{Language, ProblemSlot, ProblemStyle};

const OUTPUT_CONTRACT: &str = r#"Respond with ONE JSON object and nothing else. Fields:
- "title": short problem title
- "description": full problem statement in plain prose
- "starter_code": the scaffold handed to the learner (no solution logic)
- "reference_solution": a complete hidden solution
- "test_suite": the full test suite source
- "sample_inputs": array of sample input strings
- "sample_outputs": array of matching expected output strings
Do not wrap the JSON in markdown fences. Do not add commentary."#;

fn language_contract(language: Language, style: ProblemStyle, test_case_count: usize) -> String {
    match language {
        Language::Java => format!(
            r#"Java rules:
- Exactly one top-level public type per compilation unit.
- The test suite is a JUnit 5 class named <PrimaryType>Test.
- Never use while(false); javac rejects unreachable code.
- {}
- Tests must be deterministic: no randomness, no file or network I/O, no sleeping."#,
            match style {
                ProblemStyle::Return =>
                    "Return-style: the solution exposes methods and the tests assert on return values.",
                ProblemStyle::Stdout =>
                    "Stdout-style: the solution prints via System.out and the tests capture it with System.setOut.",
                ProblemStyle::Mixed =>
                    "Mixed-style: the solution both returns values and prints; tests assert on both, capturing System.out with System.setOut.",
            }
        ),
        Language::Python => format!(
            r#"Python rules:
- The solution defines solve(...). Never import os, pathlib, shutil, subprocess, socket, requests, urllib, http, ftplib, asyncio, or multiprocessing. Never use eval or exec.
- The test suite is pytest: exactly {count} functions named test_case_1 through test_case_{count}, importing solve from solution.
- {style}
- Tests must be deterministic: no randomness, no approximate comparisons, no file I/O."#,
            count = test_case_count,
            style = match style {
                ProblemStyle::Return => "Return-style: each test asserts solve(...) == expected.",
                ProblemStyle::Stdout =>
                    "Stdout-style: solve(...) prints; each test takes capsys and asserts on captured output.",
                ProblemStyle::Mixed =>
                    "Mixed-style: tests assert on return values and on capsys-captured output.",
            }
        ),
        Language::Cpp => format!(
            r#"C++ rules:
- The solution defines a free function solve(...).
- The test file starts with #include "solution.cpp", defines main, and declares exactly {count} cases via the variadic macro RUN_TEST("test_case_N", ...).
- {style}
- Tests must be deterministic: no rand(), no file streams, no approximate comparisons."#,
            count = test_case_count,
            style = match style {
                ProblemStyle::Return => "Return-style: cases assert on solve(...) return values.",
                ProblemStyle::Stdout =>
                    "Stdout-style: solve writes std::cout; cases capture it by swapping the stream buffer via rdbuf.",
                ProblemStyle::Mixed =>
                    "Mixed-style: cases assert on return values and on rdbuf-captured std::cout.",
            }
        ),
        Language::Sql => format!(
            r#"SQL rules:
- "reference_solution" is a single SELECT statement.
- "starter_code" is a comment scaffold for the learner's query.
- "test_suite" is a JSON document (as a string) with "schema_sql" (CREATE TABLE + INSERT statements) and "cases": exactly {count} ordered objects, each with "name" and "expected_rows" (array of row arrays)."#,
            count = test_case_count,
        ),
    }
}

fn slot_payload(slot: &ProblemSlot) -> String {
    let topics = slot.topics.join(", ");
    format!(
        r#"Language: {language}
Style: {style}
Difficulty: {difficulty}
Topics: {topics}
Constraints (if you emit a "constraints" field, copy this exactly): {constraints}
Test cases required: {count}"#,
        language = slot.language.as_str(),
        style = slot.problem_style.as_str(),
        difficulty = slot.difficulty.as_str(),
        topics = topics,
        constraints = slot.constraints,
        count = slot.test_case_count,
    )
}

/// Fresh generation prompt for one slot.
pub fn generation(slot: &ProblemSlot) -> CompletionRequest {
    let system = format!(
        r#"You write practice programming problems for learners. Each problem must be self-contained, solvable, and come with a test suite strong enough to fail a do-nothing stub.

{contract}

{language_rules}"#,
        contract = OUTPUT_CONTRACT,
        language_rules = language_contract(slot.language, slot.problem_style, slot.test_case_count),
    );
    let user = format!(
        "Create one {} practice problem.\n\n{}",
        slot.difficulty.as_str(),
        slot_payload(slot)
    );
    CompletionRequest::new(system, user)
}

/// Retry prompt after a deterministic validation failure. The previous raw
/// output and the structured reason are included so the model fixes rather
/// than regenerates blindly.
pub fn contract_repair(slot: &ProblemSlot, previous_raw: &str, error: &str) -> CompletionRequest {
    let mut request = generation(slot);
    request.user = format!(
        r#"Your previous attempt failed deterministic validation.

VALIDATION ERROR:
{error}

PREVIOUS OUTPUT:
{previous}

Produce a corrected problem for the same slot. Fix the validation error; change whatever else the fix requires, and keep the rest intact.

{payload}"#,
        error = error,
        previous = previous_raw,
        payload = slot_payload(slot),
    );
    request
}

/// Retry prompt after the anti-baseline gate found the tests too weak.
pub fn quality_repair(slot: &ProblemSlot, previous_raw: &str, error: &str) -> CompletionRequest {
    let mut request = generation(slot);
    request.user = format!(
        r#"Your previous attempt produced a test suite too weak to reject trivial solutions.

WEAKNESS:
{error}

PREVIOUS OUTPUT:
{previous}

Produce a corrected problem for the same slot. Strengthen the tests so a constant-returning stub and the unmodified starter scaffold both fail. Vary inputs and expected outputs across cases.

{payload}"#,
        error = error,
        previous = previous_raw,
        payload = slot_payload(slot),
    );
    request
}

/// Targeted repair: rewrite only the reference solution so the existing test
/// suite passes. Any other field in the response is ignored.
pub fn reference_repair(
    slot: &ProblemSlot,
    draft: &ProblemDraft,
    judge_stdout: &str,
    judge_stderr: &str,
) -> CompletionRequest {
    let system = format!(
        r#"You fix reference solutions for practice problems. The test suite is correct and frozen; only the reference solution may change.

Respond with ONE JSON object: {{"reference_solution": "..."}}. Nothing else.

{language_rules}"#,
        language_rules = language_contract(slot.language, slot.problem_style, slot.test_case_count),
    );
    let user = format!(
        r#"The reference solution fails its own test suite.

TEST SUITE (frozen, do not restate):
{tests}

CURRENT REFERENCE SOLUTION:
{reference}

JUDGE STDOUT:
{stdout}

JUDGE STDERR:
{stderr}

Rewrite the reference solution so every test passes. Return only the JSON object.

{payload}"#,
        tests = draft.test_suite,
        reference = draft.reference_solution,
        stdout = judge_stdout,
        stderr = judge_stderr,
        payload = slot_payload(slot),
    );
    CompletionRequest::new(system, user)
}

/// One-shot test-suite repair against a fixed contract. Authorized only when
/// the suite is the draft's sole validation failure.
pub fn test_suite_repair(slot: &ProblemSlot, invalid_suite: &str, reason: &str) -> CompletionRequest {
    let system = format!(
        r#"You repair test suites for practice problems. The problem, starter code, and reference solution are frozen; only the test suite may change.

Respond with ONE JSON object: {{"test_suite": "..."}}. Nothing else.

{language_rules}"#,
        language_rules = language_contract(slot.language, slot.problem_style, slot.test_case_count),
    );
    let user = format!(
        r#"This test suite failed shape validation.

VALIDATION ERROR:
{reason}

CURRENT TEST SUITE:
{suite}

Rewrite the test suite to satisfy the contract. Return only the JSON object.

{payload}"#,
        reason = reason,
        suite = invalid_suite,
        payload = slot_payload(slot),
    );
    CompletionRequest::new(system, user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Difficulty;

    fn slot(language: Language, style: ProblemStyle) -> ProblemSlot {
        ProblemSlot {
            index: 0,
            language,
            difficulty: Difficulty::Medium,
            topics: vec!["strings".to_string()],
            problem_style: style,
            constraints: "1 <= n <= 100".to_string(),
            test_case_count: 8,
        }
    }

    #[test]
    fn test_generation_prompt_carries_slot_facts() {
        let request = generation(&slot(Language::Python, ProblemStyle::Stdout));
        assert!(request.user.contains("Language: python"));
        assert!(request.user.contains("Style: stdout"));
        assert!(request.user.contains("1 <= n <= 100"));
        assert!(request.system.contains("test_case_1 through test_case_8"));
    }

    #[test]
    fn test_java_rules_mention_junit_naming() {
        let request = generation(&slot(Language::Java, ProblemStyle::Return));
        assert!(request.system.contains("<PrimaryType>Test"));
        assert!(request.system.contains("while(false)"));
    }

    #[test]
    fn test_cpp_rules_mention_run_test_macro() {
        let request = generation(&slot(Language::Cpp, ProblemStyle::Return));
        assert!(request.system.contains("RUN_TEST"));
        assert!(request.system.contains("solution.cpp"));
    }

    #[test]
    fn test_contract_repair_includes_error_and_previous() {
        let request = contract_repair(
            &slot(Language::Java, ProblemStyle::Return),
            "{old draft}",
            "test class misnamed",
        );
        assert!(request.user.contains("test class misnamed"));
        assert!(request.user.contains("{old draft}"));
    }

    #[test]
    fn test_reference_repair_freezes_tests() {
        let draft = ProblemDraft {
            id: "p".to_string(),
            title: "t".to_string(),
            description: "d".to_string(),
            language: Language::Java,
            difficulty: Difficulty::Medium,
            topic_tag: "strings".to_string(),
            problem_style: ProblemStyle::Return,
            starter_code: "public class A {}".to_string(),
            test_suite: "public class ATest {}".to_string(),
            reference_solution: "public class A { int f() { return 1; } }".to_string(),
            workspace: None,
            reference_workspace: None,
            constraints: String::new(),
            sample_inputs: vec![],
            sample_outputs: vec![],
            rewrites: vec![],
        };
        let request = reference_repair(
            &slot(Language::Java, ProblemStyle::Return),
            &draft,
            "expected 2 but was 1",
            "",
        );
        assert!(request.system.contains("\"reference_solution\""));
        assert!(request.user.contains("expected 2 but was 1"));
        assert!(request.user.contains("public class ATest {}"));
    }

    #[test]
    fn test_suite_repair_prompt_shape() {
        let request = test_suite_repair(
            &slot(Language::Python, ProblemStyle::Return),
            "def test_one(): pass",
            "expected 8 test_case_N functions, found 0",
        );
        assert!(request.system.contains("\"test_suite\""));
        assert!(request.user.contains("expected 8 test_case_N functions"));
    }
}
