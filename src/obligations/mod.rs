//! Per-language structural obligations.
//!
//! Each obligation is a named pure predicate over draft source text. The
//! checker evaluates them in a fixed order and stops at the first violation,
//! which becomes a `contract` failure carrying the obligation id. Obligations
//! run *after* mechanical rewrites, so a rewrite that fixes a violation (a
//! renamed test class, a demoted extra public type) is already visible here.

pub mod cpp;
pub mod java;
pub mod python;
pub mod sql;

use crate::draft::{AttemptError, ObligationResult, ProblemDraft};
use crate::spec::{Language, ProblemSlot};

// Java
pub const JAVA_SINGLE_PUBLIC_TYPE: &str = "java.single_public_type_per_unit";
pub const JAVA_PRIMARY_TYPE_MATCHES: &str = "java.primary_type_matches_target";
pub const JAVA_TEST_CLASS_MATCHES: &str = "java.test_class_matches_target";
pub const JAVA_NO_WHILE_FALSE: &str = "java.no_while_false";
pub const JAVA_STDOUT_SOLUTION_PRINTS: &str = "java.stdout_solution_prints";
pub const JAVA_STDOUT_TESTS_CAPTURE: &str = "java.stdout_tests_capture";
pub const JAVA_STDIN_TESTS_PROVIDE: &str = "java.stdin_tests_provide";
pub const JAVA_STDIN_REQUIRES_MAIN: &str = "java.stdin_requires_main";
pub const JAVA_STDIN_STRUCTURAL_CLASH: &str = "java.stdin_disallowed_for_structural_topics";
pub const JAVA_TOPIC_POLYMORPHISM: &str = "java.structural_topic.polymorphism";
pub const JAVA_TOPIC_INHERITANCE: &str = "java.structural_topic.inheritance";
pub const JAVA_TOPIC_ABSTRACTION: &str = "java.structural_topic.abstraction";
pub const JAVA_TOPIC_ENCAPSULATION: &str = "java.structural_topic.encapsulation";
pub const JAVA_TOPIC_COMPOSITION: &str = "java.structural_topic.composition";

// Python
pub const PY_DEFINES_SOLVE: &str = "python.reference_defines_solve";
pub const PY_NO_DISALLOWED_IMPORTS: &str = "python.no_disallowed_imports";
pub const PY_NO_EVAL_EXEC: &str = "python.no_eval_exec";
pub const PY_RETURN_TESTS_ASSERT: &str = "python.return_tests_assert_solve";
pub const PY_STDOUT_SOLUTION_PRINTS: &str = "python.stdout_solution_prints";
pub const PY_STDOUT_TESTS_CAPTURE: &str = "python.stdout_tests_capture";

// C++
pub const CPP_DEFINES_SOLVE: &str = "cpp.reference_defines_solve";
pub const CPP_TESTS_INCLUDE_SOLUTION: &str = "cpp.tests_include_solution";
pub const CPP_TESTS_DEFINE_MAIN: &str = "cpp.tests_define_main";
pub const CPP_STDOUT_SOLUTION_PRINTS: &str = "cpp.stdout_solution_prints";
pub const CPP_STDOUT_TESTS_CAPTURE: &str = "cpp.stdout_tests_capture";

// SQL
pub const SQL_REFERENCE_IS_QUERY: &str = "sql.reference_is_query";

// Cross-language
pub const TESTS_REJECT_BASELINES: &str = "tests.reject_baselines";
pub const RETRY_SUBSTANTIVE_CHANGE: &str = "retry.substantive_change_required";

/// OOP topics that demand a structural shape from a Java reference. A slot
/// tagged with one of these cannot be a stdin-driven program.
pub const STRUCTURAL_TOPICS: &[&str] = &[
    "encapsulation",
    "inheritance",
    "polymorphism",
    "abstraction",
    "composition",
];

/// The slot's structural topic, when one of its tags names one.
pub fn structural_topic(slot: &ProblemSlot) -> Option<&'static str> {
    for topic in &slot.topics {
        let lower = topic.to_lowercase();
        if let Some(found) = STRUCTURAL_TOPICS.iter().find(|t| lower.contains(*t)) {
            return Some(found);
        }
    }
    None
}

/// Evaluate every obligation applicable to the draft. Returns the full list
/// of passed results, or the first violation as a typed contract error.
pub fn check(draft: &ProblemDraft, slot: &ProblemSlot) -> Result<Vec<ObligationResult>, AttemptError> {
    match slot.language {
        Language::Java => java::check(draft, slot),
        Language::Python => python::check(draft, slot),
        Language::Cpp => cpp::check(draft, slot),
        Language::Sql => sql::check(draft, slot),
    }
}

/// Helper shared by the per-language modules: push a passing result or
/// short-circuit with the violation.
pub(crate) fn require(
    results: &mut Vec<ObligationResult>,
    id: &'static str,
    ok: bool,
    message: impl Into<String>,
) -> Result<(), AttemptError> {
    if ok {
        results.push(ObligationResult::ok(id));
        Ok(())
    } else {
        let message = message.into();
        Err(AttemptError::obligation(id, message))
    }
}
