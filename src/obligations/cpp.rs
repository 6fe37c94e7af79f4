//! C++ structural obligations: a `solve` definition, the test harness shape,
//! and stdout capture for printing styles.

use super::*;
use crate::draft::{AttemptError, ObligationResult, ProblemDraft};
use crate::scanner::CppScanner;
use crate::spec::ProblemSlot;

pub fn check(
    draft: &ProblemDraft,
    slot: &ProblemSlot,
) -> Result<Vec<ObligationResult>, AttemptError> {
    let mut results = Vec::new();

    let reference = CppScanner::new(&draft.reference_solution);
    let tests = CppScanner::new(&draft.test_suite);

    require(
        &mut results,
        CPP_DEFINES_SOLVE,
        reference.solve_signature().is_some(),
        "reference never defines a top-level solve(...)",
    )?;

    require(
        &mut results,
        CPP_TESTS_INCLUDE_SOLUTION,
        draft.test_suite.contains("#include \"solution.cpp\""),
        "test file must #include \"solution.cpp\"",
    )?;

    require(
        &mut results,
        CPP_TESTS_DEFINE_MAIN,
        tests.defines_main(),
        "test file must define main",
    )?;

    if slot.problem_style.prints() {
        require(
            &mut results,
            CPP_STDOUT_SOLUTION_PRINTS,
            reference.writes_stdout(),
            "stdout-style reference never writes std::cout",
        )?;
        require(
            &mut results,
            CPP_STDOUT_TESTS_CAPTURE,
            tests.masked().contains("rdbuf"),
            "stdout-style tests must capture std::cout via rdbuf redirection",
        )?;
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Difficulty, Language, ProblemStyle};

    fn slot(style: ProblemStyle) -> ProblemSlot {
        ProblemSlot {
            index: 0,
            language: Language::Cpp,
            difficulty: Difficulty::Easy,
            topics: vec!["math".to_string()],
            problem_style: style,
            constraints: String::new(),
            test_case_count: 8,
        }
    }

    fn draft(reference: &str, tests: &str, style: ProblemStyle) -> ProblemDraft {
        ProblemDraft {
            id: "prob-1".to_string(),
            title: "t".to_string(),
            description: "d".to_string(),
            language: Language::Cpp,
            difficulty: Difficulty::Easy,
            topic_tag: "math".to_string(),
            problem_style: style,
            starter_code: "int solve(int a, int b);".to_string(),
            test_suite: tests.to_string(),
            reference_solution: reference.to_string(),
            workspace: None,
            reference_workspace: None,
            constraints: String::new(),
            sample_inputs: vec!["1 2".to_string()],
            sample_outputs: vec!["3".to_string()],
            rewrites: vec![],
        }
    }

    const RETURN_TESTS: &str = r#"
#include "solution.cpp"
#include <cassert>

#define RUN_TEST(name, ...) __VA_ARGS__

int main() {
    RUN_TEST("test_case_1", assert(solve(1, 2) == 3););
    return 0;
}
"#;

    #[test]
    fn test_return_style_passes() {
        let d = draft("int solve(int a, int b) {\n    return a + b;\n}\n", RETURN_TESTS, ProblemStyle::Return);
        assert!(check(&d, &slot(ProblemStyle::Return)).is_ok());
    }

    #[test]
    fn test_missing_solve_fails() {
        let d = draft("int add(int a, int b) { return a + b; }\n", RETURN_TESTS, ProblemStyle::Return);
        let err = check(&d, &slot(ProblemStyle::Return)).unwrap_err();
        assert_eq!(err.obligation_id(), Some(CPP_DEFINES_SOLVE));
    }

    #[test]
    fn test_missing_include_fails() {
        let d = draft(
            "int solve(int a, int b) { return a + b; }\n",
            "int main() { return 0; }\n",
            ProblemStyle::Return,
        );
        let err = check(&d, &slot(ProblemStyle::Return)).unwrap_err();
        assert_eq!(err.obligation_id(), Some(CPP_TESTS_INCLUDE_SOLUTION));
    }

    #[test]
    fn test_missing_main_fails() {
        let d = draft(
            "int solve(int a, int b) { return a + b; }\n",
            "#include \"solution.cpp\"\nvoid helper() {}\n",
            ProblemStyle::Return,
        );
        let err = check(&d, &slot(ProblemStyle::Return)).unwrap_err();
        assert_eq!(err.obligation_id(), Some(CPP_TESTS_DEFINE_MAIN));
    }

    #[test]
    fn test_stdout_style_requires_capture() {
        let tests = "#include \"solution.cpp\"\nint main() { solve(1); return 0; }\n";
        let d = draft("void solve(int n) { std::cout << n; }\n", tests, ProblemStyle::Stdout);
        let err = check(&d, &slot(ProblemStyle::Stdout)).unwrap_err();
        assert_eq!(err.obligation_id(), Some(CPP_STDOUT_TESTS_CAPTURE));
    }

    #[test]
    fn test_stdout_style_passes_with_rdbuf() {
        let tests = r#"
#include "solution.cpp"
#include <sstream>
#include <iostream>

int main() {
    std::stringstream captured;
    auto* old = std::cout.rdbuf(captured.rdbuf());
    solve(1);
    std::cout.rdbuf(old);
    return captured.str() == "1" ? 0 : 1;
}
"#;
        let d = draft("void solve(int n) { std::cout << n; }\n", tests, ProblemStyle::Stdout);
        assert!(check(&d, &slot(ProblemStyle::Stdout)).is_ok());
    }
}
