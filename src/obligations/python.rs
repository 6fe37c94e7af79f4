//! Python structural obligations: a `solve` entry point, no dangerous
//! constructs, and style-specific test shape.

use super::*;
use crate::draft::{AttemptError, ObligationResult, ProblemDraft};
use crate::scanner::PythonScanner;
use crate::spec::{ProblemSlot, ProblemStyle};

pub fn check(
    draft: &ProblemDraft,
    slot: &ProblemSlot,
) -> Result<Vec<ObligationResult>, AttemptError> {
    let mut results = Vec::new();

    let reference = PythonScanner::new(&draft.reference_solution);
    let tests = PythonScanner::new(&draft.test_suite);

    require(
        &mut results,
        PY_DEFINES_SOLVE,
        reference.defines_solve(),
        "reference never defines solve()",
    )?;

    let bad_ref = reference.disallowed_imports();
    let bad_tests = tests.disallowed_imports();
    require(
        &mut results,
        PY_NO_DISALLOWED_IMPORTS,
        bad_ref.is_empty() && bad_tests.is_empty(),
        format!(
            "disallowed imports: {}",
            bad_ref.iter().chain(bad_tests.iter()).cloned().collect::<Vec<_>>().join(", ")
        ),
    )?;

    require(
        &mut results,
        PY_NO_EVAL_EXEC,
        !reference.uses_eval_or_exec(),
        "reference uses eval/exec",
    )?;

    match slot.problem_style {
        ProblemStyle::Return => {
            require(
                &mut results,
                PY_RETURN_TESTS_ASSERT,
                tests.calls_solve() && tests.asserts(),
                "return-style tests must assert on solve(...) results",
            )?;
        }
        ProblemStyle::Stdout => {
            check_stdout_shape(&mut results, &reference, &tests)?;
        }
        ProblemStyle::Mixed => {
            require(
                &mut results,
                PY_RETURN_TESTS_ASSERT,
                tests.calls_solve() && tests.asserts(),
                "mixed-style tests must assert on solve(...) results",
            )?;
            check_stdout_shape(&mut results, &reference, &tests)?;
        }
    }

    Ok(results)
}

fn check_stdout_shape(
    results: &mut Vec<ObligationResult>,
    reference: &PythonScanner,
    tests: &PythonScanner,
) -> Result<(), AttemptError> {
    require(
        results,
        PY_STDOUT_SOLUTION_PRINTS,
        reference.writes_stdout(),
        "stdout-style reference never prints",
    )?;
    require(
        results,
        PY_STDOUT_TESTS_CAPTURE,
        tests.uses_capsys(),
        "stdout-style tests must capture output via capsys",
    )
}
