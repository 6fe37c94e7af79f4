//! SQL obligations. The heavy lifting for SQL lives in the test-suite shape
//! validation (the suite is a JSON document); the reference itself only has
//! to be a query.

use super::*;
use crate::draft::{AttemptError, ObligationResult, ProblemDraft};
use crate::spec::ProblemSlot;

pub fn check(
    draft: &ProblemDraft,
    _slot: &ProblemSlot,
) -> Result<Vec<ObligationResult>, AttemptError> {
    let mut results = Vec::new();

    let upper = draft.reference_solution.to_uppercase();
    require(
        &mut results,
        SQL_REFERENCE_IS_QUERY,
        upper.contains("SELECT"),
        "reference solution is not a SELECT query",
    )?;

    Ok(results)
}
