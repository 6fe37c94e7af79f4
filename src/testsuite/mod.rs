//! Test-suite shape validation.
//!
//! A shape check only: counts, framework imports, forbidden constructs. It
//! never judges whether the assertions are *right*: the reference execution
//! and the anti-baseline gate do that. A failing shape is what authorizes
//! the one-shot LLM repair in [`repair`].

pub mod repair;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::scanner::{CppScanner, JavaScanner, PythonScanner};
use crate::spec::{Language, ProblemSlot};

/// Why a test suite failed its shape check. The message is structured enough
/// to feed straight into the repair prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteViolation {
    pub message: String,
}

impl SuiteViolation {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Validate the suite's shape for the slot's language. `Ok(())` means the
/// suite may proceed to obligation checking.
pub fn validate(slot: &ProblemSlot, test_suite: &str) -> Result<(), SuiteViolation> {
    if test_suite.trim().is_empty() {
        return Err(SuiteViolation::new("test suite is empty"));
    }
    match slot.language {
        Language::Java => validate_java(test_suite),
        Language::Python => validate_python(slot, test_suite),
        Language::Cpp => validate_cpp(slot, test_suite),
        Language::Sql => validate_sql(slot, test_suite),
    }
}

static JAVA_TEST_ANNOTATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@Test\b").expect("test annotation regex"));

static JAVA_RANDOM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Math\.random|new\s+Random\b|ThreadLocalRandom").expect("java random regex")
});

static JAVA_IO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"java\.io\.File|java\.nio\.file|FileReader|FileWriter|java\.net\.")
        .expect("java io regex")
});

static JAVA_DELTA_ASSERT_RE: Lazy<Regex> = Lazy::new(|| {
    // Three-argument assertEquals with a numeric third argument is the
    // delta (approximate) form; a string third argument is just a message
    Regex::new(r"assertEquals\s*\([^();]*,[^();]*,\s*[0-9.][^();]*\)").expect("java delta regex")
});

fn validate_java(test_suite: &str) -> Result<(), SuiteViolation> {
    let scanner = JavaScanner::new(test_suite);
    let masked = scanner.masked();

    if !test_suite.contains("org.junit") {
        return Err(SuiteViolation::new("test suite must import org.junit"));
    }
    let test_count = JAVA_TEST_ANNOTATION_RE.find_iter(masked).count();
    if test_count == 0 {
        return Err(SuiteViolation::new("test suite declares no @Test methods"));
    }
    if JAVA_RANDOM_RE.is_match(masked) {
        return Err(SuiteViolation::new("test suite uses randomness"));
    }
    if JAVA_IO_RE.is_match(masked) {
        return Err(SuiteViolation::new(
            "test suite performs file or network I/O",
        ));
    }
    if masked.contains("Thread.sleep") {
        return Err(SuiteViolation::new("test suite sleeps"));
    }
    if JAVA_DELTA_ASSERT_RE.is_match(masked) {
        return Err(SuiteViolation::new(
            "test suite uses approximate (delta) assertions",
        ));
    }
    Ok(())
}

static PY_RANDOM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bimport\s+random\b|\brandom\.\w+\s*\(").expect("py random regex"));

static PY_APPROX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bapprox\s*\(|\bisclose\s*\(|assertAlmostEqual").expect("py approx regex"));

fn validate_python(slot: &ProblemSlot, test_suite: &str) -> Result<(), SuiteViolation> {
    let scanner = PythonScanner::new(test_suite);
    let masked = scanner.masked();

    let mut numbers = scanner.test_case_numbers();
    numbers.sort_unstable();
    numbers.dedup();
    let expected: Vec<u32> = (1..=slot.test_case_count as u32).collect();
    if numbers != expected {
        return Err(SuiteViolation::new(format!(
            "expected exactly {} functions named test_case_1..test_case_{}, found {:?}",
            slot.test_case_count, slot.test_case_count, scanner.test_case_numbers()
        )));
    }

    if !masked.contains("from solution import") && !masked.contains("import solution") {
        return Err(SuiteViolation::new(
            "test suite must import solve from solution",
        ));
    }

    let disallowed = scanner.disallowed_imports();
    if !disallowed.is_empty() {
        return Err(SuiteViolation::new(format!(
            "test suite imports disallowed modules: {}",
            disallowed.join(", ")
        )));
    }
    if PY_RANDOM_RE.is_match(masked) {
        return Err(SuiteViolation::new("test suite uses randomness"));
    }
    if PY_APPROX_RE.is_match(masked) {
        return Err(SuiteViolation::new(
            "test suite uses approximate comparisons",
        ));
    }
    if masked.contains("open(") {
        return Err(SuiteViolation::new("test suite performs file I/O"));
    }
    Ok(())
}

static CPP_RUN_TEST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"RUN_TEST\s*\(\s*"(test_case_(\d+))""#).expect("run_test regex"));

static CPP_RANDOM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\brand\s*\(|\bsrand\s*\(|random_device").expect("cpp random regex"));

fn validate_cpp(slot: &ProblemSlot, test_suite: &str) -> Result<(), SuiteViolation> {
    let scanner = CppScanner::new(test_suite);
    let masked = scanner.masked();

    if !test_suite.contains("#include \"solution.cpp\"") {
        return Err(SuiteViolation::new(
            "test file must #include \"solution.cpp\"",
        ));
    }
    if !scanner.defines_main() {
        return Err(SuiteViolation::new("test file must define main"));
    }

    // RUN_TEST names live in string literals, so read them from the raw text
    let mut numbers: Vec<u32> = CPP_RUN_TEST_RE
        .captures_iter(test_suite)
        .filter_map(|c| c[2].parse().ok())
        .collect();
    numbers.sort_unstable();
    numbers.dedup();
    let expected: Vec<u32> = (1..=slot.test_case_count as u32).collect();
    if numbers != expected {
        return Err(SuiteViolation::new(format!(
            "expected exactly {} RUN_TEST cases named test_case_1..test_case_{}, found {}",
            slot.test_case_count,
            slot.test_case_count,
            numbers.len()
        )));
    }

    if CPP_RANDOM_RE.is_match(masked) {
        return Err(SuiteViolation::new("test suite uses randomness"));
    }
    if masked.contains("fstream") {
        return Err(SuiteViolation::new("test suite performs file I/O"));
    }
    if masked.contains("fabs(") {
        return Err(SuiteViolation::new(
            "test suite uses approximate comparisons",
        ));
    }
    Ok(())
}

fn validate_sql(slot: &ProblemSlot, test_suite: &str) -> Result<(), SuiteViolation> {
    let doc: Value = serde_json::from_str(test_suite)
        .map_err(|e| SuiteViolation::new(format!("test suite is not valid JSON: {}", e)))?;

    let schema = doc
        .get("schema_sql")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if schema.trim().is_empty() {
        return Err(SuiteViolation::new(
            "test document must carry a non-empty schema_sql",
        ));
    }

    let cases = doc
        .get("cases")
        .and_then(Value::as_array)
        .ok_or_else(|| SuiteViolation::new("test document must carry a cases array"))?;
    if cases.len() != slot.test_case_count {
        return Err(SuiteViolation::new(format!(
            "expected exactly {} cases, found {}",
            slot.test_case_count,
            cases.len()
        )));
    }
    for (i, case) in cases.iter().enumerate() {
        if case.get("expected_rows").and_then(Value::as_array).is_none() {
            return Err(SuiteViolation::new(format!(
                "case {} is missing its expected_rows array",
                i + 1
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Difficulty, ProblemStyle};

    fn slot(language: Language) -> ProblemSlot {
        ProblemSlot {
            index: 0,
            language,
            difficulty: Difficulty::Easy,
            topics: vec!["strings".to_string()],
            problem_style: ProblemStyle::Return,
            constraints: String::new(),
            test_case_count: 8,
        }
    }

    fn python_suite(n: usize) -> String {
        let mut out = String::from("from solution import solve\n\n");
        for i in 1..=n {
            out.push_str(&format!(
                "def test_case_{}():\n    assert solve({}) == {}\n\n",
                i, i, i
            ));
        }
        out
    }

    #[test]
    fn test_python_eight_cases_pass() {
        assert!(validate(&slot(Language::Python), &python_suite(8)).is_ok());
    }

    #[test]
    fn test_python_wrong_count_fails() {
        let err = validate(&slot(Language::Python), &python_suite(5)).unwrap_err();
        assert!(err.message.contains("test_case_1..test_case_8"));
    }

    #[test]
    fn test_python_missing_solution_import_fails() {
        let suite = python_suite(8).replace("from solution import solve\n\n", "");
        let err = validate(&slot(Language::Python), &suite).unwrap_err();
        assert!(err.message.contains("import solve"));
    }

    #[test]
    fn test_python_randomness_fails() {
        let suite = format!("import random\n{}", python_suite(8));
        let err = validate(&slot(Language::Python), &suite).unwrap_err();
        assert!(err.message.contains("randomness"));
    }

    #[test]
    fn test_python_approx_fails() {
        let mut suite = python_suite(7);
        suite.push_str(
            "def test_case_8():\n    import pytest\n    assert solve(1) == approx(1.0)\n",
        );
        let err = validate(&slot(Language::Python), &suite).unwrap_err();
        assert!(err.message.contains("approximate"));
    }

    #[test]
    fn test_java_junit_suite_passes() {
        let suite = r#"
import org.junit.jupiter.api.Test;
import static org.junit.jupiter.api.Assertions.assertEquals;

public class BillingTest {
    @Test
    void testCase1() { assertEquals(3, new Billing().charge(3)); }
}
"#;
        assert!(validate(&slot(Language::Java), suite).is_ok());
    }

    #[test]
    fn test_java_missing_junit_import_fails() {
        let suite = "public class BillingTest { @Test void t() {} }";
        let err = validate(&slot(Language::Java), suite).unwrap_err();
        assert!(err.message.contains("org.junit"));
    }

    #[test]
    fn test_java_randomness_fails() {
        let suite = "import org.junit.jupiter.api.Test;\npublic class T { @Test void t() { double x = Math.random(); } }";
        let err = validate(&slot(Language::Java), suite).unwrap_err();
        assert!(err.message.contains("randomness"));
    }

    #[test]
    fn test_java_delta_assert_fails() {
        let suite = "import org.junit.jupiter.api.Test;\npublic class T { @Test void t() { assertEquals(1.0, x, 0.001); } }";
        let err = validate(&slot(Language::Java), suite).unwrap_err();
        assert!(err.message.contains("approximate"));
    }

    fn cpp_suite(n: usize) -> String {
        let mut out = String::from("#include \"solution.cpp\"\n#include <cassert>\n\n#define RUN_TEST(name, ...) __VA_ARGS__\n\nint main() {\n");
        for i in 1..=n {
            out.push_str(&format!(
                "    RUN_TEST(\"test_case_{}\", assert(solve({}) == {}););\n",
                i, i, i
            ));
        }
        out.push_str("    return 0;\n}\n");
        out
    }

    #[test]
    fn test_cpp_eight_cases_pass() {
        assert!(validate(&slot(Language::Cpp), &cpp_suite(8)).is_ok());
    }

    #[test]
    fn test_cpp_wrong_count_fails() {
        let err = validate(&slot(Language::Cpp), &cpp_suite(6)).unwrap_err();
        assert!(err.message.contains("RUN_TEST"));
    }

    #[test]
    fn test_cpp_missing_include_fails() {
        let suite = cpp_suite(8).replace("#include \"solution.cpp\"\n", "");
        let err = validate(&slot(Language::Cpp), &suite).unwrap_err();
        assert!(err.message.contains("solution.cpp"));
    }

    #[test]
    fn test_cpp_randomness_fails() {
        let mut suite = cpp_suite(8);
        suite.push_str("// extra\nint noise() { return rand(); }\n");
        let err = validate(&slot(Language::Cpp), &suite).unwrap_err();
        assert!(err.message.contains("randomness"));
    }

    fn sql_suite(n: usize) -> String {
        let cases: Vec<String> = (1..=n)
            .map(|i| {
                format!(
                    r#"{{"name": "test_case_{}", "expected_rows": [["row{}"]]}}"#,
                    i, i
                )
            })
            .collect();
        format!(
            r#"{{"schema_sql": "CREATE TABLE users (name TEXT); INSERT INTO users VALUES ('a');", "cases": [{}]}}"#,
            cases.join(", ")
        )
    }

    #[test]
    fn test_sql_document_passes() {
        assert!(validate(&slot(Language::Sql), &sql_suite(8)).is_ok());
    }

    #[test]
    fn test_sql_wrong_case_count_fails() {
        let err = validate(&slot(Language::Sql), &sql_suite(3)).unwrap_err();
        assert!(err.message.contains("expected exactly 8 cases"));
    }

    #[test]
    fn test_sql_invalid_json_fails() {
        let err = validate(&slot(Language::Sql), "not json").unwrap_err();
        assert!(err.message.contains("not valid JSON"));
    }

    #[test]
    fn test_sql_missing_schema_fails() {
        let suite = r#"{"cases": []}"#;
        let err = validate(&slot(Language::Sql), suite).unwrap_err();
        assert!(err.message.contains("schema_sql"));
    }

    #[test]
    fn test_empty_suite_fails() {
        let err = validate(&slot(Language::Python), "   ").unwrap_err();
        assert!(err.message.contains("empty"));
    }
}
