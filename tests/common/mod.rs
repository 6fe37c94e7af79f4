#![allow(dead_code)]

use drillsmith::spec::{
    ActivitySpec, Difficulty, DifficultyPhase, Language, ProblemStyle, TEST_CASE_COUNT,
};

pub const PY_CONSTRAINTS: &str = "inputs are lowercase ascii, 1 <= len <= 100";
pub const JAVA_CONSTRAINTS: &str = "standard library only";
pub const CPP_CONSTRAINTS: &str = "0 <= n <= 1000";

pub fn python_spec(count: usize, style: ProblemStyle) -> ActivitySpec {
    ActivitySpec {
        language: Language::Python,
        problem_count: count,
        difficulty_plan: vec![DifficultyPhase {
            difficulty: Difficulty::Easy,
            count,
        }],
        topic_tags: vec!["strings".to_string()],
        problem_style: style,
        constraints: PY_CONSTRAINTS.to_string(),
        test_case_count: TEST_CASE_COUNT,
        explicit_hard_requested: false,
        focus_concepts: vec![],
    }
}

pub fn java_hard_poly_spec(explicit_hard: bool) -> ActivitySpec {
    ActivitySpec {
        language: Language::Java,
        problem_count: 1,
        difficulty_plan: vec![DifficultyPhase {
            difficulty: Difficulty::Hard,
            count: 1,
        }],
        topic_tags: vec!["polymorphism".to_string()],
        problem_style: ProblemStyle::Return,
        constraints: JAVA_CONSTRAINTS.to_string(),
        test_case_count: TEST_CASE_COUNT,
        explicit_hard_requested: explicit_hard,
        focus_concepts: vec![],
    }
}

pub fn cpp_spec(count: usize, style: ProblemStyle) -> ActivitySpec {
    ActivitySpec {
        language: Language::Cpp,
        problem_count: count,
        difficulty_plan: vec![DifficultyPhase {
            difficulty: Difficulty::Easy,
            count,
        }],
        topic_tags: vec!["math".to_string()],
        problem_style: style,
        constraints: CPP_CONSTRAINTS.to_string(),
        test_case_count: TEST_CASE_COUNT,
        explicit_hard_requested: false,
        focus_concepts: vec![],
    }
}

/// Eight pytest functions asserting on capsys-captured output.
pub fn python_stdout_suite() -> String {
    let mut out = String::from("from solution import solve\n\n");
    for i in 1..=8 {
        out.push_str(&format!(
            "def test_case_{i}(capsys):\n    solve('w{i}')\n    assert capsys.readouterr().out == '{i}w\\n'\n\n"
        ));
    }
    out
}

/// Eight pytest functions asserting on return values.
pub fn python_return_suite() -> String {
    let mut out = String::from("from solution import solve\n\n");
    for i in 1..=8 {
        out.push_str(&format!(
            "def test_case_{i}():\n    assert solve('w{i}') == '{i}w'\n\n"
        ));
    }
    out
}

/// A complete, valid stdout-style Python draft. `title` varies the raw text
/// so scripted retries clear the substantive-change gate.
pub fn python_stdout_draft(title: &str) -> String {
    serde_json::json!({
        "title": title,
        "description": "Print the input string rotated left by one.",
        "starter_code": "def solve(s):\n    pass\n",
        "reference_solution": "def solve(s):\n    print(s[1:] + s[:1])\n",
        "test_suite": python_stdout_suite(),
        "constraints": PY_CONSTRAINTS,
        "sample_inputs": ["abc"],
        "sample_outputs": ["bca"],
    })
    .to_string()
}

pub const JAVA_POLY_REFERENCE: &str = r#"public class Billing {
    public int total(Plan plan, int units) { return plan.cost(units); }
}
interface Plan { int cost(int units); }
class BasicPlan implements Plan { public int cost(int units) { return units; } }
class ProPlan implements Plan { public int cost(int units) { return units * 2; } }
"#;

pub const JAVA_POLY_TESTS: &str = r#"import org.junit.jupiter.api.Test;
import static org.junit.jupiter.api.Assertions.assertEquals;

public class BillingTest {
    @Test
    void testCase1() {
        Plan plan = new BasicPlan();
        assertEquals(3, new Billing().total(plan, 3));
    }

    @Test
    void testCase2() {
        Plan plan = new ProPlan();
        assertEquals(6, new Billing().total(plan, 3));
    }
}
"#;

/// A Java polymorphism draft that satisfies every structural obligation.
pub fn java_poly_draft(title: &str) -> String {
    serde_json::json!({
        "title": title,
        "description": "Total a bill through a plan hierarchy.",
        "starter_code": "public class Billing {\n}\n",
        "reference_solution": JAVA_POLY_REFERENCE,
        "test_suite": JAVA_POLY_TESTS,
        "constraints": JAVA_CONSTRAINTS,
        "sample_inputs": ["basic 3"],
        "sample_outputs": ["3"],
    })
    .to_string()
}

/// A Java draft with no interface or abstract base: violates the
/// polymorphism topic shape.
pub fn java_flat_draft(title: &str) -> String {
    serde_json::json!({
        "title": title,
        "description": "Compute a bill.",
        "starter_code": "public class Billing {\n}\n",
        "reference_solution": "public class Billing {\n    public int solve(String tier, int units) { return units; }\n}\n",
        "test_suite": "import org.junit.jupiter.api.Test;\nimport static org.junit.jupiter.api.Assertions.assertEquals;\n\npublic class BillingTest {\n    @Test\n    void testCase1() { assertEquals(3, new Billing().solve(\"basic\", 3)); }\n}\n",
        "constraints": JAVA_CONSTRAINTS,
        "sample_inputs": ["basic 3"],
        "sample_outputs": ["3"],
    })
    .to_string()
}

/// Eight RUN_TEST cases capturing std::cout.
pub fn cpp_stdout_suite() -> String {
    let mut out = String::from(
        "#include \"solution.cpp\"\n#include <cassert>\n#include <sstream>\n#include <iostream>\n\n#define RUN_TEST(name, ...) __VA_ARGS__\n\nstatic std::string capture(int n) {\n    std::stringstream buffer;\n    auto* old = std::cout.rdbuf(buffer.rdbuf());\n    solve(n);\n    std::cout.rdbuf(old);\n    return buffer.str();\n}\n\nint main() {\n",
    );
    for i in 1..=8 {
        out.push_str(&format!(
            "    RUN_TEST(\"test_case_{i}\", assert(capture({i}) == \"{}\\n\"););\n",
            i * 2
        ));
    }
    out.push_str("    return 0;\n}\n");
    out
}

/// A stdout-style C++ draft whose starter is includes+comment only, so the
/// generator must synthesize the scaffold from the reference signature.
pub fn cpp_stdout_draft(title: &str) -> String {
    serde_json::json!({
        "title": title,
        "description": "Print twice the input.",
        "starter_code": "#include <iostream>\n// write solve below\n",
        "reference_solution": "#include <iostream>\n\nvoid solve(int n) {\n    std::cout << n * 2 << \"\\n\";\n}\n",
        "test_suite": cpp_stdout_suite(),
        "constraints": CPP_CONSTRAINTS,
        "sample_inputs": ["2"],
        "sample_outputs": ["4"],
    })
    .to_string()
}
