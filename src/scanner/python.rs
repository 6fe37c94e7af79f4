//! Python queries over masked source: stdin/stdout usage, dangerous
//! constructs, disallowed imports, and test-function enumeration.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{mask, Syntax};

/// Modules a generated problem may never import. Filesystem, network, and
/// process access have no place in a sandboxed practice problem.
pub const DISALLOWED_MODULES: &[&str] = &[
    "os",
    "pathlib",
    "shutil",
    "subprocess",
    "socket",
    "requests",
    "urllib",
    "http",
    "ftplib",
    "asyncio",
    "multiprocessing",
];

static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:import\s+([A-Za-z_][A-Za-z0-9_.]*)|from\s+([A-Za-z_][A-Za-z0-9_.]*)\s+import)")
        .expect("import regex")
});

static STDIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\binput\s*\(|sys\.stdin|open\s*\(\s*0\s*[,)]").expect("stdin regex")
});

static STDOUT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bprint\s*\(|sys\.stdout").expect("stdout regex"));

static EVAL_EXEC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:eval|exec)\s*\(").expect("eval regex"));

static SOLVE_DEF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*def\s+solve\s*\(").expect("solve regex"));

static TEST_CASE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*def\s+(test_case_(\d+))\s*\(").expect("test case regex"));

/// Masked-source scanner for one Python unit.
pub struct PythonScanner {
    masked: String,
}

impl PythonScanner {
    pub fn new(source: &str) -> Self {
        Self {
            masked: mask(source, Syntax::Python),
        }
    }

    pub fn masked(&self) -> &str {
        &self.masked
    }

    pub fn reads_stdin(&self) -> bool {
        STDIN_RE.is_match(&self.masked)
    }

    pub fn writes_stdout(&self) -> bool {
        STDOUT_RE.is_match(&self.masked)
    }

    pub fn uses_eval_or_exec(&self) -> bool {
        EVAL_EXEC_RE.is_match(&self.masked)
    }

    pub fn defines_solve(&self) -> bool {
        SOLVE_DEF_RE.is_match(&self.masked)
    }

    /// Root modules imported that appear on the disallowed list.
    pub fn disallowed_imports(&self) -> Vec<String> {
        let mut found = Vec::new();
        for caps in IMPORT_RE.captures_iter(&self.masked) {
            let module = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or("");
            let root = module.split('.').next().unwrap_or("");
            if DISALLOWED_MODULES.contains(&root) && !found.iter().any(|f| f == root) {
                found.push(root.to_string());
            }
        }
        found
    }

    /// Numbers of `test_case_N` functions, in declaration order.
    pub fn test_case_numbers(&self) -> Vec<u32> {
        TEST_CASE_RE
            .captures_iter(&self.masked)
            .filter_map(|c| c[2].parse().ok())
            .collect()
    }

    pub fn uses_capsys(&self) -> bool {
        self.masked.contains("capsys")
    }

    pub fn calls_solve(&self) -> bool {
        self.masked.contains("solve(")
    }

    pub fn asserts(&self) -> bool {
        self.masked.contains("assert")
    }
}
