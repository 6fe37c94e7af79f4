//! C++ queries over masked source: `solve` detection and signature
//! extraction, stdin/stdout usage.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{brace_depth_at, mask, Syntax};

/// Return type and parameter list of a top-level `solve` definition,
/// captured so a starter scaffold can be synthesized without leaking the
/// reference body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveSignature {
    pub return_type: String,
    pub params: String,
}

impl SolveSignature {
    pub fn is_void(&self) -> bool {
        self.return_type == "void"
    }
}

static SOLVE_DEF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[ \t]*((?:[A-Za-z_][A-Za-z0-9_]*\s*(?:::\s*[A-Za-z_][A-Za-z0-9_]*\s*)*(?:<[^<>]*>)?[\s\*&]+)+)solve\s*\(([^)]*)\)\s*\{",
    )
    .expect("solve definition regex")
});

static STDOUT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:std\s*::\s*)?(?:cout|cerr)\b|\bprintf\s*\(").expect("stdout regex")
});

static STDIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:std\s*::\s*)?cin\b|\bscanf\s*\(|\bgetline\s*\(").expect("stdin regex")
});

/// Masked-source scanner for one C++ unit.
pub struct CppScanner {
    masked: String,
}

impl CppScanner {
    pub fn new(source: &str) -> Self {
        Self {
            masked: mask(source, Syntax::CFamily),
        }
    }

    pub fn masked(&self) -> &str {
        &self.masked
    }

    /// Any `solve(` occurrence after comments and strings are stripped.
    pub fn mentions_solve(&self) -> bool {
        self.masked.contains("solve(") || self.masked.contains("solve (")
    }

    pub fn writes_stdout(&self) -> bool {
        STDOUT_RE.is_match(&self.masked)
    }

    pub fn reads_stdin(&self) -> bool {
        STDIN_RE.is_match(&self.masked)
    }

    pub fn defines_main(&self) -> bool {
        self.masked.contains("int main")
    }

    /// Signature of the first top-level `solve(...)` definition.
    pub fn solve_signature(&self) -> Option<SolveSignature> {
        for caps in SOLVE_DEF_RE.captures_iter(&self.masked) {
            let whole = caps.get(0)?;
            if brace_depth_at(&self.masked, whole.start()) != 0 {
                continue;
            }
            let return_type = caps[1].trim().to_string();
            if return_type.is_empty() || return_type == "return" {
                continue;
            }
            return Some(SolveSignature {
                return_type,
                params: caps[2].trim().to_string(),
            });
        }
        None
    }
}
