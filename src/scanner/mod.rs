//! Language-aware lexical pass over source text.
//!
//! No real parser: a single forward scan classifies every character as
//! in-comment, in-string, in-char, or code, and produces a *masked* copy of
//! the source where comment and literal interiors are replaced with spaces.
//! The masked copy has the same byte length and line structure as the
//! original, so regex matches against it yield indices that are valid in the
//! original text. Every downstream structural check is a predicate over the
//! masked text, which makes `"class Foo {}"` inside a string literal
//! invisible to keyword detection.
//!
//! Scanners never fail: malformed input (unterminated strings, stray braces)
//! degrades to empty query results, and upstream validators decide whether
//! the absence is itself a violation.

pub mod cpp;
pub mod java;
pub mod python;

pub use cpp::CppScanner;
pub use java::{JavaScanner, TypeDecl, TypeKind, Visibility};
pub use python::PythonScanner;

/// Comment/string syntax family for the masking pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    /// `//`, `/* */`, `"…"`, `'…'`, and `"""…"""` text blocks (Java, C++).
    CFamily,
    /// `#`, `'…'`/`"…"`, and triple-quoted strings.
    Python,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    LineComment,
    BlockComment,
    Str(char),
    TripleStr(char),
    Chr,
}

/// Blank out comment and string-literal interiors, preserving byte offsets.
///
/// String and char delimiters survive so literal boundaries remain visible;
/// newlines survive everywhere so line numbers stay meaningful. Multi-byte
/// characters are replaced by one space per byte.
pub fn mask(source: &str, syntax: Syntax) -> String {
    let bytes = source.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut mode = Mode::Code;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match mode {
            Mode::Code => match syntax {
                Syntax::CFamily => {
                    if b == b'/' && bytes.get(i + 1) == Some(&b'/') {
                        mode = Mode::LineComment;
                        out.push(b' ');
                        i += 1;
                        continue;
                    }
                    if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
                        mode = Mode::BlockComment;
                        out.push(b' ');
                        out.push(b' ');
                        i += 2;
                        continue;
                    }
                    if b == b'"' {
                        if bytes.get(i + 1) == Some(&b'"') && bytes.get(i + 2) == Some(&b'"') {
                            mode = Mode::TripleStr('"');
                            out.extend_from_slice(b"\"\"\"");
                            i += 3;
                            continue;
                        }
                        mode = Mode::Str('"');
                        out.push(b'"');
                        i += 1;
                        continue;
                    }
                    if b == b'\'' {
                        mode = Mode::Chr;
                        out.push(b'\'');
                        i += 1;
                        continue;
                    }
                    out.push(b);
                    i += 1;
                }
                Syntax::Python => {
                    if b == b'#' {
                        mode = Mode::LineComment;
                        out.push(b' ');
                        i += 1;
                        continue;
                    }
                    if b == b'"' || b == b'\'' {
                        let q = b as char;
                        if bytes.get(i + 1) == Some(&b) && bytes.get(i + 2) == Some(&b) {
                            mode = Mode::TripleStr(q);
                            out.extend_from_slice(&[b, b, b]);
                            i += 3;
                            continue;
                        }
                        mode = Mode::Str(q);
                        out.push(b);
                        i += 1;
                        continue;
                    }
                    out.push(b);
                    i += 1;
                }
            },
            Mode::LineComment => {
                if b == b'\n' {
                    mode = Mode::Code;
                    out.push(b'\n');
                } else {
                    out.push(b' ');
                }
                i += 1;
            }
            Mode::BlockComment => {
                if b == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    mode = Mode::Code;
                    out.push(b' ');
                    out.push(b' ');
                    i += 2;
                    continue;
                }
                out.push(if b == b'\n' { b'\n' } else { b' ' });
                i += 1;
            }
            Mode::Str(q) => {
                if b == b'\\' && i + 1 < bytes.len() {
                    out.push(b' ');
                    out.push(b' ');
                    i += 2;
                    continue;
                }
                if b == q as u8 {
                    mode = Mode::Code;
                    out.push(b);
                } else if b == b'\n' {
                    // Unterminated literal: recover at end of line
                    mode = Mode::Code;
                    out.push(b'\n');
                } else {
                    out.push(b' ');
                }
                i += 1;
            }
            Mode::TripleStr(q) => {
                if b == q as u8
                    && bytes.get(i + 1) == Some(&(q as u8))
                    && bytes.get(i + 2) == Some(&(q as u8))
                {
                    mode = Mode::Code;
                    out.extend_from_slice(&[b, b, b]);
                    i += 3;
                    continue;
                }
                out.push(if b == b'\n' { b'\n' } else { b' ' });
                i += 1;
            }
            Mode::Chr => {
                if b == b'\\' && i + 1 < bytes.len() {
                    out.push(b' ');
                    out.push(b' ');
                    i += 2;
                    continue;
                }
                if b == b'\'' {
                    mode = Mode::Code;
                    out.push(b);
                } else if b == b'\n' {
                    mode = Mode::Code;
                    out.push(b'\n');
                } else {
                    out.push(b' ');
                }
                i += 1;
            }
        }
    }

    // Masked bytes are always valid ASCII substitutions of valid UTF-8
    String::from_utf8(out).unwrap_or_else(|_| source.to_string())
}

/// Brace depth of `masked` at byte offset `at` (counting `{`/`}` before it).
pub fn brace_depth_at(masked: &str, at: usize) -> i32 {
    let mut depth = 0;
    for b in masked.as_bytes()[..at.min(masked.len())].iter() {
        match b {
            b'{' => depth += 1,
            b'}' => depth -= 1,
            _ => {}
        }
    }
    depth
}

/// Index of the `}` matching the `{` at `open`, if balanced.
pub fn matching_brace(masked: &str, open: usize) -> Option<usize> {
    let bytes = masked.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return None;
    }
    let mut depth = 0;
    for (i, b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
