//! Java queries over masked source: top-level type enumeration, stdin/stdout
//! usage, and the per-type facts the structural obligations need.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{brace_depth_at, mask, matching_brace, Syntax};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
    Record,
}

impl TypeKind {
    fn parse(keyword: &str) -> TypeKind {
        match keyword {
            "interface" => TypeKind::Interface,
            "enum" => TypeKind::Enum,
            "record" => TypeKind::Record,
            _ => TypeKind::Class,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Protected,
    Private,
    Package,
}

/// One top-level type declaration, with the byte offsets the rewrite pass
/// needs to edit modifiers in place.
#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub name: String,
    pub kind: TypeKind,
    pub is_abstract: bool,
    /// Byte offset of the `public` modifier token, when present.
    pub public_start: Option<usize>,
    /// Byte offset of the `class`/`interface`/`enum`/`record` keyword.
    pub keyword_start: usize,
    /// Byte range of the `{ … }` body (None when the source is malformed).
    pub body: Option<(usize, usize)>,
    pub extends: Option<String>,
    pub implements: Vec<String>,
}

impl TypeDecl {
    pub fn is_public(&self) -> bool {
        self.public_start.is_some()
    }
}

/// A field declared directly inside a type body with an explicit modifier.
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub visibility: Visibility,
    pub type_name: String,
    pub name: String,
}

static TYPE_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[ \t]*((?:(?:public|protected|private|abstract|final|static|sealed|non-sealed|strictfp)\s+)*)(class|interface|enum|record)\s+([A-Za-z_$][A-Za-z0-9_$]*)",
    )
    .expect("type header regex")
});

static EXTENDS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bextends\s+([A-Za-z_$][A-Za-z0-9_$.<>]*)").expect("extends regex"));

static IMPLEMENTS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bimplements\s+([^{]+)").expect("implements regex"));

static FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*(private|protected|public)\s+(?:static\s+)?(?:final\s+)?([A-Za-z_$][A-Za-z0-9_$.<>\[\]]*)\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*[;=]",
    )
    .expect("field regex")
});

static OVERRIDE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"@Override\s+(?:(?:public|protected|private|final|synchronized)\s+)*[A-Za-z_$][A-Za-z0-9_$.<>\[\]]*\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*\(",
    )
    .expect("override regex")
});

static WHILE_FALSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"while\s*\(\s*false\s*\)").expect("while-false regex"));

static MAIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"public\s+static\s+void\s+main\s*\(\s*(?:final\s+)?String\s*(?:\[\s*\]\s*\w+|\w+\s*\[\s*\]|\.\.\.\s*\w+)\s*\)")
        .expect("main regex")
});

/// Masked-source scanner for one Java compilation unit.
pub struct JavaScanner {
    masked: String,
    types: Vec<TypeDecl>,
}

impl JavaScanner {
    pub fn new(source: &str) -> Self {
        let masked = mask(source, Syntax::CFamily);
        let types = enumerate_top_level_types(&masked);
        Self { masked, types }
    }

    pub fn masked(&self) -> &str {
        &self.masked
    }

    /// Top-level type declarations, in source order. Brace depth 0 is the
    /// only depth at which declarations count.
    pub fn top_level_types(&self) -> &[TypeDecl] {
        &self.types
    }

    pub fn public_type_names(&self) -> Vec<&str> {
        self.types
            .iter()
            .filter(|t| t.is_public())
            .map(|t| t.name.as_str())
            .collect()
    }

    pub fn find_type(&self, name: &str) -> Option<&TypeDecl> {
        self.types.iter().find(|t| t.name == name)
    }

    /// The unit's primary public type: the first public declaration.
    pub fn primary_public_type(&self) -> Option<&TypeDecl> {
        self.types.iter().find(|t| t.is_public())
    }

    pub fn reads_stdin(&self) -> bool {
        self.masked.contains("System.in") || self.masked.contains("new Scanner(System.in")
    }

    pub fn prints_stdout(&self) -> bool {
        self.masked.contains("System.out.print")
    }

    pub fn has_while_false(&self) -> bool {
        WHILE_FALSE_RE.is_match(&self.masked)
    }

    pub fn has_main_method(&self) -> bool {
        MAIN_RE.is_match(&self.masked)
    }

    /// Test-suite query: does the unit redirect stdin via `System.setIn`?
    pub fn sets_stdin(&self) -> bool {
        self.masked.contains("System.setIn")
    }

    pub fn uses_byte_array_stdin(&self) -> bool {
        self.masked.contains("ByteArrayInputStream")
    }

    /// Test-suite query: does the unit capture stdout via `System.setOut`?
    pub fn captures_stdout(&self) -> bool {
        self.masked.contains("System.setOut")
    }

    /// Explicit-modifier fields declared directly inside `decl`'s body.
    pub fn fields_of(&self, decl: &TypeDecl) -> Vec<FieldDecl> {
        let Some((open, close)) = decl.body else {
            return Vec::new();
        };
        let body = &self.masked[open + 1..close];
        let mut fields = Vec::new();
        for caps in FIELD_RE.captures_iter(body) {
            let at = caps.get(0).map(|m| m.start()).unwrap_or(0);
            // Only direct members: relative depth 0 inside the body
            if brace_depth_at(body, at) != 0 {
                continue;
            }
            let type_name = caps[2].to_string();
            // `return x;` style false positives never carry a modifier, but
            // guard against modifier-typed keywords anyway
            if type_name == "return" || type_name == "new" {
                continue;
            }
            fields.push(FieldDecl {
                visibility: match &caps[1] {
                    "private" => Visibility::Private,
                    "protected" => Visibility::Protected,
                    "public" => Visibility::Public,
                    _ => Visibility::Package,
                },
                type_name,
                name: caps[3].to_string(),
            });
        }
        fields
    }

    /// Names of methods annotated `@Override` inside `decl`'s body.
    pub fn override_methods_of(&self, decl: &TypeDecl) -> Vec<String> {
        let Some((open, close)) = decl.body else {
            return Vec::new();
        };
        let body = &self.masked[open + 1..close];
        OVERRIDE_RE
            .captures_iter(body)
            .map(|c| c[1].to_string())
            .collect()
    }

    /// Concrete (non-interface, non-abstract) types extending or
    /// implementing `base`.
    pub fn concrete_impls_of(&self, base: &str) -> Vec<&TypeDecl> {
        self.types
            .iter()
            .filter(|t| {
                t.kind == TypeKind::Class
                    && !t.is_abstract
                    && (t.extends.as_deref() == Some(base)
                        || t.implements.iter().any(|i| i == base))
            })
            .collect()
    }
}

fn enumerate_top_level_types(masked: &str) -> Vec<TypeDecl> {
    let mut types = Vec::new();
    for caps in TYPE_HEADER_RE.captures_iter(masked) {
        let header = caps.get(0).expect("whole match");
        if brace_depth_at(masked, header.start()) != 0 {
            continue;
        }
        let modifiers = caps.get(1).expect("modifier group");
        let keyword = caps.get(2).expect("keyword group");
        let name = caps.get(3).expect("name group");

        let modifier_text = modifiers.as_str();
        let public_start = find_word(modifier_text, "public").map(|off| modifiers.start() + off);
        let is_abstract = find_word(modifier_text, "abstract").is_some();

        // Header tail: everything between the type name and the body brace
        let body_open = masked[name.end()..].find('{').map(|off| name.end() + off);
        let tail = match body_open {
            Some(open) => &masked[name.end()..open],
            None => "",
        };
        let extends = EXTENDS_RE.captures(tail).map(|c| c[1].to_string());
        let implements = IMPLEMENTS_RE
            .captures(tail)
            .map(|c| {
                c[1].split(',')
                    .map(|s| s.trim().trim_end_matches('{').trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let body = body_open.and_then(|open| matching_brace(masked, open).map(|end| (open, end)));

        types.push(TypeDecl {
            name: name.as_str().to_string(),
            kind: TypeKind::parse(keyword.as_str()),
            is_abstract,
            public_start,
            keyword_start: keyword.start(),
            body,
            extends,
            implements,
        });
    }
    types
}

/// Offset of `word` as a whole word within `text`.
fn find_word(text: &str, word: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(rel) = text[from..].find(word) {
        let at = from + rel;
        let before_ok = at == 0
            || !text.as_bytes()[at - 1].is_ascii_alphanumeric() && text.as_bytes()[at - 1] != b'_';
        let after = at + word.len();
        let after_ok = after >= text.len()
            || !text.as_bytes()[after].is_ascii_alphanumeric() && text.as_bytes()[after] != b'_';
        if before_ok && after_ok {
            return Some(at);
        }
        from = at + word.len();
    }
    None
}
