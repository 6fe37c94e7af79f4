//! Java structural obligations: compilation-unit shape, stdin/stdout style
//! conformance, and the OOP topic rules.

use regex::Regex;

use super::*;
use crate::draft::{AttemptError, ObligationResult, ProblemDraft};
use crate::scanner::{JavaScanner, TypeKind, Visibility};
use crate::spec::ProblemSlot;

/// All reference units concatenated, so cross-file type relations
/// (implements/extends across workspace files) stay visible to one scan.
fn combined_reference(draft: &ProblemDraft) -> String {
    draft
        .reference_units()
        .iter()
        .map(|(_, content)| *content)
        .collect::<Vec<_>>()
        .join("\n")
}

/// The type the tests target: the unit with a `main` method wins, otherwise
/// the first public type declared in the reference.
fn target_type_name(draft: &ProblemDraft) -> Option<String> {
    let units = draft.reference_units();
    for (_, content) in &units {
        let scanner = JavaScanner::new(content);
        if scanner.has_main_method() {
            if let Some(decl) = scanner.primary_public_type() {
                return Some(decl.name.clone());
            }
        }
    }
    for (_, content) in &units {
        let scanner = JavaScanner::new(content);
        if let Some(decl) = scanner.primary_public_type() {
            return Some(decl.name.clone());
        }
    }
    None
}

pub fn check(
    draft: &ProblemDraft,
    slot: &ProblemSlot,
) -> Result<Vec<ObligationResult>, AttemptError> {
    let mut results = Vec::new();

    // Per-unit: at most one top-level public type
    let mut units: Vec<(String, String)> = vec![("starter_code".to_string(), draft.starter_code.clone())];
    for (path, content) in draft.reference_units() {
        units.push((path.to_string(), content.to_string()));
    }
    if let Some(workspace) = &draft.workspace {
        for (path, content) in workspace {
            units.push((format!("workspace:{}", path), content.clone()));
        }
    }
    for (label, content) in &units {
        let scanner = JavaScanner::new(content);
        let publics = scanner.public_type_names();
        require(
            &mut results,
            JAVA_SINGLE_PUBLIC_TYPE,
            publics.len() <= 1,
            format!(
                "{} declares {} top-level public types: {}",
                label,
                publics.len(),
                publics.join(", ")
            ),
        )?;
    }

    let reference = combined_reference(draft);
    let ref_scanner = JavaScanner::new(&reference);
    let starter_scanner = JavaScanner::new(&draft.starter_code);
    let test_scanner = JavaScanner::new(&draft.test_suite);

    // Primary type names must agree between reference and starter
    let ref_primary = ref_scanner.primary_public_type().map(|t| t.name.clone());
    let starter_primary = starter_scanner.primary_public_type().map(|t| t.name.clone());
    if !draft.is_workspace() {
        require(
            &mut results,
            JAVA_PRIMARY_TYPE_MATCHES,
            ref_primary.is_some() && ref_primary == starter_primary,
            format!(
                "reference primary type {:?} does not match starter primary type {:?}",
                ref_primary, starter_primary
            ),
        )?;
    } else {
        // Workspace drafts: path sets already checked at normalization; each
        // pair of units must agree on its public type
        let (starter_files, ref_files) = match (&draft.workspace, &draft.reference_workspace) {
            (Some(s), Some(r)) => (s, r),
            _ => {
                return Err(AttemptError::contract(
                    "workspace draft is missing starter or reference files",
                ))
            }
        };
        for (path, ref_content) in ref_files {
            let Some(starter_content) = starter_files.get(path) else {
                continue;
            };
            let r = JavaScanner::new(ref_content)
                .primary_public_type()
                .map(|t| t.name.clone());
            let s = JavaScanner::new(starter_content)
                .primary_public_type()
                .map(|t| t.name.clone());
            require(
                &mut results,
                JAVA_PRIMARY_TYPE_MATCHES,
                r == s,
                format!("{}: reference declares {:?} but starter declares {:?}", path, r, s),
            )?;
        }
    }

    // Test class must be <Target>Test
    let target = target_type_name(draft);
    let test_primary = test_scanner.primary_public_type().map(|t| t.name.clone());
    let expected_test_class = target.as_deref().map(|t| format!("{}Test", t));
    require(
        &mut results,
        JAVA_TEST_CLASS_MATCHES,
        expected_test_class.is_some() && test_primary == expected_test_class,
        format!(
            "test suite declares {:?}, expected {:?}",
            test_primary, expected_test_class
        ),
    )?;

    // while(false) never compiles past javac's reachability analysis
    require(
        &mut results,
        JAVA_NO_WHILE_FALSE,
        !ref_scanner.has_while_false(),
        "reference contains while(false)",
    )?;

    let reads_stdin = ref_scanner.reads_stdin();

    if slot.problem_style.prints() {
        require(
            &mut results,
            JAVA_STDOUT_SOLUTION_PRINTS,
            ref_scanner.prints_stdout(),
            "stdout-style reference never writes System.out",
        )?;
        require(
            &mut results,
            JAVA_STDOUT_TESTS_CAPTURE,
            test_scanner.captures_stdout(),
            "stdout-style test suite never captures System.out",
        )?;
    }

    if reads_stdin {
        require(
            &mut results,
            JAVA_STDIN_TESTS_PROVIDE,
            test_scanner.sets_stdin() && test_scanner.uses_byte_array_stdin(),
            "reference reads stdin but the test suite never provides System.setIn input",
        )?;
        require(
            &mut results,
            JAVA_STDIN_REQUIRES_MAIN,
            ref_scanner.has_main_method(),
            "reference reads stdin without a public static void main entry point",
        )?;
    }

    if let Some(topic) = structural_topic(slot) {
        require(
            &mut results,
            JAVA_STDIN_STRUCTURAL_CLASH,
            !reads_stdin,
            format!("stdin reads are incompatible with the {} topic", topic),
        )?;
        check_structural_topic(&mut results, topic, &ref_scanner, &test_scanner)?;
    }

    Ok(results)
}

fn base_typed_assignment(test_masked: &str, base: &str, impls: &[&str]) -> bool {
    let alternatives = impls.join("|");
    let pattern = format!(
        r"\b{}\s+\w+\s*=\s*new\s+(?:{})\s*\(",
        regex::escape(base),
        alternatives
    );
    Regex::new(&pattern)
        .map(|re| re.is_match(test_masked))
        .unwrap_or(false)
}

/// Variable names declared as `{base} name = new {impl}(…)` in the tests.
fn base_typed_vars(test_masked: &str, base: &str, impl_name: &str) -> Vec<String> {
    let pattern = format!(
        r"\b{}\s+(\w+)\s*=\s*new\s+{}\s*\(",
        regex::escape(base),
        regex::escape(impl_name)
    );
    Regex::new(&pattern)
        .map(|re| {
            re.captures_iter(test_masked)
                .map(|c| c[1].to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Distinct method names invoked on `var` in the tests.
fn methods_called_on(test_masked: &str, var: &str) -> Vec<String> {
    let pattern = format!(r"\b{}\.(\w+)\s*\(", regex::escape(var));
    let mut names: Vec<String> = Regex::new(&pattern)
        .map(|re| {
            re.captures_iter(test_masked)
                .map(|c| c[1].to_string())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names.dedup();
    names
}

/// The reference's primary non-Main class, for encapsulation/composition.
fn primary_domain_class<'a>(scanner: &'a JavaScanner) -> Option<&'a crate::scanner::TypeDecl> {
    scanner
        .top_level_types()
        .iter()
        .find(|t| t.kind == TypeKind::Class && t.name != "Main" && !t.is_abstract)
        .or_else(|| {
            scanner
                .top_level_types()
                .iter()
                .find(|t| t.kind == TypeKind::Class && t.name != "Main")
        })
}

fn check_structural_topic(
    results: &mut Vec<ObligationResult>,
    topic: &'static str,
    ref_scanner: &JavaScanner,
    test_scanner: &JavaScanner,
) -> Result<(), AttemptError> {
    let test_masked = test_scanner.masked();

    match topic {
        "polymorphism" => {
            // A base with two concrete implementations, exercised through a
            // base-typed variable
            let bases: Vec<_> = ref_scanner
                .top_level_types()
                .iter()
                .filter(|t| t.kind == TypeKind::Interface || t.is_abstract)
                .collect();
            let satisfied = bases.iter().any(|base| {
                let impls = ref_scanner.concrete_impls_of(&base.name);
                if impls.len() < 2 {
                    return false;
                }
                let impl_names: Vec<&str> = impls.iter().map(|t| t.name.as_str()).collect();
                test_masked.contains(base.name.as_str())
                    && impl_names.iter().all(|n| test_masked.contains(n))
                    && base_typed_assignment(test_masked, &base.name, &impl_names)
            });
            require(
                results,
                JAVA_TOPIC_POLYMORPHISM,
                satisfied,
                "no interface or abstract base with two concrete implementations exercised through a base-typed variable",
            )
        }
        "inheritance" => {
            let satisfied = ref_scanner.top_level_types().iter().any(|sub| {
                let Some(parent) = sub.extends.as_deref() else {
                    return false;
                };
                if parent == "Object" {
                    return false;
                }
                let overridden = ref_scanner.override_methods_of(sub);
                if overridden.is_empty() {
                    return false;
                }
                base_typed_vars(test_masked, parent, &sub.name)
                    .iter()
                    .any(|var| {
                        methods_called_on(test_masked, var)
                            .iter()
                            .any(|m| overridden.contains(m))
                    })
            });
            require(
                results,
                JAVA_TOPIC_INHERITANCE,
                satisfied,
                "no subclass overriding a parent method and exercised through a base-typed reference",
            )
        }
        "abstraction" => {
            let satisfied = ref_scanner
                .top_level_types()
                .iter()
                .filter(|t| t.kind == TypeKind::Interface || t.is_abstract)
                .any(|base| {
                    let impls = ref_scanner.concrete_impls_of(&base.name);
                    !impls.is_empty()
                        && test_masked.contains(base.name.as_str())
                        && impls.iter().any(|i| test_masked.contains(i.name.as_str()))
                });
            require(
                results,
                JAVA_TOPIC_ABSTRACTION,
                satisfied,
                "no abstract base with an implementation mentioned by the tests",
            )
        }
        "encapsulation" => {
            let Some(primary) = primary_domain_class(ref_scanner) else {
                return require(
                    results,
                    JAVA_TOPIC_ENCAPSULATION,
                    false,
                    "reference declares no domain class",
                );
            };
            let fields = ref_scanner.fields_of(primary);
            let has_private = fields.iter().any(|f| f.visibility == Visibility::Private);
            let has_public = fields.iter().any(|f| f.visibility == Visibility::Public);
            let exercised = base_typed_vars(test_masked, &primary.name, &primary.name)
                .iter()
                .any(|var| methods_called_on(test_masked, var).len() >= 2);
            require(
                results,
                JAVA_TOPIC_ENCAPSULATION,
                has_private && !has_public && exercised,
                format!(
                    "class {} must hide state behind private fields and the tests must call two methods on one instance",
                    primary.name
                ),
            )
        }
        "composition" => {
            let declared: Vec<String> = ref_scanner
                .top_level_types()
                .iter()
                .map(|t| t.name.clone())
                .collect();
            let satisfied = ref_scanner
                .top_level_types()
                .iter()
                .filter(|t| t.kind == TypeKind::Class && t.name != "Main")
                .any(|owner| {
                    ref_scanner.fields_of(owner).iter().any(|f| {
                        matches!(f.visibility, Visibility::Private | Visibility::Protected)
                            && f.type_name != owner.name
                            && declared.iter().any(|d| {
                                d == &f.type_name
                                    || f.type_name.contains(&format!("<{}>", d))
                            })
                            && test_masked.contains(owner.name.as_str())
                            && test_masked.contains(
                                declared
                                    .iter()
                                    .find(|d| {
                                        *d == &f.type_name
                                            || f.type_name.contains(&format!("<{}>", d))
                                    })
                                    .map(String::as_str)
                                    .unwrap_or(""),
                            )
                    })
                });
            require(
                results,
                JAVA_TOPIC_COMPOSITION,
                satisfied,
                "no class composing another declared type behind a private field, with both mentioned by the tests",
            )
        }
        _ => Ok(()),
    }
}
