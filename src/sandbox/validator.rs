//! Static import checking of submitted code.
//!
//! The code is parsed in-process, so a rejected snippet never reaches the
//! launcher. Only `import` statements are inspected; dynamic imports through
//! `__import__` or `exec` are not visible here and remain a known gap.

use std::collections::BTreeSet;

use rustpython_parser::{ast, Parse};

use crate::error::{Result, SandboxError};

/// Source path reported in parse errors.
const SOURCE_PATH: &str = "<sandbox>";

/// A single disallowed import found in the code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportViolation {
    /// Top-level module name checked against the allowlist.
    pub module: String,
    /// Full dotted module name as written.
    pub imported: String,
}

impl From<ImportViolation> for SandboxError {
    fn from(v: ImportViolation) -> Self {
        SandboxError::ImportViolation {
            module: v.module,
            imported: v.imported,
        }
    }
}

/// Fail on the first import whose top-level module is not in `allowed`.
pub fn validate_imports(code: &str, allowed: &BTreeSet<String>) -> Result<()> {
    let suite = parse(code)?;
    let mut first = None;
    walk(&suite, allowed, &mut |v| {
        first = Some(v);
        false
    });
    match first {
        Some(violation) => Err(violation.into()),
        None => Ok(()),
    }
}

/// Collect every disallowed import, in source order.
pub fn find_import_violations(
    code: &str,
    allowed: &BTreeSet<String>,
) -> Result<Vec<ImportViolation>> {
    let suite = parse(code)?;
    let mut found = Vec::new();
    walk(&suite, allowed, &mut |v| {
        found.push(v);
        true
    });
    Ok(found)
}

fn parse(code: &str) -> Result<ast::Suite> {
    ast::Suite::parse(code, SOURCE_PATH).map_err(|e| SandboxError::SyntaxViolation(e.to_string()))
}

/// Visit every import in `body`. `report` returns false to stop the walk.
fn walk<F>(body: &[ast::Stmt], allowed: &BTreeSet<String>, report: &mut F) -> bool
where
    F: FnMut(ImportViolation) -> bool,
{
    for stmt in body {
        let keep_going = match stmt {
            ast::Stmt::Import(ast::StmtImport { names, .. }) => names
                .iter()
                .all(|alias| check(alias.name.as_str(), allowed, report)),
            ast::Stmt::ImportFrom(ast::StmtImportFrom { module, .. }) => match module {
                Some(module) => check(module.as_str(), allowed, report),
                // `from . import x` names no module
                None => true,
            },
            ast::Stmt::FunctionDef(ast::StmtFunctionDef { body, .. })
            | ast::Stmt::AsyncFunctionDef(ast::StmtAsyncFunctionDef { body, .. })
            | ast::Stmt::ClassDef(ast::StmtClassDef { body, .. })
            | ast::Stmt::With(ast::StmtWith { body, .. })
            | ast::Stmt::AsyncWith(ast::StmtAsyncWith { body, .. }) => walk(body, allowed, report),
            ast::Stmt::For(ast::StmtFor { body, orelse, .. })
            | ast::Stmt::AsyncFor(ast::StmtAsyncFor { body, orelse, .. })
            | ast::Stmt::While(ast::StmtWhile { body, orelse, .. })
            | ast::Stmt::If(ast::StmtIf { body, orelse, .. }) => {
                walk(body, allowed, report) && walk(orelse, allowed, report)
            }
            ast::Stmt::Try(ast::StmtTry {
                body,
                handlers,
                orelse,
                finalbody,
                ..
            })
            | ast::Stmt::TryStar(ast::StmtTryStar {
                body,
                handlers,
                orelse,
                finalbody,
                ..
            }) => {
                walk(body, allowed, report)
                    && handlers.iter().all(|handler| {
                        let ast::ExceptHandler::ExceptHandler(h) = handler;
                        walk(&h.body, allowed, report)
                    })
                    && walk(orelse, allowed, report)
                    && walk(finalbody, allowed, report)
            }
            ast::Stmt::Match(ast::StmtMatch { cases, .. }) => cases
                .iter()
                .all(|case| walk(&case.body, allowed, report)),
            _ => true,
        };
        if !keep_going {
            return false;
        }
    }
    true
}

fn check<F>(imported: &str, allowed: &BTreeSet<String>, report: &mut F) -> bool
where
    F: FnMut(ImportViolation) -> bool,
{
    let module = imported.split('.').next().unwrap_or(imported);
    if allowed.contains(module) {
        return true;
    }
    report(ImportViolation {
        module: module.to_string(),
        imported: imported.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allow(modules: &[&str]) -> BTreeSet<String> {
        modules.iter().map(|m| m.to_string()).collect()
    }

    #[test]
    fn test_allowed_imports_pass() {
        let code = "import math\nfrom collections import Counter\nimport json as j\n";
        assert!(validate_imports(code, &allow(&["math", "collections", "json"])).is_ok());
    }

    #[test]
    fn test_disallowed_import_is_rejected() {
        let err = validate_imports("import os\n", &allow(&["math"])).unwrap_err();
        match err {
            SandboxError::ImportViolation { module, imported } => {
                assert_eq!(module, "os");
                assert_eq!(imported, "os");
            }
            other => panic!("expected ImportViolation, got {other:?}"),
        }
    }

    #[test]
    fn test_dotted_names_check_top_level_module() {
        let allowed = allow(&["os"]);
        assert!(validate_imports("import os.path", &allowed).is_ok());
        assert!(validate_imports("from os.path import join", &allowed).is_ok());

        let err = validate_imports("from xml.etree import ElementTree", &allowed).unwrap_err();
        assert!(matches!(err, SandboxError::ImportViolation { ref module, .. } if module == "xml"));
    }

    #[test]
    fn test_nested_imports_are_found() {
        let code = r#"
def main():
    try:
        pass
    except Exception:
        if True:
            import subprocess
    return 1
"#;
        let err = validate_imports(code, &allow(&["math"])).unwrap_err();
        assert!(matches!(err, SandboxError::ImportViolation { ref module, .. } if module == "subprocess"));
    }

    #[test]
    fn test_import_inside_class_and_loop() {
        let code = "class A:\n    for i in range(3):\n        pass\n    else:\n        import socket\n";
        let violations = find_import_violations(code, &allow(&[])).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].module, "socket");
    }

    #[test]
    fn test_stops_at_first_violation() {
        let code = "import os\nimport sys\n";
        let err = validate_imports(code, &allow(&[])).unwrap_err();
        assert!(matches!(err, SandboxError::ImportViolation { ref module, .. } if module == "os"));
    }

    #[test]
    fn test_find_all_violations_in_order() {
        let code = "import math, os\nfrom sys import argv\ndef f():\n    import shutil\n";
        let violations = find_import_violations(code, &allow(&["math"])).unwrap();
        let modules: Vec<_> = violations.iter().map(|v| v.module.as_str()).collect();
        assert_eq!(modules, ["os", "sys", "shutil"]);
    }

    #[test]
    fn test_relative_import_without_module_is_ignored() {
        assert!(validate_imports("from . import sibling\n", &allow(&[])).is_ok());
    }

    #[test]
    fn test_syntax_error() {
        let err = validate_imports("def main(:\n    return 1\n", &allow(&["math"])).unwrap_err();
        assert!(matches!(err, SandboxError::SyntaxViolation(_)));
    }
}
