//! Built-in suites
//!
//! The YAML files under `suites/` are compiled into the binary so the
//! standard regression run needs nothing but the executable.

use std::path::Path;

use crate::common::{Error, Result};
use crate::scenario::Suite;

/// Name and YAML source of each built-in suite, in run order
pub const BUILTIN: &[(&str, &str)] = &[
    ("api", include_str!("../suites/api.yaml")),
    ("login", include_str!("../suites/login.yaml")),
    ("todo", include_str!("../suites/todo.yaml")),
];

/// Names of the built-in suites
pub fn names() -> Vec<&'static str> {
    BUILTIN.iter().map(|(name, _)| *name).collect()
}

/// YAML source of a built-in suite
pub fn source(name: &str) -> Result<&'static str> {
    BUILTIN
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, src)| *src)
        .ok_or_else(|| Error::UnknownSuite {
            name: name.to_string(),
            available: names().join(", "),
        })
}

/// Parse a built-in suite
pub fn builtin(name: &str) -> Result<Suite> {
    Suite::parse(name, source(name)?)
}

/// Load a suite from a YAML file
pub fn load_file(path: &Path) -> Result<Suite> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;
    Suite::parse(&path.display().to_string(), &content)
}

/// Resolve a command-line argument to a suite: an existing file path, or
/// else a built-in name
pub fn resolve(arg: &str) -> Result<Suite> {
    let path = Path::new(arg);
    if path.is_file() {
        load_file(path)
    } else {
        builtin(arg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Step;

    #[test]
    fn test_every_builtin_parses() {
        for name in names() {
            let suite = builtin(name).unwrap_or_else(|e| panic!("suite {name}: {e}"));
            assert!(!suite.scenarios.is_empty(), "suite {name} has no scenarios");
        }
    }

    #[test]
    fn test_api_suite_is_backend_only() {
        let suite = builtin("api").unwrap();
        let all_steps = suite
            .before
            .iter()
            .chain(suite.scenarios.iter().flat_map(|s| s.steps.iter()));
        assert!(all_steps.into_iter().all(|s| !s.is_ui()));
    }

    #[test]
    fn test_todo_suite_logs_in_before_each() {
        let suite = builtin("todo").unwrap();
        assert!(suite
            .before_each
            .iter()
            .any(|s| matches!(s, Step::WaitRequest { alias, status: Some(201), .. } if alias == "loginRequest")));
    }

    #[test]
    fn test_unknown_builtin() {
        let err = builtin("nope").unwrap_err();
        assert!(err.to_string().contains("api, login, todo"));
    }

    #[test]
    fn test_resolve_prefers_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.yaml");
        std::fs::write(
            &path,
            "name: Custom\nscenarios:\n  - name: one\n    steps:\n      - action: set_var\n        name: a\n        value: b\n",
        )
        .unwrap();
        let suite = resolve(path.to_str().unwrap()).unwrap();
        assert_eq!(suite.name, "Custom");
    }
}
