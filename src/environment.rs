//! Environment documents (`environments/<name>.bru`).

use crate::parser::Section;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Directory holding environment documents, relative to the collection root.
pub const ENVIRONMENTS_DIR: &str = "environments";

/// Errors raised while loading an environment.
#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("failed to read environment file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A named set of substitution variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    name: String,
    vars: HashMap<String, String>,
}

impl Environment {
    pub fn new(name: impl Into<String>, vars: HashMap<String, String>) -> Self {
        Self {
            name: name.into(),
            vars,
        }
    }

    /// An environment with no variables.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, HashMap::new())
    }

    /// Parse the `vars { ... }` block of an environment document.
    pub fn parse(name: impl Into<String>, text: &str) -> Self {
        let vars = Section::parse(text)
            .block("vars")
            .map(|body| Section::parse(body).field_map().into_iter().collect())
            .unwrap_or_default();
        Self::new(name, vars)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Path of the environment document called `name`.
pub fn environment_path(name: &str, base_dir: &Path) -> PathBuf {
    base_dir.join(ENVIRONMENTS_DIR).join(format!("{}.bru", name))
}

/// Load the environment called `name` from `base_dir`.
///
/// A missing file is not an error: the result is an empty environment and
/// mock serving proceeds without substitutions.
pub fn load_environment(name: &str, base_dir: &Path) -> Result<Environment, EnvironmentError> {
    let path = environment_path(name, base_dir);
    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(Environment::parse(name, &content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Environment::empty(name)),
        Err(source) => Err(EnvironmentError::Read { path, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vars_block() {
        let env = Environment::parse(
            "local",
            "vars {\n  baseUrl: http://localhost:3000\n  token: abc\n}\n",
        );
        assert_eq!(env.name(), "local");
        assert_eq!(env.len(), 2);
        assert_eq!(env.get("baseUrl"), Some("http://localhost:3000"));
        assert_eq!(env.get("token"), Some("abc"));
    }

    #[test]
    fn test_parse_without_vars_block() {
        let env = Environment::parse("local", "vars:secret [\n  apiKey\n]\n");
        assert!(env.is_empty());
    }

    #[test]
    fn test_load_missing_environment_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let env = load_environment("staging", dir.path()).unwrap();
        assert!(env.is_empty());
        assert_eq!(env.name(), "staging");
    }

    #[test]
    fn test_load_environment_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(ENVIRONMENTS_DIR)).unwrap();
        std::fs::write(
            environment_path("local", dir.path()),
            "vars {\n  baseUrl: http://x\n}\n",
        )
        .unwrap();

        let env = load_environment("local", dir.path()).unwrap();
        assert_eq!(env.get("baseUrl"), Some("http://x"));
    }

    #[test]
    fn test_load_unreadable_environment_is_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be cannot be read as text.
        std::fs::create_dir_all(environment_path("local", dir.path())).unwrap();
        assert!(load_environment("local", dir.path()).is_err());
    }
}
