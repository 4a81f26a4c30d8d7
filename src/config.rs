//! Configuration for the mock server.
//!
//! Values come from an optional YAML file; command-line flags override them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for the mock server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Collection directory holding the `.bru` documents
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// Environment name, loaded from `environments/<env>.bru`
    #[serde(default = "default_env")]
    pub env: String,

    /// Serve the browser editor alongside the mock routes
    #[serde(default)]
    pub ui: bool,

    /// Loading and serving settings
    #[serde(default)]
    pub settings: Settings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            dir: default_dir(),
            env: default_env(),
            ui: false,
            settings: Settings::default(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_env() -> String {
    "local".to_string()
}

impl ServerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.port == 0 {
            anyhow::bail!("Port cannot be 0");
        }
        if self.env.trim().is_empty() {
            anyhow::bail!("Environment name cannot be empty");
        }
        if self.env.contains(['/', '\\']) {
            anyhow::bail!("Environment name cannot contain path separators: {}", self.env);
        }
        self.settings.validate()
    }
}

/// What to do with a document whose example carries no response status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingExamplePolicy {
    /// Do not serve the document
    #[default]
    Skip,
    /// Serve a generated `200 OK` JSON response
    Synthesize,
}

/// Loading and serving settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Log matched mock requests
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log requests that matched no route
    #[serde(default = "default_true")]
    pub log_unmatched: bool,

    /// Content type added when an example declares none
    #[serde(default = "default_content_type")]
    pub default_content_type: String,

    /// Handling of documents without an example response
    #[serde(default)]
    pub missing_example: MissingExamplePolicy,

    /// File name globs excluded from the scan
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_matches: true,
            log_unmatched: true,
            default_content_type: default_content_type(),
            missing_example: MissingExamplePolicy::default(),
            ignore: default_ignore(),
        }
    }
}

impl Settings {
    /// Validate the settings.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.default_content_type.trim().is_empty() {
            anyhow::bail!("default_content_type cannot be empty");
        }
        for pattern in &self.ignore {
            globset::Glob::new(pattern)
                .map_err(|e| anyhow::anyhow!("Invalid ignore glob {:?}: {}", pattern, e))?;
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_content_type() -> String {
    crate::mock::DEFAULT_CONTENT_TYPE.to_string()
}

fn default_ignore() -> Vec<String> {
    vec!["collection.bru".to_string(), "folder.bru".to_string()]
}
