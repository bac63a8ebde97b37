//! Configuration management for commit-history.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Error;

/// Project config file name, looked up at the repository root.
pub const PROJECT_CONFIG_FILE: &str = ".commit-history.toml";

/// Recorder configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub git: GitConfig,

    #[serde(default)]
    pub tests: TestsConfig,
}

/// Where history files live and how they are named.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Directory for history files, relative to the repository root.
    #[serde(default = "default_history_dir")]
    pub dir: PathBuf,

    /// File name prefix shared by the global and per-branch files.
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            dir: default_history_dir(),
            file_prefix: default_file_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Remote used to build commit URLs.
    #[serde(default = "default_remote")]
    pub remote: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote: default_remote(),
        }
    }
}

/// Test runner invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Tests are skipped unless this file exists at the repository root.
    #[serde(default = "default_manifest")]
    pub manifest: String,

    /// Program and arguments. `{report}` is replaced with the report path.
    #[serde(default = "default_test_command")]
    pub command: Vec<String>,
}

impl Default for TestsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            manifest: default_manifest(),
            command: default_test_command(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_history_dir() -> PathBuf {
    PathBuf::from("script")
}

fn default_file_prefix() -> String {
    "commit-history".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_manifest() -> String {
    "package.json".to_string()
}

fn default_test_command() -> Vec<String> {
    ["npx", "jest", "--coverage", "--json", "--outputFile={report}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Config {
    /// Load config for a repository.
    ///
    /// The project file wins over the global one; defaults apply when
    /// neither exists.
    pub fn load(repo_root: &Path) -> Result<Self, Error> {
        let project = Self::project_path(repo_root);
        if project.exists() {
            return Self::load_from(&project);
        }
        if let Some(global) = Self::global_path() {
            if global.exists() {
                return Self::load_from(&global);
            }
        }
        Ok(Self::default())
    }

    /// Load config from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Path to the project config file.
    pub fn project_path(repo_root: &Path) -> PathBuf {
        repo_root.join(PROJECT_CONFIG_FILE)
    }

    /// Path to the global config file (~/.commit-history/config.toml).
    pub fn global_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".commit-history").join("config.toml"))
    }

    /// Absolute history directory for a repository.
    pub fn history_dir(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.history.dir)
    }
}
