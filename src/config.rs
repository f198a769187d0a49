//! Repository configuration
//!
//! Loaded from `.gitstep.yaml` in the repository root. Every field is optional:
//!
//! ```yaml
//! main_branch: main
//! remote: origin
//! push_new_branches: true
//! skippable_commands: [sync]
//! state_dir: /var/tmp/gitstep
//!
//! hosting:
//!   platform: github
//!   owner: octo
//!   repo: hello
//!   token_env: GITHUB_TOKEN
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::SkipPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("YAML parse error in {file}: {error}")]
    Yaml {
        file: String,
        error: serde_yaml::Error,
    },
}

/// Supported code hosting platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HostingPlatform {
    #[default]
    Github,
}

/// Connection to the code hosting API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostingConfig {
    #[serde(default)]
    pub platform: HostingPlatform,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    pub owner: String,

    pub repo: String,

    /// Environment variable holding the API token
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_main_branch")]
    pub main_branch: String,

    #[serde(default = "default_remote")]
    pub remote: String,

    /// Push feature branches that have no tracking branch yet during sync
    #[serde(default)]
    pub push_new_branches: bool,

    /// Commands whose current branch may be skipped after a failure
    #[serde(default = "default_skippable_commands")]
    pub skippable_commands: Vec<String>,

    /// Directory for the persisted run state (default: the OS temp dir)
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    #[serde(default)]
    pub hosting: Option<HostingConfig>,
}

fn default_main_branch() -> String {
    "main".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_skippable_commands() -> Vec<String> {
    vec!["sync".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            main_branch: default_main_branch(),
            remote: default_remote(),
            push_new_branches: false,
            skippable_commands: default_skippable_commands(),
            state_dir: None,
            hosting: None,
        }
    }
}

impl Config {
    pub const FILE_NAME: &'static str = ".gitstep.yaml";

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_yaml(&content, path)
    }

    /// Load `.gitstep.yaml` from the repository root; a missing file yields defaults
    pub fn load_for_repository(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(Self::FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_file(&path)
    }

    fn from_yaml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| ConfigError::Yaml {
            file: path.display().to_string(),
            error: e,
        })
    }

    pub fn skip_policy(&self) -> SkipPolicy {
        SkipPolicy::new(self.skippable_commands.clone(), self.main_branch.clone())
    }

    pub fn is_main_branch(&self, branch: &str) -> bool {
        self.main_branch == branch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_for_repository(dir.path()).unwrap();

        assert_eq!(config.main_branch, "main");
        assert_eq!(config.remote, "origin");
        assert_eq!(config.skippable_commands, vec!["sync"]);
        assert!(config.hosting.is_none());
    }

    #[test]
    fn test_load_partial_config() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(Config::FILE_NAME),
            r#"
main_branch: trunk
push_new_branches: true
hosting:
  owner: octo
  repo: hello
"#,
        )
        .unwrap();

        let config = Config::load_for_repository(dir.path()).unwrap();
        assert_eq!(config.main_branch, "trunk");
        assert!(config.push_new_branches);
        assert!(config.is_main_branch("trunk"));

        let hosting = config.hosting.unwrap();
        assert_eq!(hosting.platform, HostingPlatform::Github);
        assert_eq!(hosting.api_url, "https://api.github.com");
        assert_eq!(hosting.token_env, "GITHUB_TOKEN");
    }

    #[test]
    fn test_invalid_yaml_names_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(Config::FILE_NAME);
        fs::write(&path, "main_branch: [unclosed").unwrap();

        let err = Config::load_file(&path).unwrap_err();
        assert!(err.to_string().contains(".gitstep.yaml"));
    }
}
