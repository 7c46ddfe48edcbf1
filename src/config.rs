use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::forge::http::DEFAULT_API_URL;

pub const DEFAULT_CONFIG_FILE: &str = ".pr-census.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration loaded from .pr-census.toml.
/// All fields are optional; the tool runs with zero config apart from a token.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub collection: CollectionConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,

    /// API root, overridable for GitHub Enterprise
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_api_url(),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

/// Which repositories are considered.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Repository search query
    pub query: String,
    /// How many popular repositories to fetch before filtering
    pub search_limit: usize,
    /// Minimum closed PRs for a repository to be kept
    pub min_prs: u64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            query: "stars:>1000".to_string(),
            search_limit: 200,
            min_prs: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Selected repositories actually processed
    pub max_repos: usize,
    /// Valid PR records collected per repository
    pub prs_per_repo: usize,
    /// Items per listing page
    pub page_size: u32,
    /// Pause after every API request
    pub request_delay_ms: u64,
    /// Repositories between checkpoint files
    pub checkpoint_interval: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            max_repos: 5,
            prs_per_repo: 50,
            page_size: 100,
            request_delay_ms: 500,
            checkpoint_interval: 5,
        }
    }
}

impl CollectionConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from .pr-census.toml in the current
    /// directory. A missing default file yields `Config::default()`; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::load_from(default)?
                } else {
                    Config::default()
                }
            }
        };
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the GitHub token: config file value takes precedence,
    /// falls back to GITHUB_TOKEN env var.
    pub fn github_token(&self) -> Option<String> {
        self.github
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.github.token.is_none());
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.selection.min_prs, 100);
        assert_eq!(config.collection.checkpoint_interval, 5);
        assert_eq!(config.collection.request_delay(), Duration::from_millis(500));
        assert_eq!(config.output.dir, PathBuf::from("output"));
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_str = r#"
[github]
token = "ghp_example"

[selection]
search_limit = 50

[collection]
prs_per_repo = 200
request_delay_ms = 0
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.github.token.as_deref(), Some("ghp_example"));
        assert_eq!(config.github.api_url, DEFAULT_API_URL);
        assert_eq!(config.selection.search_limit, 50);
        assert_eq!(config.selection.query, "stars:>1000");
        assert_eq!(config.collection.prs_per_repo, 200);
        assert_eq!(config.collection.max_repos, 5);
        assert!(config.collection.request_delay().is_zero());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("census.toml");
        fs::write(&path, "[output]\ndir = \"runs\"\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.output.dir, PathBuf::from("runs"));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load(Some(&dir.path().join("absent.toml"))),
            Err(ConfigError::FileRead(_))
        ));
    }

    #[test]
    fn test_token_falls_back_to_env() {
        let previous = std::env::var("GITHUB_TOKEN").ok();
        std::env::set_var("GITHUB_TOKEN", "from-env");

        let mut config = Config::default();
        assert_eq!(config.github_token().as_deref(), Some("from-env"));
        config.github.token = Some("  ".to_string());
        assert_eq!(config.github_token().as_deref(), Some("from-env"));

        match previous {
            Some(token) => std::env::set_var("GITHUB_TOKEN", token),
            None => std::env::remove_var("GITHUB_TOKEN"),
        }
    }

    #[test]
    fn test_config_token_wins() {
        let mut config = Config::default();
        config.github.token = Some("from-file".to_string());
        assert_eq!(config.github_token().as_deref(), Some("from-file"));
    }
}
