//! Runtime configuration.
//!
//! Every option can come from a flag or its environment variable. The flags
//! are global so they can be given before or after the subcommand.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};

use crate::error::Result;
use crate::github::client::DEFAULT_API_URL;
use crate::models::RepoRef;

/// Default location of the file-backed repository store.
pub const DEFAULT_STORE_PATH: &str = ".conversations/repos.json";

/// Default timeout for a single GitHub request, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Which tracked-repository store to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StoreKind {
    /// Process memory, lost on restart
    #[default]
    Memory,
    /// JSON file on disk
    File,
}

/// Resolved store selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    File(PathBuf),
}

/// Configuration flags shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// GitHub token (or set `GITHUB_TOKEN`)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
    pub github_token: Option<String>,

    /// GitHub API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// Tracked repositories, comma separated `owner/repo`
    #[arg(long, env = "TRACKED_REPOS", value_delimiter = ',', global = true)]
    pub repos: Vec<String>,

    /// Tracked-repository store
    #[arg(long, env = "REPO_STORE", value_enum, default_value_t = StoreKind::Memory, global = true)]
    pub store: StoreKind,

    /// Path of the file store
    #[arg(long, env = "REPO_STORE_PATH", default_value = DEFAULT_STORE_PATH, global = true)]
    pub store_path: PathBuf,

    /// Per-request GitHub timeout in seconds
    #[arg(long, env = "GITHUB_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS, global = true)]
    pub timeout_secs: u64,
}

impl ConfigArgs {
    /// Resolve flags into a validated [`Config`].
    pub fn into_config(self) -> Result<Config> {
        let tracked_repos = self
            .repos
            .iter()
            .map(|repo| repo.trim())
            .filter(|repo| !repo.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<RepoRef>>>()?;

        let store = match self.store {
            StoreKind::Memory => StoreBackend::Memory,
            StoreKind::File => StoreBackend::File(self.store_path),
        };

        Ok(Config {
            github_token: self.github_token.filter(|token| !token.is_empty()),
            api_url: self.api_url,
            tracked_repos,
            store,
            user_agent: default_user_agent(),
            request_timeout: Duration::from_secs(self.timeout_secs),
        })
    }
}

fn default_user_agent() -> String {
    format!("conversations/{}", env!("CARGO_PKG_VERSION"))
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub github_token: Option<String>,
    pub api_url: String,
    /// Initial tracked repositories, seeded into the store
    pub tracked_repos: Vec<RepoRef>,
    pub store: StoreBackend,
    pub user_agent: String,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            github_token: None,
            api_url: DEFAULT_API_URL.to_string(),
            tracked_repos: Vec::new(),
            store: StoreBackend::Memory,
            user_agent: default_user_agent(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}
