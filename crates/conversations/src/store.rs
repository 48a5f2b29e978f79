//! Tracked-repository settings.
//!
//! The set of repositories the conversation list covers. Stored behind
//! [`RepoStore`] so the backend is picked by configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::{Config, StoreBackend};
use crate::error::{ConversationError, Result};
use crate::models::RepoRef;

/// Storage for the tracked repository list.
#[async_trait]
pub trait RepoStore: Send + Sync {
    async fn tracked_repos(&self) -> Result<Vec<RepoRef>>;

    /// Replace the whole list. Duplicates are dropped, first occurrence wins.
    async fn set_tracked_repos(&self, repos: Vec<RepoRef>) -> Result<()>;
}

fn dedup(repos: Vec<RepoRef>) -> Vec<RepoRef> {
    let mut unique: Vec<RepoRef> = Vec::with_capacity(repos.len());
    for repo in repos {
        if !unique.contains(&repo) {
            unique.push(repo);
        }
    }
    unique
}

/// Process-local store, lost on restart.
#[derive(Debug, Default)]
pub struct MemoryRepoStore {
    repos: RwLock<Vec<RepoRef>>,
}

impl MemoryRepoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RepoStore for MemoryRepoStore {
    async fn tracked_repos(&self) -> Result<Vec<RepoRef>> {
        Ok(self.repos.read().await.clone())
    }

    async fn set_tracked_repos(&self, repos: Vec<RepoRef>) -> Result<()> {
        *self.repos.write().await = dedup(repos);
        Ok(())
    }
}

/// JSON file store. A missing file reads as an empty list.
#[derive(Debug)]
pub struct FileRepoStore {
    path: PathBuf,
    // Serializes read-modify-write within this process.
    lock: RwLock<()>,
}

impl FileRepoStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_file(&self) -> Result<Vec<RepoRef>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(ConversationError::Storage(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn write_file(&self, repos: &[RepoRef]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(repos)?;
        fs::write(&self.path, content).await.map_err(|e| {
            ConversationError::Storage(format!("failed to write {}: {e}", self.path.display()))
        })
    }
}

#[async_trait]
impl RepoStore for FileRepoStore {
    async fn tracked_repos(&self) -> Result<Vec<RepoRef>> {
        let _guard = self.lock.read().await;
        self.read_file().await
    }

    async fn set_tracked_repos(&self, repos: Vec<RepoRef>) -> Result<()> {
        let _guard = self.lock.write().await;
        let repos = dedup(repos);
        self.write_file(&repos).await?;
        debug!(path = %self.path.display(), count = repos.len(), "Saved tracked repositories");
        Ok(())
    }
}

/// Build the configured store and seed it with `config.tracked_repos` when
/// it holds nothing yet.
pub async fn build_store(config: &Config) -> Result<Arc<dyn RepoStore>> {
    let store: Arc<dyn RepoStore> = match &config.store {
        StoreBackend::Memory => Arc::new(MemoryRepoStore::new()),
        StoreBackend::File(path) => {
            let file_store = FileRepoStore::new(path);
            debug!(path = %file_store.path().display(), "Using file repository store");
            Arc::new(file_store)
        }
    };

    if !config.tracked_repos.is_empty() && store.tracked_repos().await?.is_empty() {
        store.set_tracked_repos(config.tracked_repos.clone()).await?;
        info!(count = config.tracked_repos.len(), "Seeded tracked repositories");
    }

    Ok(store)
}
