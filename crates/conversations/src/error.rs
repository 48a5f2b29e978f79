//! Error types for conversation synthesis.

use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ConversationError>;

/// Errors that can occur while fetching or assembling conversations.
#[derive(Debug, Error)]
pub enum ConversationError {
    /// HTTP transport failed (connection refused, timeout, TLS, ...)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// GitHub answered with a non-success status
    #[error("GitHub API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// GitHub rate limit exhausted
    #[error("Rate limit exceeded, reset in {reset_in:?}")]
    RateLimited { reset_in: Duration },

    /// Token missing or rejected
    #[error("Authentication failed")]
    Unauthorized,

    /// Issue, pull request or repository does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Repository identifier is not `owner/repo`
    #[error("Invalid repository '{0}', expected owner/repo")]
    InvalidRepository(String),

    /// API base URL cannot be parsed or cannot carry a path
    #[error("Invalid API URL '{0}'")]
    InvalidUrl(String),

    /// A single repository failed during batch assembly
    #[error("Failed to load conversations for {repository}: {source}")]
    Repository {
        repository: String,
        #[source]
        source: Box<ConversationError>,
    },

    /// Tracked-repository store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConversationError {
    /// Whether the failure came from the upstream data source rather than
    /// from local input or storage.
    ///
    /// `NotFound` counts as upstream: it is GitHub's answer, and a tracked
    /// repository that was deleted or renamed surfaces this way.
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        match self {
            Self::Http(_)
            | Self::Api { .. }
            | Self::RateLimited { .. }
            | Self::Unauthorized
            | Self::NotFound(_) => true,
            Self::Repository { source, .. } => source.is_upstream(),
            _ => false,
        }
    }

    /// Wrap an error with the repository it came from.
    #[must_use]
    pub fn for_repository(self, repository: impl Into<String>) -> Self {
        Self::Repository {
            repository: repository.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through repository wrappers.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Repository { source, .. } => source.root(),
            other => other,
        }
    }
}
