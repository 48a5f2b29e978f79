//! GitHub data access.
//!
//! [`GitHubProvider`] is the seam between the synthesis engine and GitHub.
//! The engine only ever reads through it; [`GitHubClient`] is the REST
//! implementation. Raw payload types mirror the REST responses and default
//! every optional field, since GitHub omits `user`, label names and colors
//! on some payloads.

pub mod client;
#[cfg(test)]
pub(crate) mod fake;

pub use client::GitHubClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Author, Label, RepoRef, DEFAULT_LABEL_COLOR, UNKNOWN_LOGIN};

/// Page size for every list call. No further pages are requested.
pub const PER_PAGE: u8 = 100;

/// A GitHub user as embedded in issues, comments and reviews.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawUser {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
    /// `User`, `Bot` or `Organization`
    #[serde(rename = "type", default)]
    pub user_type: String,
}

impl RawUser {
    #[must_use]
    pub fn is_bot(&self) -> bool {
        self.user_type == "Bot"
    }
}

/// Build an [`Author`], falling back to defaults for a missing user.
#[must_use]
pub fn author_from(user: Option<&RawUser>) -> Author {
    match user {
        Some(user) => Author {
            login: if user.login.is_empty() {
                UNKNOWN_LOGIN.to_string()
            } else {
                user.login.clone()
            },
            avatar_url: user.avatar_url.clone(),
            is_bot: user.is_bot(),
        },
        None => Author::default(),
    }
}

/// Labels come back either as bare names or as objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawLabel {
    Name(String),
    Detailed {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        color: Option<String>,
    },
}

impl RawLabel {
    /// Normalize to a [`Label`]; labels without a name are dropped.
    #[must_use]
    pub fn normalize(&self) -> Option<Label> {
        let (name, color) = match self {
            Self::Name(name) => (name.as_str(), None),
            Self::Detailed { name, color } => (name.as_deref().unwrap_or(""), color.as_deref()),
        };
        if name.is_empty() {
            return None;
        }
        let color = color.filter(|c| !c.is_empty()).unwrap_or(DEFAULT_LABEL_COLOR);
        Some(Label::new(name, color))
    }
}

/// Normalize a raw label list, dropping nameless entries.
#[must_use]
pub fn normalize_labels(labels: &[RawLabel]) -> Vec<Label> {
    labels.iter().filter_map(RawLabel::normalize).collect()
}

/// Present on issues that are really pull requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPullRequestRef {
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
}

fn default_state() -> String {
    "open".to_string()
}

/// An issue or pull request from the issues API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawIssue {
    pub id: u64,
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<RawUser>,
    #[serde(default)]
    pub labels: Vec<RawLabel>,
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default)]
    pub pull_request: Option<RawPullRequestRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RawIssue {
    #[must_use]
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }

    #[must_use]
    pub fn is_merged(&self) -> bool {
        self.pull_request
            .as_ref()
            .is_some_and(|pr| pr.merged_at.is_some())
    }
}

/// A comment on an issue or pull request conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawComment {
    pub id: u64,
    #[serde(default)]
    pub user: Option<RawUser>,
    #[serde(default)]
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A pull request review submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReview {
    pub id: u64,
    #[serde(default)]
    pub user: Option<RawUser>,
    #[serde(default)]
    pub body: Option<String>,
    /// Absent while a review is still pending.
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEventLabel {
    #[serde(default)]
    pub name: Option<String>,
}

/// An entry from the issue events API. Only `labeled`/`unlabeled` matter here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawIssueEvent {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub label: Option<RawEventLabel>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawOwner {
    #[serde(default)]
    pub login: String,
}

/// A repository owned by the authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRepository {
    #[serde(default)]
    pub owner: RawOwner,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub open_issues_count: u64,
    #[serde(default)]
    pub private: bool,
}

/// Repository summary handed to callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub open_issue_count: u64,
    pub private: bool,
}

impl From<RawRepository> for Repository {
    fn from(raw: RawRepository) -> Self {
        Self {
            owner: raw.owner.login,
            name: raw.name,
            full_name: raw.full_name,
            description: raw.description,
            open_issue_count: raw.open_issues_count,
            private: raw.private,
        }
    }
}

/// Payload for creating an issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Read and write access to GitHub issues, pull requests and their history.
///
/// List calls return a single page of at most [`PER_PAGE`] items. Failures
/// propagate; implementations do not retry.
#[async_trait]
pub trait GitHubProvider: Send + Sync {
    /// All issues and pull requests (open and closed), most recently updated first.
    async fn list_issues(&self, repo: &RepoRef) -> Result<Vec<RawIssue>>;

    /// One issue or pull request by number.
    async fn get_issue(&self, repo: &RepoRef, number: u64) -> Result<RawIssue>;

    /// Conversation comments, in API order.
    async fn list_comments(&self, repo: &RepoRef, number: u64) -> Result<Vec<RawComment>>;

    /// Review submissions of a pull request.
    async fn list_reviews(&self, repo: &RepoRef, number: u64) -> Result<Vec<RawReview>>;

    /// Raw issue events (label changes among them).
    async fn list_issue_events(&self, repo: &RepoRef, number: u64)
        -> Result<Vec<RawIssueEvent>>;

    /// Names of the labels currently on an issue.
    async fn list_labels(&self, repo: &RepoRef, number: u64) -> Result<Vec<String>>;

    async fn add_labels(&self, repo: &RepoRef, number: u64, labels: &[String]) -> Result<()>;

    /// Removing a label that is not present succeeds.
    async fn remove_label(&self, repo: &RepoRef, number: u64, label: &str) -> Result<()>;

    async fn create_comment(&self, repo: &RepoRef, number: u64, body: &str)
        -> Result<RawComment>;

    async fn create_issue(&self, repo: &RepoRef, issue: &NewIssue) -> Result<RawIssue>;

    async fn close_issue(&self, repo: &RepoRef, number: u64) -> Result<()>;

    /// Repositories owned by the authenticated user, most recently updated first.
    async fn list_user_repos(&self) -> Result<Vec<Repository>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_defaults() {
        let author = author_from(None);
        assert_eq!(author.login, "unknown");
        assert_eq!(author.avatar_url, "");
        assert!(!author.is_bot);

        let bot = RawUser {
            login: "claude[bot]".to_string(),
            avatar_url: "https://avatars/1".to_string(),
            user_type: "Bot".to_string(),
        };
        let author = author_from(Some(&bot));
        assert!(author.is_bot);
        assert_eq!(author.login, "claude[bot]");
    }

    #[test]
    fn test_label_normalization() {
        let raw: Vec<RawLabel> = serde_json::from_value(serde_json::json!([
            "bare",
            { "name": "bug", "color": "d73a4a" },
            { "name": "", "color": "ffffff" },
            { "color": "000000" },
            { "name": "no-color" }
        ]))
        .unwrap();

        let labels = normalize_labels(&raw);
        assert_eq!(
            labels,
            vec![
                Label::new("bare", "888888"),
                Label::new("bug", "d73a4a"),
                Label::new("no-color", "888888"),
            ]
        );
    }

    #[test]
    fn test_issue_deserialization_with_missing_fields() {
        let issue: RawIssue = serde_json::from_value(serde_json::json!({
            "id": 1,
            "number": 5,
            "user": null,
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-02T10:00:00Z",
            "pull_request": { "merged_at": "2024-03-02T09:00:00Z" }
        }))
        .unwrap();

        assert!(issue.is_pull_request());
        assert!(issue.is_merged());
        assert_eq!(issue.state, "open");
        assert!(issue.body.is_none());
        assert!(issue.labels.is_empty());
    }
}
