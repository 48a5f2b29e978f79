//! Conversation domain types.
//!
//! Everything here is rebuilt on every synthesis pass; nothing is persisted.
//! Serialized field names are camelCase because the presentation layer
//! consumes these records as JSON.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConversationError;

/// Login used when GitHub omits the user on a payload.
pub const UNKNOWN_LOGIN: &str = "unknown";

/// Color used when GitHub omits a label color.
pub const DEFAULT_LABEL_COLOR: &str = "888888";

/// A repository identified as `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    #[must_use]
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// `owner/name`
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Owner and repository names are limited to what GitHub itself accepts.
fn is_valid_name(part: &str) -> bool {
    !part.is_empty()
        && part != "."
        && part != ".."
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl FromStr for RepoRef {
    type Err = ConversationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.split_once('/') {
            Some((owner, name)) if is_valid_name(owner) && is_valid_name(name) => {
                Ok(Self::new(owner, name))
            }
            _ => Err(ConversationError::InvalidRepository(s.to_string())),
        }
    }
}

impl TryFrom<String> for RepoRef {
    type Error = ConversationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RepoRef> for String {
    fn from(repo: RepoRef) -> Self {
        repo.full_name()
    }
}

/// Whether a thread is an issue or a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    Issue,
    PullRequest,
}

impl ConversationKind {
    #[must_use]
    pub fn short_name(self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::PullRequest => "pr",
        }
    }
}

/// Lifecycle state of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationState {
    Open,
    Closed,
    Merged,
}

impl ConversationState {
    /// Derive the state from the raw open/closed flag. `Merged` only applies to
    /// pull requests that carry a merge timestamp.
    #[must_use]
    pub fn derive(kind: ConversationKind, raw_state: &str, merged: bool) -> Self {
        if kind == ConversationKind::PullRequest && merged {
            return Self::Merged;
        }
        if raw_state.eq_ignore_ascii_case("closed") {
            Self::Closed
        } else {
            Self::Open
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Merged => "merged",
        }
    }
}

/// Composite identifier of one issue or pull request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct ConversationId {
    pub repo: RepoRef,
    pub kind: ConversationKind,
    pub number: u64,
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.repo.owner,
            self.repo.name,
            self.kind.short_name(),
            self.number
        )
    }
}

impl From<ConversationId> for String {
    fn from(id: ConversationId) -> Self {
        id.to_string()
    }
}

/// A label attached to a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub color: String,
}

impl Label {
    #[must_use]
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
        }
    }

    /// Case-insensitive name comparison.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Who wrote a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub login: String,
    pub avatar_url: String,
    pub is_bot: bool,
}

impl Default for Author {
    fn default() -> Self {
        Self {
            login: UNKNOWN_LOGIN.to_string(),
            avatar_url: String::new(),
            is_bot: false,
        }
    }
}

/// Origin of a message within a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    IssueBody,
    PrBody,
    Comment,
    ReviewComment,
}

impl MessageKind {
    /// The opening body of an issue or pull request.
    #[must_use]
    pub fn is_seed(self) -> bool {
        matches!(self, Self::IssueBody | Self::PrBody)
    }
}

/// Workflow phase an automated message was produced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentType {
    Spec,
    Plan,
    Review,
    Implement,
    CiDoctor,
    DailyDigest,
    HealthReport,
    Gardener,
    DocDrift,
}

impl AgentType {
    pub const ALL: [AgentType; 9] = [
        Self::Spec,
        Self::Plan,
        Self::Review,
        Self::Implement,
        Self::CiDoctor,
        Self::DailyDigest,
        Self::HealthReport,
        Self::Gardener,
        Self::DocDrift,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spec => "spec",
            Self::Plan => "plan",
            Self::Review => "review",
            Self::Implement => "implement",
            Self::CiDoctor => "ci-doctor",
            Self::DailyDigest => "daily-digest",
            Self::HealthReport => "health-report",
            Self::Gardener => "gardener",
            Self::DocDrift => "doc-drift",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|agent| agent.as_str() == s)
            .ok_or_else(|| format!("unknown agent type '{s}'"))
    }
}

/// How urgently a human needs to look at a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttentionLevel {
    #[default]
    None,
    Review,
    Working,
    Urgent,
}

impl AttentionLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Review => "review",
            Self::Working => "working",
            Self::Urgent => "urgent",
        }
    }
}

impl fmt::Display for AttentionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of conversation content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: u64,
    pub author: Author,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub agent_type: Option<AgentType>,
}

/// Direction of a label event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelEventKind {
    Labeled,
    Unlabeled,
}

/// A single label add or remove on a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelEvent {
    pub kind: LabelEventKind,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

impl LabelEvent {
    #[must_use]
    pub fn labeled(label: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            kind: LabelEventKind::Labeled,
            label: label.into(),
            created_at,
        }
    }

    #[must_use]
    pub fn unlabeled(label: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            kind: LabelEventKind::Unlabeled,
            label: label.into(),
            created_at,
        }
    }
}

/// An issue or pull request viewed as a chat thread.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub repo: RepoRef,
    #[serde(rename = "type")]
    pub kind: ConversationKind,
    pub number: u64,
    pub title: String,
    pub state: ConversationState,
    pub labels: Vec<Label>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub body: String,
    pub author: Author,
    pub last_message: Option<Message>,
    pub attention_level: AttentionLevel,
    pub unread_count: u32,
}
