//! In-memory [`GitHubProvider`] for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    GitHubProvider, NewIssue, RawComment, RawIssue, RawIssueEvent, RawLabel, RawPullRequestRef,
    RawReview, RawUser, Repository,
};
use crate::error::{ConversationError, Result};
use crate::models::RepoRef;

type Key = (RepoRef, u64);

#[derive(Default)]
pub(crate) struct FakeProvider {
    pub issues: HashMap<RepoRef, Vec<RawIssue>>,
    pub comments: HashMap<Key, Vec<RawComment>>,
    pub reviews: HashMap<Key, Vec<RawReview>>,
    pub events: HashMap<Key, Vec<RawIssueEvent>>,
    pub failing_repos: HashSet<RepoRef>,
    pub failing_events: bool,
    pub labels: Mutex<HashMap<Key, Vec<String>>>,
    pub posted_comments: Mutex<Vec<(Key, String)>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issue(mut self, repo: &RepoRef, issue: RawIssue) -> Self {
        self.issues.entry(repo.clone()).or_default().push(issue);
        self
    }

    pub fn with_comments(mut self, repo: &RepoRef, number: u64, comments: Vec<RawComment>) -> Self {
        self.comments.insert((repo.clone(), number), comments);
        self
    }

    pub fn with_reviews(mut self, repo: &RepoRef, number: u64, reviews: Vec<RawReview>) -> Self {
        self.reviews.insert((repo.clone(), number), reviews);
        self
    }

    pub fn with_events(mut self, repo: &RepoRef, number: u64, events: Vec<RawIssueEvent>) -> Self {
        self.events.insert((repo.clone(), number), events);
        self
    }

    pub fn failing(mut self, repo: &RepoRef) -> Self {
        self.failing_repos.insert(repo.clone());
        self
    }

    fn check(&self, repo: &RepoRef) -> Result<()> {
        if self.failing_repos.contains(repo) {
            return Err(ConversationError::Api {
                status: 502,
                message: "Bad Gateway".to_string(),
            });
        }
        Ok(())
    }
}

pub(crate) fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

pub(crate) fn user(login: &str, bot: bool) -> RawUser {
    RawUser {
        login: login.to_string(),
        avatar_url: format!("https://avatars.example/{login}"),
        user_type: if bot { "Bot" } else { "User" }.to_string(),
    }
}

pub(crate) fn issue(number: u64, created: &str, updated: &str, labels: &[&str]) -> RawIssue {
    RawIssue {
        id: 1000 + number,
        number,
        title: format!("Issue {number}"),
        body: Some(String::new()),
        user: Some(user("alice", false)),
        labels: labels
            .iter()
            .map(|name| RawLabel::Detailed {
                name: Some((*name).to_string()),
                color: Some("ededed".to_string()),
            })
            .collect(),
        state: "open".to_string(),
        pull_request: None,
        created_at: ts(created),
        updated_at: ts(updated),
    }
}

pub(crate) fn pull_request(number: u64, created: &str, updated: &str, labels: &[&str]) -> RawIssue {
    RawIssue {
        pull_request: Some(RawPullRequestRef::default()),
        ..issue(number, created, updated, labels)
    }
}

pub(crate) fn comment(id: u64, author: RawUser, body: &str, created: &str) -> RawComment {
    RawComment {
        id,
        user: Some(author),
        body: Some(body.to_string()),
        created_at: ts(created),
    }
}

pub(crate) fn review(id: u64, author: RawUser, body: &str, submitted: &str) -> RawReview {
    RawReview {
        id,
        user: Some(author),
        body: Some(body.to_string()),
        submitted_at: Some(ts(submitted)),
        state: "COMMENTED".to_string(),
    }
}

pub(crate) fn label_event(event: &str, label: &str, at: &str) -> RawIssueEvent {
    RawIssueEvent {
        event: event.to_string(),
        label: Some(super::RawEventLabel {
            name: Some(label.to_string()),
        }),
        created_at: Some(ts(at)),
    }
}

#[async_trait]
impl GitHubProvider for FakeProvider {
    async fn list_issues(&self, repo: &RepoRef) -> Result<Vec<RawIssue>> {
        self.check(repo)?;
        Ok(self.issues.get(repo).cloned().unwrap_or_default())
    }

    async fn get_issue(&self, repo: &RepoRef, number: u64) -> Result<RawIssue> {
        self.check(repo)?;
        self.issues
            .get(repo)
            .and_then(|issues| issues.iter().find(|i| i.number == number))
            .cloned()
            .ok_or_else(|| ConversationError::NotFound(format!("{repo}#{number}")))
    }

    async fn list_comments(&self, repo: &RepoRef, number: u64) -> Result<Vec<RawComment>> {
        self.check(repo)?;
        Ok(self
            .comments
            .get(&(repo.clone(), number))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_reviews(&self, repo: &RepoRef, number: u64) -> Result<Vec<RawReview>> {
        self.check(repo)?;
        Ok(self
            .reviews
            .get(&(repo.clone(), number))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_issue_events(
        &self,
        repo: &RepoRef,
        number: u64,
    ) -> Result<Vec<RawIssueEvent>> {
        self.check(repo)?;
        if self.failing_events {
            return Err(ConversationError::Api {
                status: 503,
                message: "events unavailable".to_string(),
            });
        }
        Ok(self
            .events
            .get(&(repo.clone(), number))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_labels(&self, repo: &RepoRef, number: u64) -> Result<Vec<String>> {
        self.check(repo)?;
        Ok(self
            .labels
            .lock()
            .expect("labels lock")
            .get(&(repo.clone(), number))
            .cloned()
            .unwrap_or_default())
    }

    async fn add_labels(&self, repo: &RepoRef, number: u64, labels: &[String]) -> Result<()> {
        self.check(repo)?;
        let mut all = self.labels.lock().expect("labels lock");
        let entry = all.entry((repo.clone(), number)).or_default();
        for label in labels {
            if !entry.contains(label) {
                entry.push(label.clone());
            }
        }
        Ok(())
    }

    async fn remove_label(&self, repo: &RepoRef, number: u64, label: &str) -> Result<()> {
        self.check(repo)?;
        if let Some(entry) = self
            .labels
            .lock()
            .expect("labels lock")
            .get_mut(&(repo.clone(), number))
        {
            entry.retain(|l| l != label);
        }
        Ok(())
    }

    async fn create_comment(&self, repo: &RepoRef, number: u64, body: &str) -> Result<RawComment> {
        self.check(repo)?;
        let mut posted = self.posted_comments.lock().expect("comments lock");
        posted.push(((repo.clone(), number), body.to_string()));
        Ok(RawComment {
            id: 9000 + posted.len() as u64,
            user: Some(user("me", false)),
            body: Some(body.to_string()),
            created_at: ts("2024-06-01T00:00:00Z"),
        })
    }

    async fn create_issue(&self, repo: &RepoRef, new_issue: &NewIssue) -> Result<RawIssue> {
        self.check(repo)?;
        let mut created = issue(77, "2024-06-01T00:00:00Z", "2024-06-01T00:00:00Z", &[]);
        created.title.clone_from(&new_issue.title);
        created.body = Some(new_issue.body.clone());
        Ok(created)
    }

    async fn close_issue(&self, repo: &RepoRef, _number: u64) -> Result<()> {
        self.check(repo)
    }

    async fn list_user_repos(&self) -> Result<Vec<Repository>> {
        Ok(vec![Repository {
            owner: "acme".to_string(),
            name: "widgets".to_string(),
            full_name: "acme/widgets".to_string(),
            description: None,
            open_issue_count: 1,
            private: false,
        }])
    }
}
