//! # GitHub REST Client
//!
//! [`GitHubProvider`] implementation on top of the GitHub REST API. Requests
//! are single-page (`per_page=100`) and never retried; rate-limit responses
//! surface as [`ConversationError::RateLimited`] so callers can tell them
//! apart from other upstream failures.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client as HttpClient, Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::{
    GitHubProvider, NewIssue, RawComment, RawIssue, RawIssueEvent, RawLabel, RawRepository,
    RawReview, Repository, PER_PAGE,
};
use crate::config::Config;
use crate::error::{ConversationError, Result};
use crate::models::RepoRef;

/// Default GitHub API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const ACCEPT_GITHUB_JSON: &str = "application/vnd.github+json";

#[derive(Debug, Deserialize)]
struct GitHubError {
    #[serde(default)]
    message: String,
}

/// GitHub API client.
#[derive(Clone)]
pub struct GitHubClient {
    http_client: HttpClient,
    base_url: Url,
    token: String,
}

impl GitHubClient {
    /// Create a client against `base_url` with a bearer token.
    pub fn new(
        token: impl Into<String>,
        base_url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.into();
        let base_url = Url::parse(&base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or(ConversationError::InvalidUrl(base_url))?;

        let http_client = HttpClient::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url,
            token: token.into(),
        })
    }

    /// Create a client from runtime configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let token = config
            .github_token
            .clone()
            .ok_or(ConversationError::Unauthorized)?;
        Self::new(
            token,
            config.api_url.clone(),
            &config.user_agent,
            config.request_timeout,
        )
    }

    /// Append path segments to the base URL. Each segment is percent-encoded
    /// on its own, so `/`, `?` and `#` inside a label name stay in that segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn repo_url(&self, repo: &RepoRef, segments: &[&str]) -> Url {
        let mut full = vec!["repos", repo.owner.as_str(), repo.name.as_str()];
        full.extend_from_slice(segments);
        self.endpoint(&full)
    }

    /// Send a request and turn non-success statuses into errors.
    async fn send(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<Response> {
        let mut request = self
            .http_client
            .request(method, url.clone())
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .header(header::ACCEPT, ACCEPT_GITHUB_JSON);

        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if let Some(reset_in) = Self::rate_limit_reset(&response) {
            return Err(ConversationError::RateLimited { reset_in });
        }

        let message = response
            .json::<GitHubError>()
            .await
            .map(|e| e.message)
            .unwrap_or_default();

        Err(match status {
            StatusCode::UNAUTHORIZED => ConversationError::Unauthorized,
            StatusCode::NOT_FOUND => ConversationError::NotFound(url.path().to_string()),
            _ => ConversationError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, query: &[(&str, String)]) -> Result<T> {
        let response = self.send(Method::GET, url, query, None).await?;
        Ok(response.json().await?)
    }

    fn page_query() -> Vec<(&'static str, String)> {
        vec![("per_page", PER_PAGE.to_string())]
    }

    /// Time until the rate limit resets, when the response is a rate-limit rejection.
    fn rate_limit_reset(response: &Response) -> Option<Duration> {
        let status = response.status();
        if status != StatusCode::FORBIDDEN && status != StatusCode::TOO_MANY_REQUESTS {
            return None;
        }

        let headers = response.headers();
        let remaining = headers
            .get("x-ratelimit-remaining")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<i64>().ok());
        if remaining != Some(0) && status != StatusCode::TOO_MANY_REQUESTS {
            return None;
        }

        let reset_in = headers
            .get("x-ratelimit-reset")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<i64>().ok())
            .map_or(Duration::from_secs(60), |reset_timestamp| {
                let now = chrono::Utc::now().timestamp();
                #[allow(clippy::cast_sign_loss)]
                let seconds_until_reset = (reset_timestamp - now).max(0) as u64;
                Duration::from_secs(seconds_until_reset)
            });
        Some(reset_in)
    }
}

#[async_trait]
impl GitHubProvider for GitHubClient {
    #[instrument(skip(self, repo), fields(repo = %repo))]
    async fn list_issues(&self, repo: &RepoRef) -> Result<Vec<RawIssue>> {
        let mut query = Self::page_query();
        query.extend([
            ("state", "all".to_string()),
            ("sort", "updated".to_string()),
            ("direction", "desc".to_string()),
        ]);

        let issues: Vec<RawIssue> = self.get_json(self.repo_url(repo, &["issues"]), &query).await?;
        debug!(count = issues.len(), "Listed issues");
        Ok(issues)
    }

    #[instrument(skip(self, repo), fields(repo = %repo))]
    async fn get_issue(&self, repo: &RepoRef, number: u64) -> Result<RawIssue> {
        let number = number.to_string();
        self.get_json(self.repo_url(repo, &["issues", &number]), &[])
            .await
    }

    #[instrument(skip(self, repo), fields(repo = %repo))]
    async fn list_comments(&self, repo: &RepoRef, number: u64) -> Result<Vec<RawComment>> {
        let number = number.to_string();
        self.get_json(
            self.repo_url(repo, &["issues", &number, "comments"]),
            &Self::page_query(),
        )
        .await
    }

    #[instrument(skip(self, repo), fields(repo = %repo))]
    async fn list_reviews(&self, repo: &RepoRef, number: u64) -> Result<Vec<RawReview>> {
        let number = number.to_string();
        self.get_json(
            self.repo_url(repo, &["pulls", &number, "reviews"]),
            &Self::page_query(),
        )
        .await
    }

    #[instrument(skip(self, repo), fields(repo = %repo))]
    async fn list_issue_events(
        &self,
        repo: &RepoRef,
        number: u64,
    ) -> Result<Vec<RawIssueEvent>> {
        let number = number.to_string();
        self.get_json(
            self.repo_url(repo, &["issues", &number, "events"]),
            &Self::page_query(),
        )
        .await
    }

    #[instrument(skip(self, repo), fields(repo = %repo))]
    async fn list_labels(&self, repo: &RepoRef, number: u64) -> Result<Vec<String>> {
        let number = number.to_string();
        let labels: Vec<RawLabel> = self
            .get_json(
                self.repo_url(repo, &["issues", &number, "labels"]),
                &Self::page_query(),
            )
            .await?;
        Ok(labels
            .iter()
            .filter_map(RawLabel::normalize)
            .map(|label| label.name)
            .collect())
    }

    #[instrument(skip(self, repo, labels), fields(repo = %repo, labels = ?labels))]
    async fn add_labels(&self, repo: &RepoRef, number: u64, labels: &[String]) -> Result<()> {
        if labels.is_empty() {
            return Ok(());
        }

        let body = serde_json::json!({ "labels": labels });
        self.send(
            Method::POST,
            self.repo_url(repo, &["issues", &number.to_string(), "labels"]),
            &[],
            Some(body),
        )
        .await?;

        info!("Added {} labels to #{}", labels.len(), number);
        Ok(())
    }

    #[instrument(skip(self, repo), fields(repo = %repo))]
    async fn remove_label(&self, repo: &RepoRef, number: u64, label: &str) -> Result<()> {
        let url = self.repo_url(repo, &["issues", &number.to_string(), "labels", label]);
        match self.send(Method::DELETE, url, &[], None).await {
            Ok(_) => {
                debug!("Removed label '{}' from #{}", label, number);
                Ok(())
            }
            Err(ConversationError::NotFound(_)) => {
                debug!("Label '{}' not found on #{} (already removed)", label, number);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, repo, body), fields(repo = %repo))]
    async fn create_comment(&self, repo: &RepoRef, number: u64, body: &str) -> Result<RawComment> {
        let response = self
            .send(
                Method::POST,
                self.repo_url(repo, &["issues", &number.to_string(), "comments"]),
                &[],
                Some(serde_json::json!({ "body": body })),
            )
            .await?;
        let comment: RawComment = response.json().await?;
        info!(comment_id = comment.id, "Posted comment on #{}", number);
        Ok(comment)
    }

    #[instrument(skip(self, repo, issue), fields(repo = %repo, title = %issue.title))]
    async fn create_issue(&self, repo: &RepoRef, issue: &NewIssue) -> Result<RawIssue> {
        let response = self
            .send(
                Method::POST,
                self.repo_url(repo, &["issues"]),
                &[],
                Some(serde_json::to_value(issue)?),
            )
            .await?;
        let created: RawIssue = response.json().await?;
        info!(number = created.number, "Created issue");
        Ok(created)
    }

    #[instrument(skip(self, repo), fields(repo = %repo))]
    async fn close_issue(&self, repo: &RepoRef, number: u64) -> Result<()> {
        self.send(
            Method::PATCH,
            self.repo_url(repo, &["issues", &number.to_string()]),
            &[],
            Some(serde_json::json!({ "state": "closed" })),
        )
        .await?;
        info!("Closed #{}", number);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_user_repos(&self) -> Result<Vec<Repository>> {
        let mut query = Self::page_query();
        query.extend([
            ("sort", "updated".to_string()),
            ("type", "owner".to_string()),
        ]);

        let repos: Vec<RawRepository> = self
            .get_json(self.endpoint(&["user", "repos"]), &query)
            .await?;
        Ok(repos.into_iter().map(Repository::from).collect())
    }
}
