//! Conversation assembly.
//!
//! Listing builds one [`Conversation`] per issue or pull request across all
//! tracked repositories and classifies it from labels and type alone.
//! Messages are fetched on demand for a single conversation.

use std::sync::Arc;

use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::classifier::classify;
use crate::error::{ConversationError, Result};
use crate::github::{author_from, normalize_labels, GitHubProvider, RawIssue};
use crate::models::{
    Conversation, ConversationId, ConversationKind, ConversationState, Message, RepoRef,
};
use crate::normalizer::{normalize, RawThread};
use crate::timeline::fetch_label_timeline;

/// A conversation together with its full message list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetail {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

/// Builds conversations and message lists from a [`GitHubProvider`].
#[derive(Clone)]
pub struct ConversationAssembler {
    provider: Arc<dyn GitHubProvider>,
}

impl ConversationAssembler {
    pub fn new(provider: Arc<dyn GitHubProvider>) -> Self {
        Self { provider }
    }

    /// Conversations of every repository, most recently updated first.
    ///
    /// Repositories are fetched concurrently. Any failing repository fails
    /// the whole call, so a returned list is always complete.
    #[instrument(skip(self, repos), fields(repo_count = repos.len()))]
    pub async fn list_conversations(&self, repos: &[RepoRef]) -> Result<Vec<Conversation>> {
        let fetches = repos.iter().map(|repo| async move {
            let issues = self
                .provider
                .list_issues(repo)
                .await
                .map_err(|e| e.for_repository(repo.full_name()))?;
            debug!(repo = %repo, count = issues.len(), "Fetched issues");
            Ok::<_, ConversationError>(
                issues
                    .iter()
                    .map(|issue| build_conversation(repo, issue))
                    .collect::<Vec<_>>(),
            )
        });

        let mut conversations: Vec<Conversation> =
            try_join_all(fetches).await?.into_iter().flatten().collect();

        // Tie-break on id so completion order never shows through.
        conversations.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.id.to_string().cmp(&b.id.to_string()))
        });

        info!(count = conversations.len(), "Assembled conversations");
        Ok(conversations)
    }

    /// Ordered, attributed messages of `repo#number`.
    #[instrument(skip(self, repo), fields(repo = %repo))]
    pub async fn list_messages(&self, repo: &RepoRef, number: u64) -> Result<Vec<Message>> {
        let issue = self.provider.get_issue(repo, number).await?;
        self.messages_for(repo, issue).await.map(|(_, messages)| messages)
    }

    /// A single conversation with its messages. Attention is computed with
    /// the chronologically last message, reviews included.
    #[instrument(skip(self, repo), fields(repo = %repo))]
    pub async fn conversation_detail(
        &self,
        repo: &RepoRef,
        number: u64,
    ) -> Result<ConversationDetail> {
        let issue = self.provider.get_issue(repo, number).await?;
        let (issue, messages) = self.messages_for(repo, issue).await?;

        let mut conversation = build_conversation(repo, &issue);
        conversation.last_message = messages.last().cloned();
        conversation.attention_level = classify(
            &conversation.labels,
            conversation.last_message.as_ref(),
            conversation.kind,
        );

        Ok(ConversationDetail {
            conversation,
            messages,
        })
    }

    async fn messages_for(&self, repo: &RepoRef, issue: RawIssue) -> Result<(RawIssue, Vec<Message>)> {
        let number = issue.number;
        let is_pull_request = issue.is_pull_request();
        let provider = self.provider.as_ref();

        let reviews = async {
            if is_pull_request {
                provider.list_reviews(repo, number).await
            } else {
                Ok(Vec::new())
            }
        };

        // The timeline is complete before any message is enriched.
        let (comments, reviews, timeline) = tokio::try_join!(
            provider.list_comments(repo, number),
            reviews,
            fetch_label_timeline(provider, repo, number),
        )?;

        let thread = RawThread {
            issue,
            comments,
            reviews,
        };
        let messages = normalize(&thread, &timeline);
        debug!(number, messages = messages.len(), "Normalized thread");

        Ok((thread.issue, messages))
    }
}

/// Build the list-view record of one issue or pull request.
#[must_use]
pub fn build_conversation(repo: &RepoRef, issue: &RawIssue) -> Conversation {
    let kind = if issue.is_pull_request() {
        ConversationKind::PullRequest
    } else {
        ConversationKind::Issue
    };
    let labels = normalize_labels(&issue.labels);
    let attention_level = classify(&labels, None, kind);

    Conversation {
        id: ConversationId {
            repo: repo.clone(),
            kind,
            number: issue.number,
        },
        repo: repo.clone(),
        kind,
        number: issue.number,
        title: issue.title.clone(),
        state: ConversationState::derive(kind, &issue.state, issue.is_merged()),
        labels,
        created_at: issue.created_at,
        updated_at: issue.updated_at,
        body: issue.body.clone().unwrap_or_default(),
        author: author_from(issue.user.as_ref()),
        last_message: None,
        attention_level,
        unread_count: 0,
    }
}
