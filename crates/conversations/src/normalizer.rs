//! Message normalization.
//!
//! Turns the raw pieces of one thread (opening body, comments, review
//! submissions) into a single chronological message list and attributes
//! agent roles. Attribution has three tiers, checked in order and never
//! merged:
//!
//! 1. an inline `<!-- agent:<role> -->` marker;
//! 2. a bot author, resolved by label replay;
//! 3. a human-looking author whose body is not an ordinary human reply,
//!    resolved by label replay and reclassified as automated on a hit.
//!
//! Tier 3 covers agents posting through a personal access token.

use tracing::debug;

use crate::github::{author_from, RawComment, RawIssue, RawReview};
use crate::models::{Message, MessageKind};
use crate::roles;
use crate::tags::{is_human_reply, parse_agent_tag};
use crate::timeline::LabelTimeline;

/// Raw content of one issue or pull request.
#[derive(Debug, Clone)]
pub struct RawThread {
    pub issue: RawIssue,
    pub comments: Vec<RawComment>,
    /// Ignored unless `issue` is a pull request.
    pub reviews: Vec<RawReview>,
}

/// Build the ordered, attributed message list for a thread.
///
/// Pure: the same thread and timeline always give the same messages.
#[must_use]
pub fn normalize(thread: &RawThread, timeline: &LabelTimeline) -> Vec<Message> {
    let mut messages = Vec::with_capacity(1 + thread.comments.len() + thread.reviews.len());
    messages.push(seed_message(&thread.issue));

    messages.extend(thread.comments.iter().map(comment_message));

    if thread.issue.is_pull_request() {
        messages.extend(thread.reviews.iter().filter_map(review_message));
    }

    // Stable: equal timestamps keep seed, comment, review order.
    messages.sort_by_key(|message| message.created_at);

    for message in messages.iter_mut().filter(|m| !m.kind.is_seed()) {
        enrich(message, timeline);
    }

    messages
}

fn seed_message(issue: &RawIssue) -> Message {
    let raw_body = issue.body.as_deref().unwrap_or_default();
    let (body, agent_type) = match parse_agent_tag(raw_body) {
        Some(tag) => (tag.body, tag.agent_type),
        None => (raw_body.to_string(), None),
    };

    Message {
        id: issue.id,
        author: author_from(issue.user.as_ref()),
        body,
        created_at: issue.created_at,
        kind: if issue.is_pull_request() {
            MessageKind::PrBody
        } else {
            MessageKind::IssueBody
        },
        agent_type,
    }
}

/// A plain comment as a message, before attribution.
#[must_use]
pub fn comment_message(comment: &RawComment) -> Message {
    Message {
        id: comment.id,
        author: author_from(comment.user.as_ref()),
        body: comment.body.clone().unwrap_or_default(),
        created_at: comment.created_at,
        kind: MessageKind::Comment,
        agent_type: None,
    }
}

/// Reviews without text (silent approvals) and unsubmitted reviews are not
/// messages.
fn review_message(review: &RawReview) -> Option<Message> {
    let body = review.body.as_deref().filter(|body| !body.is_empty())?;
    let Some(submitted_at) = review.submitted_at else {
        debug!(review_id = review.id, "Skipping unsubmitted review");
        return None;
    };

    Some(Message {
        id: review.id,
        author: author_from(review.user.as_ref()),
        body: body.to_string(),
        created_at: submitted_at,
        kind: MessageKind::ReviewComment,
        agent_type: None,
    })
}

fn enrich(message: &mut Message, timeline: &LabelTimeline) {
    // Tier 1: explicit marker wins and ends attribution.
    if let Some(tag) = parse_agent_tag(&message.body) {
        message.body = tag.body;
        message.agent_type = tag.agent_type;
        return;
    }

    // Tier 2: known bot account.
    if message.author.is_bot {
        message.agent_type = roles::resolve(message.created_at, timeline);
        return;
    }

    // Tier 3: human-looking author posting non-human content.
    if is_human_reply(&message.body) {
        return;
    }
    if let Some(agent_type) = roles::resolve(message.created_at, timeline) {
        debug!(
            message_id = message.id,
            login = %message.author.login,
            agent = %agent_type,
            "Reclassifying author as automated"
        );
        message.author.is_bot = true;
        message.agent_type = Some(agent_type);
    }
}
