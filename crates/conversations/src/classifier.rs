//! Attention classification.
//!
//! An ordered decision list, first match wins:
//!
//! 1. `blocked` → urgent
//! 2. `needs-human-input` → urgent
//! 3. an active pipeline label → working
//! 4. `needs-review` → review
//! 5. last message from an automated author that asks a question → urgent
//! 6. pull request without `auto-merge` → review
//! 7. otherwise → none
//!
//! Label names compare case-insensitively.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{AttentionLevel, ConversationKind, Label, Message};

pub const LABEL_BLOCKED: &str = "blocked";
pub const LABEL_NEEDS_HUMAN_INPUT: &str = "needs-human-input";
pub const LABEL_NEEDS_REVIEW: &str = "needs-review";
pub const LABEL_AUTO_MERGE: &str = "auto-merge";

/// Labels meaning an agent is still working the thread.
pub const WORKING_LABELS: &[&str] = &["claude-working", "planning", "plan-review", "ready-to-implement"];

/// Phrasings that read as a question to the human.
static QUESTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?m)\?\s*$").unwrap(),
        Regex::new(r"(?i)should I").unwrap(),
        Regex::new(r"(?i)do you want").unwrap(),
        Regex::new(r"(?i)please (clarify|confirm|specify)").unwrap(),
        Regex::new(r"(?i)I('m| am) (unsure|not sure)").unwrap(),
        Regex::new(r"(?i)which (approach|option|method)").unwrap(),
        Regex::new(r"(?i)could you (help|explain|tell)").unwrap(),
        Regex::new(r"(?i)what .* prefer").unwrap(),
        Regex::new(r"(?i)need .* (input|decision|guidance)").unwrap(),
    ]
});

/// Whether a body looks like it is asking the reader something.
#[must_use]
pub fn contains_question(body: &str) -> bool {
    QUESTION_PATTERNS.iter().any(|pattern| pattern.is_match(body))
}

fn has_label(labels: &[Label], name: &str) -> bool {
    labels.iter().any(|label| label.is(name))
}

/// Compute the attention level of a conversation.
#[must_use]
pub fn classify(
    labels: &[Label],
    last_message: Option<&Message>,
    kind: ConversationKind,
) -> AttentionLevel {
    if has_label(labels, LABEL_BLOCKED) || has_label(labels, LABEL_NEEDS_HUMAN_INPUT) {
        return AttentionLevel::Urgent;
    }

    if WORKING_LABELS.iter().any(|name| has_label(labels, name)) {
        return AttentionLevel::Working;
    }

    if has_label(labels, LABEL_NEEDS_REVIEW) {
        return AttentionLevel::Review;
    }

    if last_message.is_some_and(|message| message.author.is_bot && contains_question(&message.body))
    {
        return AttentionLevel::Urgent;
    }

    // Unlabeled PRs default to review so they are not silently ignored.
    if kind == ConversationKind::PullRequest && !has_label(labels, LABEL_AUTO_MERGE) {
        return AttentionLevel::Review;
    }

    AttentionLevel::None
}
