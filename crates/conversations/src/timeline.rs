//! Label-event timeline for one issue or pull request.
//!
//! Every label add and remove is kept, repeats included, because role
//! resolution replays the full history.

use tracing::{debug, instrument};

use crate::error::Result;
use crate::github::{GitHubProvider, RawIssueEvent};
use crate::models::{LabelEvent, LabelEventKind, RepoRef};

/// Ascending-by-timestamp label history of a thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTimeline {
    events: Vec<LabelEvent>,
}

impl LabelTimeline {
    /// Build a timeline from already-typed events, sorting them by timestamp.
    /// Events with an empty label name are dropped. The sort is stable, so
    /// events sharing a timestamp keep their input order.
    #[must_use]
    pub fn new(events: impl IntoIterator<Item = LabelEvent>) -> Self {
        let mut events: Vec<LabelEvent> = events
            .into_iter()
            .filter(|event| !event.label.is_empty())
            .collect();
        events.sort_by_key(|event| event.created_at);
        Self { events }
    }

    /// Keep the `labeled`/`unlabeled` entries of a raw issue event list.
    #[must_use]
    pub fn from_raw(raw: &[RawIssueEvent]) -> Self {
        Self::new(raw.iter().filter_map(label_event_from_raw))
    }

    #[must_use]
    pub fn events(&self) -> &[LabelEvent] {
        &self.events
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

fn label_event_from_raw(raw: &RawIssueEvent) -> Option<LabelEvent> {
    let kind = match raw.event.as_str() {
        "labeled" => LabelEventKind::Labeled,
        "unlabeled" => LabelEventKind::Unlabeled,
        _ => return None,
    };
    let label = raw.label.as_ref()?.name.as_deref()?;
    if label.is_empty() {
        return None;
    }
    // An event with no timestamp can never be at or before a message.
    let Some(created_at) = raw.created_at else {
        debug!(label, "Dropping label event without timestamp");
        return None;
    };

    Some(LabelEvent {
        kind,
        label: label.to_string(),
        created_at,
    })
}

/// Fetch and order the label history of `repo#number`.
///
/// Fetch failures propagate: without the history, role attribution is
/// indeterminate rather than empty.
#[instrument(skip(provider, repo), fields(repo = %repo))]
pub async fn fetch_label_timeline(
    provider: &dyn GitHubProvider,
    repo: &RepoRef,
    number: u64,
) -> Result<LabelTimeline> {
    let raw = provider.list_issue_events(repo, number).await?;
    let timeline = LabelTimeline::from_raw(&raw);
    debug!(
        raw_events = raw.len(),
        label_events = timeline.len(),
        "Built label timeline"
    );
    Ok(timeline)
}
