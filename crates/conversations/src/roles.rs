//! Agent-role resolution by label replay.
//!
//! Label events are only available as history, so the workflow phase active
//! when a message was posted has to be reconstructed: fold every tracked
//! label event at or before the message timestamp into the set of active
//! workflow labels, then pick the highest-priority one.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::models::{AgentType, LabelEvent, LabelEventKind};
use crate::timeline::LabelTimeline;

/// A label whose presence marks an agent workflow phase.
///
/// Variant order is priority order: a later variant wins over an earlier one
/// when both are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WorkflowLabel {
    Planning,
    PlanReview,
    ReadyToImplement,
}

impl WorkflowLabel {
    pub const ALL: [Self; 3] = [Self::Planning, Self::PlanReview, Self::ReadyToImplement];

    /// Exact (case-sensitive) label name match.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|label| label.name() == name)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::PlanReview => "plan-review",
            Self::ReadyToImplement => "ready-to-implement",
        }
    }

    /// Agent role that works during this phase.
    #[must_use]
    pub fn agent(self) -> AgentType {
        match self {
            Self::Planning => AgentType::Plan,
            Self::PlanReview => AgentType::Review,
            Self::ReadyToImplement => AgentType::Implement,
        }
    }
}

/// Workflow labels active at `at`, replaying every tracked event with a
/// timestamp at or before it. Later events are ignored.
#[must_use]
pub fn active_workflow_labels(at: DateTime<Utc>, events: &[LabelEvent]) -> BTreeSet<WorkflowLabel> {
    events
        .iter()
        .filter(|event| event.created_at <= at)
        .filter_map(|event| WorkflowLabel::from_name(&event.label).map(|label| (event.kind, label)))
        .fold(BTreeSet::new(), |mut active, (kind, label)| {
            match kind {
                LabelEventKind::Labeled => active.insert(label),
                LabelEventKind::Unlabeled => active.remove(&label),
            };
            active
        })
}

/// Agent role active at `at`, or `None` when no workflow label was on.
/// Ties between active labels go to the fixed priority, never to recency.
#[must_use]
pub fn resolve(at: DateTime<Utc>, timeline: &LabelTimeline) -> Option<AgentType> {
    active_workflow_labels(at, timeline.events())
        .last()
        .map(|label| label.agent())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::fake::ts;

    fn replay_timeline() -> LabelTimeline {
        LabelTimeline::new(vec![
            LabelEvent::labeled("planning", ts("2024-01-01T00:00:00Z")),
            LabelEvent::labeled("plan-review", ts("2024-01-02T00:00:00Z")),
            LabelEvent::unlabeled("planning", ts("2024-01-03T00:00:00Z")),
        ])
    }

    #[test]
    fn test_priority_ordering() {
        assert!(WorkflowLabel::ReadyToImplement > WorkflowLabel::PlanReview);
        assert!(WorkflowLabel::PlanReview > WorkflowLabel::Planning);
    }

    #[test]
    fn test_replay() {
        let timeline = replay_timeline();

        assert_eq!(resolve(ts("2023-12-31T00:00:00Z"), &timeline), None);
        assert_eq!(
            resolve(ts("2024-01-01T12:00:00Z"), &timeline),
            Some(AgentType::Plan)
        );
        // both active, plan-review outranks planning
        assert_eq!(
            resolve(ts("2024-01-02T00:00:00Z"), &timeline),
            Some(AgentType::Review)
        );
        assert_eq!(
            resolve(ts("2024-01-04T00:00:00Z"), &timeline),
            Some(AgentType::Review)
        );
    }

    #[test]
    fn test_event_at_exact_timestamp_counts() {
        let timeline = replay_timeline();
        let active = active_workflow_labels(ts("2024-01-01T00:00:00Z"), timeline.events());
        assert!(active.contains(&WorkflowLabel::Planning));
    }

    #[test]
    fn test_future_events_do_not_change_result() {
        let at = ts("2024-01-02T12:00:00Z");
        let before = resolve(at, &replay_timeline());

        let mut events = replay_timeline().events().to_vec();
        events.push(LabelEvent::labeled("ready-to-implement", ts("2024-01-05T00:00:00Z")));
        events.push(LabelEvent::unlabeled("plan-review", ts("2024-01-06T00:00:00Z")));
        let extended = LabelTimeline::new(events);

        assert_eq!(resolve(at, &extended), before);
        assert_eq!(
            resolve(ts("2024-01-07T00:00:00Z"), &extended),
            Some(AgentType::Implement)
        );
    }

    #[test]
    fn test_untracked_and_differently_cased_labels_ignored() {
        let timeline = LabelTimeline::new(vec![
            LabelEvent::labeled("bug", ts("2024-01-01T00:00:00Z")),
            LabelEvent::labeled("Planning", ts("2024-01-01T00:00:00Z")),
        ]);
        assert_eq!(resolve(ts("2024-02-01T00:00:00Z"), &timeline), None);
    }

    #[test]
    fn test_relabel_cycles() {
        let timeline = LabelTimeline::new(vec![
            LabelEvent::labeled("ready-to-implement", ts("2024-01-01T00:00:00Z")),
            LabelEvent::unlabeled("ready-to-implement", ts("2024-01-02T00:00:00Z")),
            LabelEvent::labeled("ready-to-implement", ts("2024-01-03T00:00:00Z")),
        ]);
        assert_eq!(resolve(ts("2024-01-02T12:00:00Z"), &timeline), None);
        assert_eq!(
            resolve(ts("2024-01-03T00:00:01Z"), &timeline),
            Some(AgentType::Implement)
        );
    }

    #[test]
    fn test_unlabel_without_label_is_noop() {
        let timeline = LabelTimeline::new(vec![LabelEvent::unlabeled(
            "planning",
            ts("2024-01-01T00:00:00Z"),
        )]);
        assert_eq!(resolve(ts("2024-01-02T00:00:00Z"), &timeline), None);
    }
}
