//! Formatting helpers for terminal output and issue creation.

use chrono::{DateTime, Utc};

/// Maximum length of a derived issue title.
pub const MAX_TITLE_LEN: usize = 80;

/// Compact age of `ts` relative to `now`.
///
/// Under a minute is "just now", then minutes, hours and days up to a week.
/// Older timestamps (and future ones beyond the first minute) render as the
/// short date, e.g. "Mar 4".
#[must_use]
pub fn relative_time(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(ts);
    let seconds = elapsed.num_seconds();
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if (0..60).contains(&seconds) {
        "just now".to_string()
    } else if (0..60).contains(&minutes) {
        format!("{minutes}m ago")
    } else if (0..24).contains(&hours) {
        format!("{hours}h ago")
    } else if (0..7).contains(&days) {
        format!("{days}d ago")
    } else {
        ts.format("%b %-d").to_string()
    }
}

/// Cut `s` to at most `max` characters, trimming trailing whitespace and
/// appending "..." when anything was cut.
#[must_use]
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}

/// Derive an issue title from a body: the first sentence of the first line,
/// or the whole first line when that sentence is empty.
#[must_use]
pub fn extract_issue_title(body: &str) -> String {
    let first_line = body.split('\n').next().unwrap_or_default().trim();
    let first_sentence = first_line
        .split(['.', '!', '?'])
        .next()
        .unwrap_or_default()
        .trim();
    let title = if first_sentence.is_empty() {
        first_line
    } else {
        first_sentence
    };
    truncate(title, MAX_TITLE_LEN)
}
