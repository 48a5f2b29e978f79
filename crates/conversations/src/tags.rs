//! Inline agent markers and the human-reply pattern.
//!
//! Upstream agent tooling prefixes its posts with `<!-- agent:<role> -->`.
//! The marker syntax is shared with existing repository content and must
//! not change.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::AgentType;

/// `<!-- agent:<role> -->` at the very start of a body.
static AGENT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<!--\s*agent:([A-Za-z][A-Za-z0-9-]*)\s*-->").unwrap());

/// Token that addresses the agent from a human reply.
pub const MENTION_TRIGGER: &str = "@claude";

/// Marker posted by the auto-continue workflow on behalf of a human.
pub const AUTO_CONTINUE_MARKER: &str = "<!-- auto-continue -->";

/// Result of looking for a leading agent marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentTag {
    /// Role identifier as written in the marker.
    pub role: String,
    /// Parsed role; `None` when the identifier is not a known agent type.
    pub agent_type: Option<AgentType>,
    /// Body with the marker and one following newline removed.
    pub body: String,
}

/// Parse a leading agent marker. Returns `None` when the body does not start
/// with one.
#[must_use]
pub fn parse_agent_tag(body: &str) -> Option<AgentTag> {
    let captures = AGENT_TAG.captures(body)?;
    let marker = captures.get(0)?;
    let role = captures.get(1)?.as_str();

    let rest = &body[marker.end()..];
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    Some(AgentTag {
        role: role.to_string(),
        agent_type: role.parse().ok(),
        body: rest.to_string(),
    })
}

/// Whether a body reads as an ordinary human reply: once trimmed it starts
/// with the mention trigger or the auto-continue marker.
#[must_use]
pub fn is_human_reply(body: &str) -> bool {
    let trimmed = body.trim();
    trimmed.starts_with(MENTION_TRIGGER) || trimmed.starts_with(AUTO_CONTINUE_MARKER)
}
