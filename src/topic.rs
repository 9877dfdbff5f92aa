//! Channel-topic routing table parser.
//!
//! Channel owners can hand-edit the support channel's topic to override
//! routing, e.g. `"platform: @alice | infra: <@U042MGR>"`. Entries are
//! `team: @user` pairs separated by commas, pipes, bullets, or newlines.
//! The parse is tolerant: malformed segments are skipped individually.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::types::PlatformUserRef;

// Compile-once entry pattern via OnceLock. Matches "team name: @handle"
// with an optional <@U…> mention wrapper around the user token.
fn re_entry() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z0-9][A-Za-z0-9 _/&-]*?)\s*:\s*<?@([A-Za-z0-9._-]+)>?\s*$")
            .unwrap()
    })
}

/// Parse a channel topic into a team-title → user routing table.
///
/// Keys are lower-cased so lookup by team title is case-insensitive.
/// Returns `None` when the topic is empty or contains no recognizable
/// association (never an empty map), so callers can distinguish "no
/// data available" from "data available but no match". Pure function of
/// its input; the topic is re-fetched and re-parsed on every resolution
/// because a stale table would silently misroute tickets.
pub fn parse(topic: &str) -> Option<HashMap<String, PlatformUserRef>> {
    if topic.trim().is_empty() {
        return None;
    }

    let mut table = HashMap::new();
    for segment in topic.split(['\n', ',', '|', '•']) {
        let Some(caps) = re_entry().captures(segment) else {
            continue;
        };
        let team = caps[1].trim().to_lowercase();
        table.insert(team, PlatformUserRef::new(&caps[2]));
    }

    if table.is_empty() {
        None
    } else {
        Some(table)
    }
}
