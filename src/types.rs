//! Shared domain types: teams, platform identities, ticket records.

use serde::{Deserialize, Serialize};

/// A team that support requests can be routed to.
///
/// Records are owned by the team directory (see [`crate::teams`]); the
/// resolver only ever reads them. `schedule_ref` points at an on-call
/// schedule in the external schedule service; `fallback_group` is the
/// chat-platform group used when no individual can be determined.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRecord {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_group: Option<String>,
}

/// A chat-platform user identity.
///
/// Topic-parsed entries carry only the id/handle; directory lookups may
/// also carry a display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformUserRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PlatformUserRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

/// The resolved on-call identity for a team.
///
/// `Unresolved` is a valid terminal outcome, not an error: it means every
/// routing source came up empty and the caller should flag the request as
/// unrouted rather than fail it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum OnCallIdentity {
    PlatformUser { id: String },
    GroupMention { id: String },
    Unresolved,
}

impl OnCallIdentity {
    /// Format the `@mention` string used in outgoing messages.
    ///
    /// Users render as `<@U…>`, groups as `<!subteam^S…>`. `Unresolved`
    /// has no mention; the caller decides how to flag that.
    pub fn mention(&self) -> Option<String> {
        match self {
            OnCallIdentity::PlatformUser { id } => Some(format!("<@{}>", id)),
            OnCallIdentity::GroupMention { id } => Some(format!("<!subteam^{}>", id)),
            OnCallIdentity::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, OnCallIdentity::Unresolved)
    }
}

/// One support request's lifecycle in the ticket ledger.
///
/// `correlation_key` is assigned at submission time and never changes; it
/// is the sole means of locating the row later. `first_reply_at` is set at
/// most once, on the first threaded reply. Timestamps are RFC 3339 strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRecord {
    pub correlation_key: String,
    pub submitter: String,
    pub created_at: String,
    pub recipients: Vec<OnCallIdentity>,
    pub team: String,
    pub summary: String,
    pub message_link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_reply_at: Option<String>,
}
