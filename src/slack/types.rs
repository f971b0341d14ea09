//! Slack Web API response types.
//!
//! Only the fields the bot reads are modelled; everything else in the
//! payloads is ignored by serde.

use serde::{Deserialize, Serialize};

/// Common envelope of every Web API response
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlackUser {
    pub id: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_owner: bool,
    #[serde(default)]
    pub is_bot: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsersInfoResponse {
    pub user: Option<SlackUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackConversation {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_private: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationsInfoResponse {
    pub channel: Option<SlackConversation>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationsMembersResponse {
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

impl ConversationsMembersResponse {
    /// Cursor for the next page, if there is one
    pub fn next_cursor(&self) -> Option<&str> {
        self.response_metadata
            .as_ref()
            .and_then(|m| m.next_cursor.as_deref())
            .filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleAssignment {
    #[serde(default)]
    pub role_id: Option<String>,
    #[serde(default)]
    pub users: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleAssignmentsResponse {
    #[serde(default)]
    pub role_assignments: Vec<RoleAssignment>,
}
