//! Slack Web API integration.
//!
//! - [`api`]: HTTP client for the bot-token Web API methods
//! - [`types`]: response payloads
//! - [`signature`]: request signature verification for inbound requests
//!
//! The command handler only talks to Slack through the [`ChatPlatform`]
//! trait, so tests can substitute a recording fake.

use async_trait::async_trait;

use crate::visibility::ChannelVisibilityState;

pub mod api;
pub mod signature;
pub mod types;

pub use api::SlackApiClient;
pub use types::SlackUser;

/// Errors returned by Slack HTTP calls
#[derive(Debug, thiserror::Error)]
pub enum SlackApiError {
    #[error("{method} request failed: {source}")]
    Http {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} returned HTTP {status}")]
    Status { method: &'static str, status: u16 },

    #[error("{method} failed: {error}")]
    Api { method: &'static str, error: String },

    #[error("{method} response is missing `{field}`")]
    MissingField {
        method: &'static str,
        field: &'static str,
    },

    #[error("{method} returned an unreadable body: {source}")]
    Decode {
        method: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl SlackApiError {
    /// The Slack error code (`channel_not_found`, ...) when the API answered `ok: false`
    pub fn api_error(&self) -> Option<&str> {
        match self {
            SlackApiError::Api { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// The subset of the chat platform the bot needs
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Look up a user's profile flags
    async fn get_user(&self, user_id: &str) -> Result<SlackUser, SlackApiError>;

    /// Fetch the current visibility of a channel
    async fn get_conversation_info(
        &self,
        channel_id: &str,
    ) -> Result<ChannelVisibilityState, SlackApiError>;

    /// Post a message only `user_id` can see
    async fn post_ephemeral(
        &self,
        channel_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<(), SlackApiError>;

    /// List every member of a channel
    async fn list_conversation_members(
        &self,
        channel_id: &str,
    ) -> Result<Vec<String>, SlackApiError>;
}
