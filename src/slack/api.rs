//! Slack Web API client.
//!
//! [`SlackApiClient`] calls the bot-token methods the visibility command
//! needs: `users.info`, `conversations.info`, `conversations.members` and
//! `chat.postEphemeral`.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::types::{
    ApiEnvelope, ConversationsInfoResponse, ConversationsMembersResponse, SlackUser,
    UsersInfoResponse,
};
use super::{ChatPlatform, SlackApiError};
use crate::visibility::ChannelVisibilityState;

const MEMBERS_PAGE_SIZE: &str = "200";

/// Read a Web API response, turning `ok: false` into [`SlackApiError::Api`]
pub(crate) async fn decode_response<T: DeserializeOwned>(
    method: &'static str,
    response: reqwest::Response,
) -> Result<T, SlackApiError> {
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .map_err(|source| SlackApiError::Http { method, source })?;

    let envelope: ApiEnvelope = serde_json::from_value(body.clone())
        .map_err(|source| SlackApiError::Decode { method, source })?;

    if !envelope.ok {
        return Err(SlackApiError::Api {
            method,
            error: envelope.error.unwrap_or_else(|| "unknown error".to_string()),
        });
    }
    if !status.is_success() {
        return Err(SlackApiError::Status {
            method,
            status: status.as_u16(),
        });
    }

    serde_json::from_value(body).map_err(|source| SlackApiError::Decode { method, source })
}

/// HTTP client for the Slack Web API, authenticated with the bot token
#[derive(Clone)]
pub struct SlackApiClient {
    http: Client,
    bot_token: String,
    base_url: String,
}

impl SlackApiClient {
    pub fn new(
        bot_token: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("slacky/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            bot_token: bot_token.into().trim().to_string(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        method: &'static str,
        form: &[(&str, &str)],
    ) -> Result<T, SlackApiError> {
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .bearer_auth(&self.bot_token)
            .form(form)
            .send()
            .await
            .map_err(|source| SlackApiError::Http { method, source })?;

        decode_response(method, response).await
    }
}

#[async_trait]
impl ChatPlatform for SlackApiClient {
    async fn get_user(&self, user_id: &str) -> Result<SlackUser, SlackApiError> {
        debug!(user_id = %user_id, "calling users.info");

        let response: UsersInfoResponse = self.post_form("users.info", &[("user", user_id)]).await?;
        response.user.ok_or(SlackApiError::MissingField {
            method: "users.info",
            field: "user",
        })
    }

    async fn get_conversation_info(
        &self,
        channel_id: &str,
    ) -> Result<ChannelVisibilityState, SlackApiError> {
        debug!(channel_id = %channel_id, "calling conversations.info");

        let response: ConversationsInfoResponse = self
            .post_form("conversations.info", &[("channel", channel_id)])
            .await?;
        let channel = response.channel.ok_or(SlackApiError::MissingField {
            method: "conversations.info",
            field: "channel",
        })?;
        let is_private = channel.is_private.ok_or(SlackApiError::MissingField {
            method: "conversations.info",
            field: "channel.is_private",
        })?;

        Ok(ChannelVisibilityState {
            channel_id: channel.id,
            is_private,
        })
    }

    async fn post_ephemeral(
        &self,
        channel_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<(), SlackApiError> {
        const METHOD: &str = "chat.postEphemeral";
        debug!(channel_id = %channel_id, user_id = %user_id, "posting ephemeral message");

        let response = self
            .http
            .post(format!("{}/{}", self.base_url, METHOD))
            .bearer_auth(&self.bot_token)
            .json(&json!({
                "channel": channel_id,
                "user": user_id,
                "text": text,
            }))
            .send()
            .await
            .map_err(|source| SlackApiError::Http {
                method: METHOD,
                source,
            })?;

        decode_response::<ApiEnvelope>(METHOD, response).await?;
        Ok(())
    }

    async fn list_conversation_members(
        &self,
        channel_id: &str,
    ) -> Result<Vec<String>, SlackApiError> {
        let mut members = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut form = vec![("channel", channel_id), ("limit", MEMBERS_PAGE_SIZE)];
            if let Some(cursor) = cursor.as_deref() {
                form.push(("cursor", cursor));
            }

            let page: ConversationsMembersResponse =
                self.post_form("conversations.members", &form).await?;
            members.extend(page.members.iter().cloned());

            match page.next_cursor() {
                Some(next) if cursor.as_deref() == Some(next) => {
                    warn!(
                        channel_id = %channel_id,
                        cursor = %next,
                        "Slack repeated a member cursor, stopping"
                    );
                    break;
                }
                Some(next) => cursor = Some(next.to_string()),
                None => break,
            }
        }

        debug!(channel_id = %channel_id, count = members.len(), "listed channel members");
        Ok(members)
    }
}
