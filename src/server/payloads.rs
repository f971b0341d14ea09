//! Inbound Slack request payloads.
//!
//! Slash commands and interactivity arrive form-encoded; the Events API
//! sends JSON. Events and block actions are decoded into tagged unions so
//! handlers match on variants instead of inspecting raw strings.

use serde::Deserialize;
use std::collections::HashMap;

use crate::slash_command::CommandInvocation;

/// Decode an `application/x-www-form-urlencoded` body
pub fn parse_form(body: &str) -> HashMap<String, String> {
    let decode = |raw: &str| {
        urlencoding::decode(&raw.replace('+', " "))
            .map(|s| s.into_owned())
            .ok()
    };

    body.split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            Some((decode(key)?, decode(value)?))
        })
        .collect()
}

/// The fields of a slash command request the bot reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub user_id: String,
    pub channel_id: String,
    pub text: String,
    pub team_id: Option<String>,
}

impl SlashCommandPayload {
    /// Build from a decoded form; `None` when a required field is missing
    pub fn from_form(form: &HashMap<String, String>) -> Option<Self> {
        let required = |key: &str| {
            form.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Some(Self {
            command: required("command")?,
            user_id: required("user_id")?,
            channel_id: required("channel_id")?,
            text: form.get("text").cloned().unwrap_or_default(),
            team_id: form.get("team_id").cloned(),
        })
    }

    pub fn into_invocation(self) -> CommandInvocation {
        CommandInvocation::new(self.command, self.user_id, self.channel_id)
    }
}

/// Top-level Events API request
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    /// Sent once when the request URL is configured
    UrlVerification { challenge: String },
    EventCallback {
        #[serde(default)]
        team_id: Option<String>,
        event: SlackEvent,
    },
    #[serde(other)]
    Unsupported,
}

/// Inner event of an `event_callback`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEvent {
    TeamJoin { user: serde_json::Value },
    #[serde(other)]
    Other,
}

/// Decoded `payload` field of an interactivity request
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionPayload {
    BlockActions {
        user: InteractionUser,
        #[serde(default)]
        actions: Vec<BlockAction>,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InteractionUser {
    pub id: String,
}

/// One block action, keyed by its `action_id`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action_id")]
pub enum BlockAction {
    #[serde(rename = "initial")]
    Initial,
    #[serde(other)]
    Other,
}
