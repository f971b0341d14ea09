use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::permission::AuthorizationReason;
use crate::visibility::Visibility;

pub mod builtin;
pub mod registry;

/// One slash command as received from Slack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInvocation {
    /// Command name as typed, e.g. `/toggle-visibility`
    pub command_name: String,
    pub invoking_user_id: String,
    pub channel_id: String,
}

impl CommandInvocation {
    pub fn new(
        command_name: impl Into<String>,
        invoking_user_id: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            command_name: command_name.into(),
            invoking_user_id: invoking_user_id.into(),
            channel_id: channel_id.into(),
        }
    }
}

/// What handling a command ended up doing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    /// The invoker was not allowed; nothing was changed
    Denied { reason: AuthorizationReason },
    /// The channel now has visibility `to`
    Converted { channel_id: String, to: Visibility },
    /// The conversion endpoint reported the channel already had `visibility`
    AlreadyInState {
        channel_id: String,
        visibility: Visibility,
    },
    /// No handler is registered under this name
    Unrecognized { command: String },
}

/// Trait for slash commands
#[async_trait]
pub trait SlashCommand: Send + Sync {
    /// The name of the command; a leading slash is optional
    fn name(&self) -> &str;

    /// A short description of what the command does
    fn description(&self) -> &str;

    /// Usage information for the command
    fn usage(&self) -> &str {
        self.name()
    }

    /// Handle one invocation
    async fn execute(&self, invocation: &CommandInvocation) -> Result<CommandOutcome>;
}

/// Information about a slash command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandInfo {
    pub name: String,
    pub description: String,
    pub usage: String,
}
