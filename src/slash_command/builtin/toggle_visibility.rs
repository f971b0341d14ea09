use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

use crate::legacy::VisibilityApi;
use crate::permission::PermissionChecker;
use crate::slack::ChatPlatform;
use crate::slash_command::{CommandInvocation, CommandOutcome, SlashCommand};
use crate::templates::t;
use crate::visibility::{ChannelLocks, ConversionOutcome, Visibility};

pub const COMMAND_NAME: &str = "/toggle-visibility";

/// Toggle visibility command - flips a channel between public and private
pub struct ToggleVisibilityCommand {
    platform: Arc<dyn ChatPlatform>,
    visibility_api: Arc<dyn VisibilityApi>,
    locks: Arc<ChannelLocks>,
}

impl ToggleVisibilityCommand {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        visibility_api: Arc<dyn VisibilityApi>,
        locks: Arc<ChannelLocks>,
    ) -> Self {
        Self {
            platform,
            visibility_api,
            locks,
        }
    }

    /// A failed lookup never grants admin rights
    async fn is_admin(&self, user_id: &str) -> bool {
        match self.platform.get_user(user_id).await {
            Ok(user) => user.is_admin,
            Err(e) => {
                error!(user_id = %user_id, "Failed to look up user, assuming not admin: {}", e);
                false
            }
        }
    }

    async fn notify(&self, invocation: &CommandInvocation, template: &str) -> Result<()> {
        let text = t(template, &[("channel", invocation.channel_id.as_str())]);
        self.platform
            .post_ephemeral(&invocation.channel_id, &invocation.invoking_user_id, &text)
            .await
            .with_context(|| format!("Failed to send '{}' message", template))
    }
}

fn converting_template(target: Visibility) -> &'static str {
    match target {
        Visibility::Public => "visibility.converting_to_public",
        Visibility::Private => "visibility.converting_to_private",
    }
}

fn converted_template(target: Visibility) -> &'static str {
    match target {
        Visibility::Public => "visibility.now_public",
        Visibility::Private => "visibility.now_private",
    }
}

fn already_template(target: Visibility) -> &'static str {
    match target {
        Visibility::Public => "visibility.already_public",
        Visibility::Private => "visibility.already_private",
    }
}

#[async_trait]
impl SlashCommand for ToggleVisibilityCommand {
    fn name(&self) -> &str {
        COMMAND_NAME
    }

    fn description(&self) -> &str {
        "Switch the current channel between public and private"
    }

    fn usage(&self) -> &str {
        "/toggle-visibility"
    }

    async fn execute(&self, invocation: &CommandInvocation) -> Result<CommandOutcome> {
        let user_id = invocation.invoking_user_id.as_str();
        let channel_id = invocation.channel_id.as_str();

        let is_admin = self.is_admin(user_id).await;
        let managers = self
            .visibility_api
            .list_channel_managers(channel_id)
            .await
            .context("Failed to list channel managers")?;

        let authorization = PermissionChecker::new(managers).check(user_id, is_admin);
        if !authorization.allowed {
            info!(
                user_id = %user_id,
                channel_id = %channel_id,
                "Visibility change refused: not a channel manager or admin"
            );
            self.notify(invocation, "visibility.restricted").await?;
            return Ok(CommandOutcome::Denied {
                reason: authorization.reason,
            });
        }

        // Held until the conversion finishes so toggles on one channel run one at a time
        let _channel_guard = self.locks.acquire(channel_id).await;

        let state = self
            .platform
            .get_conversation_info(channel_id)
            .await
            .context("Failed to look up channel visibility")?;
        let target = state.visibility().toggled();

        info!(
            user_id = %user_id,
            channel_id = %channel_id,
            reason = ?authorization.reason,
            from = %state.visibility(),
            to = %target,
            "Changing channel visibility"
        );

        self.notify(invocation, converting_template(target)).await?;

        let outcome = self
            .visibility_api
            .convert(channel_id, target)
            .await
            .with_context(|| format!("Failed to convert channel to {}", target))?;

        match outcome {
            ConversionOutcome::Converted => {
                self.notify(invocation, converted_template(target)).await?;
                Ok(CommandOutcome::Converted {
                    channel_id: channel_id.to_string(),
                    to: target,
                })
            }
            ConversionOutcome::AlreadyInState { error } => {
                info!(channel_id = %channel_id, error = %error, "Channel already {}", target);
                self.notify(invocation, already_template(target)).await?;
                Ok(CommandOutcome::AlreadyInState {
                    channel_id: channel_id.to_string(),
                    visibility: target,
                })
            }
        }
    }
}
