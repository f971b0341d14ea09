//! Inspect command - shows what the bot sees for one channel.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::Config;
use crate::legacy::{LegacyVisibilityClient, VisibilityApi};
use crate::permission::{AuthorizationResult, PermissionChecker};
use crate::slack::{ChatPlatform, SlackApiClient};
use crate::visibility::Visibility;

#[derive(Debug, Serialize)]
pub struct ChannelReport {
    pub channel_id: String,
    pub visibility: Visibility,
    pub member_count: usize,
    pub managers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserReport>,
}

#[derive(Debug, Serialize)]
pub struct UserReport {
    pub user_id: String,
    pub is_admin: bool,
    pub authorization: AuthorizationResult,
}

/// Collect a report using the given clients
pub async fn build_report(
    platform: &dyn ChatPlatform,
    visibility_api: &dyn VisibilityApi,
    channel_id: &str,
    user_id: Option<&str>,
) -> Result<ChannelReport> {
    let state = platform
        .get_conversation_info(channel_id)
        .await
        .context("Failed to look up channel")?;
    let members = platform
        .list_conversation_members(channel_id)
        .await
        .context("Failed to list channel members")?;
    let managers = visibility_api
        .list_channel_managers(channel_id)
        .await
        .context("Failed to list channel managers")?;

    let user = match user_id {
        Some(user_id) => {
            let is_admin = platform
                .get_user(user_id)
                .await
                .context("Failed to look up user")?
                .is_admin;
            let authorization = PermissionChecker::new(managers.iter().cloned())
                .check(user_id, is_admin);
            Some(UserReport {
                user_id: user_id.to_string(),
                is_admin,
                authorization,
            })
        }
        None => None,
    };

    Ok(ChannelReport {
        channel_id: state.channel_id.clone(),
        visibility: state.visibility(),
        member_count: members.len(),
        managers,
        user,
    })
}

/// Execute the inspect command
pub async fn execute(config: &Config, channel_id: &str, user_id: Option<&str>) -> Result<()> {
    config.validate()?;

    let platform = SlackApiClient::new(
        config.bot_token().unwrap_or_default(),
        config.slack_api_base(),
        config.request_timeout(),
    )?;
    let legacy = LegacyVisibilityClient::new(
        config.browser_token().unwrap_or_default(),
        config.session_cookie().unwrap_or_default(),
        config.legacy_api_base(),
        config.request_timeout(),
    )?;

    let report = build_report(&platform, &legacy, channel_id, user_id).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
