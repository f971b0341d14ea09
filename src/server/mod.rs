//! HTTP receiver for Slack requests.
//!
//! Routes:
//! - `POST /slack/commands`: slash commands, acknowledged immediately and
//!   handled on a background task
//! - `POST /slack/events`: Events API (URL verification, placeholder dispatch)
//! - `POST /slack/actions`: interactivity (placeholder dispatch)
//! - `GET /`: redirect to the project homepage
//! - `GET /ping`, `GET /up`: health checks

pub mod handlers;
pub mod payloads;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::legacy::LegacyVisibilityClient;
use crate::slack::SlackApiClient;
use crate::slash_command::builtin::ToggleVisibilityCommand;
use crate::slash_command::registry::CommandRegistry;
use crate::visibility::ChannelLocks;

/// Shared state accessible by all handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<CommandRegistry>,
    pub signing_secret: Arc<str>,
    pub environment: Arc<str>,
    pub homepage: Arc<str>,
    /// Background command tasks, drained on shutdown
    pub tasks: TaskTracker,
}

impl AppState {
    pub fn new(
        registry: Arc<CommandRegistry>,
        signing_secret: &str,
        environment: &str,
        homepage: &str,
    ) -> Self {
        Self {
            registry,
            signing_secret: Arc::from(signing_secret),
            environment: Arc::from(environment),
            homepage: Arc::from(homepage),
            tasks: TaskTracker::new(),
        }
    }

    /// Wire the Slack clients and command handlers from configuration
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(build_registry(config).await?);
        let signing_secret = config
            .signing_secret()
            .context("SLACK_SIGNING_SECRET is not configured")?;

        Ok(Self::new(
            registry,
            signing_secret,
            config.environment(),
            config.homepage(),
        ))
    }
}

/// Register every command the bot answers to
pub async fn build_registry(config: &Config) -> Result<CommandRegistry> {
    let bot_token = config
        .bot_token()
        .context("SLACK_BOT_TOKEN is not configured")?;
    let browser_token = config
        .browser_token()
        .context("SLACK_BROWSER_TOKEN is not configured")?;
    let cookie = config
        .session_cookie()
        .context("SLACK_COOKIE is not configured")?;

    let platform = Arc::new(
        SlackApiClient::new(bot_token, config.slack_api_base(), config.request_timeout())
            .context("Failed to create Slack API client")?,
    );
    let legacy = Arc::new(
        LegacyVisibilityClient::new(
            browser_token,
            cookie,
            config.legacy_api_base(),
            config.request_timeout(),
        )
        .context("Failed to create legacy visibility client")?,
    );

    let registry = CommandRegistry::new();
    registry
        .register(Arc::new(ToggleVisibilityCommand::new(
            platform,
            legacy,
            Arc::new(ChannelLocks::new()),
        )))
        .await;

    Ok(registry)
}

/// Build the router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/ping", get(handlers::health))
        .route("/up", get(handlers::health))
        .route("/slack/commands", post(handlers::slash_command))
        .route("/slack/events", post(handlers::events))
        .route("/slack/actions", post(handlers::actions))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
