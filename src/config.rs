//! Configuration management module.
//!
//! This module handles loading and managing configuration from various sources:
//! - Global config file (~/.config/slacky/slacky.json)
//! - Project config file (./slacky.json or ./slacky.jsonc)
//! - `.env` file and environment variables
//!
//! Configuration follows a layered approach where later layers override earlier
//! ones. The resulting value is immutable for the lifetime of the process and
//! is passed explicitly to the components that need credentials.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_HOMEPAGE: &str = "https://github.com/jaspermayone/slacky";
pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const REDACTED: &str = "********";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// JSON schema reference
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Deployment environment name (development, production, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    /// Where `GET /` redirects to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,

    /// Log level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Timeout applied to every outbound HTTP request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    /// Bot credentials for the Slack Web API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slack: Option<SlackConfig>,

    /// Browser session credentials for the legacy endpoints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy: Option<LegacyConfig>,

    /// Server settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    /// `.env` file that was loaded, if any
    #[serde(skip)]
    pub env_file: Option<PathBuf>,

    /// Problems found while loading; logged once logging is up
    #[serde(skip)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SlackConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LegacyConfig {
    /// `xoxc-` token taken from a logged-in browser session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_token: Option<String>,
    /// Value of the `d` session cookie
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub port: Option<u16>,
    pub hostname: Option<String>,
}

impl Config {
    /// Load configuration from all sources
    pub async fn load() -> Result<Self> {
        let mut config = Config::default();

        // Before any file, so {env:VAR} references can see .env values.
        // A missing .env file is not an error
        let env_file = dotenvy::dotenv().ok();

        // Load global config
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_file(&global_path).await? {
                config = config.merge(global_config);
            }
        }

        // Load project config
        if let Some(project_path) = Self::find_project_config().await? {
            if let Some(project_config) = Self::load_file(&project_path).await? {
                config = config.merge(project_config);
            }
        }

        config = config.apply_env_overrides(|key| std::env::var(key).ok());
        config.env_file = env_file;

        Ok(config)
    }

    /// Get the global config directory path
    pub fn global_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("slacky"))
    }

    /// Get the global config file path
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|p| p.join("slacky.json"))
    }

    /// Find project config file in current directory or parent directories
    pub async fn find_project_config() -> Result<Option<PathBuf>> {
        let mut current = std::env::current_dir()?;

        loop {
            for filename in &["slacky.jsonc", "slacky.json"] {
                let config_path = current.join(filename);
                if config_path.exists() {
                    return Ok(Some(config_path));
                }
            }

            if let Some(parent) = current.parent() {
                current = parent.to_path_buf();
            } else {
                break;
            }
        }

        Ok(None)
    }

    /// Load configuration from a file
    async fn load_file(path: &Path) -> Result<Option<Config>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
            .map(Some)
    }

    /// Parse JSON or JSONC config content
    pub fn parse(content: &str) -> Result<Config> {
        // Handle empty or whitespace-only files
        if content.trim().is_empty() {
            return Ok(Config::default());
        }

        let content = Self::strip_jsonc_comments(content);
        let content = Self::strip_trailing_commas(&content);
        let content = Self::substitute_env_vars(&content);

        Ok(serde_json::from_str(&content)?)
    }

    /// Strip comments from JSONC content
    fn strip_jsonc_comments(content: &str) -> String {
        let mut result = String::new();
        let mut in_string = false;
        let mut in_line_comment = false;
        let mut in_block_comment = false;
        let mut chars = content.chars().peekable();

        while let Some(c) = chars.next() {
            if in_line_comment {
                if c == '\n' {
                    in_line_comment = false;
                    result.push(c);
                }
                continue;
            }

            if in_block_comment {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    in_block_comment = false;
                }
                continue;
            }

            if c == '"' {
                if !in_string {
                    in_string = true;
                } else {
                    let backslashes = result.chars().rev().take_while(|ch| *ch == '\\').count();
                    if backslashes % 2 == 0 {
                        in_string = false;
                    }
                }
                result.push(c);
                continue;
            }

            if !in_string && c == '/' {
                match chars.peek() {
                    Some('/') => {
                        chars.next();
                        in_line_comment = true;
                        continue;
                    }
                    Some('*') => {
                        chars.next();
                        in_block_comment = true;
                        continue;
                    }
                    _ => {}
                }
            }

            result.push(c);
        }

        result
    }

    /// Strip trailing commas from JSON (common in JSONC)
    fn strip_trailing_commas(content: &str) -> String {
        lazy_static::lazy_static! {
            static ref TRAILING_COMMA: regex::Regex =
                regex::Regex::new(r",(\s*[}\]])").expect("valid trailing comma pattern");
        }
        TRAILING_COMMA.replace_all(content, "$1").to_string()
    }

    /// Substitute environment variables in the format {env:VAR_NAME}
    fn substitute_env_vars(content: &str) -> String {
        lazy_static::lazy_static! {
            static ref ENV_REF: regex::Regex =
                regex::Regex::new(r"\{env:([^}]+)\}").expect("valid env reference pattern");
        }
        ENV_REF
            .replace_all(content, |caps: &regex::Captures| {
                std::env::var(&caps[1]).unwrap_or_default()
            })
            .to_string()
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(mut self, other: Config) -> Self {
        if other.schema.is_some() {
            self.schema = other.schema;
        }
        if other.environment.is_some() {
            self.environment = other.environment;
        }
        if other.homepage.is_some() {
            self.homepage = other.homepage;
        }
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
        if other.request_timeout_secs.is_some() {
            self.request_timeout_secs = other.request_timeout_secs;
        }

        if let Some(other_slack) = other.slack {
            let slack = self.slack.get_or_insert_with(SlackConfig::default);
            merge_field(&mut slack.bot_token, other_slack.bot_token);
            merge_field(&mut slack.signing_secret, other_slack.signing_secret);
            merge_field(&mut slack.app_token, other_slack.app_token);
            merge_field(&mut slack.api_base_url, other_slack.api_base_url);
        }
        if let Some(other_legacy) = other.legacy {
            let legacy = self.legacy.get_or_insert_with(LegacyConfig::default);
            merge_field(&mut legacy.browser_token, other_legacy.browser_token);
            merge_field(&mut legacy.cookie, other_legacy.cookie);
            merge_field(&mut legacy.api_base_url, other_legacy.api_base_url);
        }
        if let Some(other_server) = other.server {
            let server = self.server.get_or_insert_with(ServerConfig::default);
            merge_field(&mut server.port, other_server.port);
            merge_field(&mut server.hostname, other_server.hostname);
        }

        self
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        {
            let slack = self.slack.get_or_insert_with(SlackConfig::default);
            merge_field(&mut slack.bot_token, var("SLACK_BOT_TOKEN"));
            merge_field(&mut slack.signing_secret, var("SLACK_SIGNING_SECRET"));
            merge_field(&mut slack.app_token, var("SLACK_APP_TOKEN"));
        }
        {
            let legacy = self.legacy.get_or_insert_with(LegacyConfig::default);
            merge_field(&mut legacy.browser_token, var("SLACK_BROWSER_TOKEN"));
            merge_field(&mut legacy.cookie, var("SLACK_COOKIE"));
        }

        if let Some(port) = var("PORT") {
            match port.parse::<u16>() {
                Ok(port) => {
                    self.server.get_or_insert_with(ServerConfig::default).port = Some(port);
                }
                Err(_) => self
                    .warnings
                    .push(format!("Ignoring invalid PORT value: {}", port)),
            }
        }

        if let Some(env) = var("APP_ENV").or_else(|| var("NODE_ENV")) {
            self.environment = Some(env);
        }
        if let Some(homepage) = var("SLACKY_HOMEPAGE") {
            self.homepage = Some(homepage);
        }
        if let Some(log_level) = var("SLACKY_LOG_LEVEL") {
            self.log_level = Some(log_level);
        }

        self
    }

    /// Fail when a credential needed to serve requests is missing
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.bot_token().is_none() {
            missing.push("SLACK_BOT_TOKEN");
        }
        if self.signing_secret().is_none() {
            missing.push("SLACK_SIGNING_SECRET");
        }
        if self.browser_token().is_none() {
            missing.push("SLACK_BROWSER_TOKEN");
        }
        if self.session_cookie().is_none() {
            missing.push("SLACK_COOKIE");
        }

        if !missing.is_empty() {
            bail!("Missing required configuration: {}", missing.join(", "));
        }
        Ok(())
    }

    pub fn bot_token(&self) -> Option<&str> {
        non_blank(self.slack.as_ref().and_then(|s| s.bot_token.as_deref()))
    }

    pub fn signing_secret(&self) -> Option<&str> {
        non_blank(self.slack.as_ref().and_then(|s| s.signing_secret.as_deref()))
    }

    pub fn app_token(&self) -> Option<&str> {
        non_blank(self.slack.as_ref().and_then(|s| s.app_token.as_deref()))
    }

    pub fn browser_token(&self) -> Option<&str> {
        non_blank(self.legacy.as_ref().and_then(|l| l.browser_token.as_deref()))
    }

    pub fn session_cookie(&self) -> Option<&str> {
        non_blank(self.legacy.as_ref().and_then(|l| l.cookie.as_deref()))
    }

    pub fn slack_api_base(&self) -> &str {
        self.slack
            .as_ref()
            .and_then(|s| s.api_base_url.as_deref())
            .unwrap_or(DEFAULT_SLACK_API_BASE)
    }

    pub fn legacy_api_base(&self) -> &str {
        self.legacy
            .as_ref()
            .and_then(|l| l.api_base_url.as_deref())
            .unwrap_or(DEFAULT_SLACK_API_BASE)
    }

    pub fn port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_PORT)
    }

    pub fn hostname(&self) -> &str {
        self.server
            .as_ref()
            .and_then(|s| s.hostname.as_deref())
            .unwrap_or(DEFAULT_HOST)
    }

    pub fn environment(&self) -> &str {
        self.environment.as_deref().unwrap_or("development")
    }

    pub fn homepage(&self) -> &str {
        self.homepage.as_deref().unwrap_or(DEFAULT_HOMEPAGE)
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// Copy of this config with every credential masked, for display
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| REDACTED.to_string());
        let mut config = self.clone();
        if let Some(slack) = config.slack.as_mut() {
            slack.bot_token = mask(&slack.bot_token);
            slack.signing_secret = mask(&slack.signing_secret);
            slack.app_token = mask(&slack.app_token);
        }
        if let Some(legacy) = config.legacy.as_mut() {
            legacy.browser_token = mask(&legacy.browser_token);
            legacy.cookie = mask(&legacy.cookie);
        }
        config
    }

    /// What `init` writes: credentials as `{env:VAR}` references
    fn template() -> Config {
        Config {
            schema: None,
            environment: Some("development".to_string()),
            homepage: Some(DEFAULT_HOMEPAGE.to_string()),
            log_level: Some("info".to_string()),
            request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
            slack: Some(SlackConfig {
                bot_token: Some("{env:SLACK_BOT_TOKEN}".to_string()),
                signing_secret: Some("{env:SLACK_SIGNING_SECRET}".to_string()),
                app_token: None,
                api_base_url: None,
            }),
            legacy: Some(LegacyConfig {
                browser_token: Some("{env:SLACK_BROWSER_TOKEN}".to_string()),
                cookie: Some("{env:SLACK_COOKIE}".to_string()),
                api_base_url: None,
            }),
            server: Some(ServerConfig {
                port: Some(DEFAULT_PORT),
                hostname: Some(DEFAULT_HOST.to_string()),
            }),
            env_file: None,
            warnings: Vec::new(),
        }
    }

    /// Create a default config file if it doesn't exist
    pub async fn init() -> Result<PathBuf> {
        let config_dir = Self::global_config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        fs::create_dir_all(&config_dir)
            .await
            .context("Failed to create config directory")?;

        let config_path = config_dir.join("slacky.json");

        if !config_path.exists() {
            let default_config = Self::template();

            let content = serde_json::to_string_pretty(&default_config)?;
            fs::write(&config_path, content)
                .await
                .context("Failed to write default config file")?;
        }

        Ok(config_path)
    }
}

/// Unset `{env:VAR}` references leave empty strings behind
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn merge_field<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}
