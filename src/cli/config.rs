//! Config management CLI commands.

use crate::config::Config;
use anyhow::Result;

/// Show current configuration with credentials masked
pub async fn show() -> Result<()> {
    let config = Config::load().await?;

    println!("{}", serde_json::to_string_pretty(&config.redacted())?);

    if let Err(e) = config.validate() {
        println!("\nWarning: {}", e);
    }

    Ok(())
}

/// Show configuration file path
pub async fn path() -> Result<()> {
    if let Some(global_path) = Config::global_config_path() {
        println!("Global config: {}", global_path.display());
    }

    if let Some(global_dir) = Config::global_config_dir() {
        println!("Config directory: {}", global_dir.display());
    }

    match Config::find_project_config().await? {
        Some(project_config) => println!("Project config: {}", project_config.display()),
        None => println!(
            "No project config found in {}",
            std::env::current_dir()?.display()
        ),
    }

    Ok(())
}

/// Initialize configuration file with defaults
pub async fn init() -> Result<()> {
    let config_path = Config::init().await?;
    println!(
        "Created default configuration file at: {}",
        config_path.display()
    );
    println!("\nCredentials are read from the environment by default:");
    println!(
        r#"
  SLACK_BOT_TOKEN       bot token (xoxb-...)
  SLACK_SIGNING_SECRET  signing secret from the app settings
  SLACK_APP_TOKEN       app-level token (xapp-...), optional
  SLACK_BROWSER_TOKEN   browser session token (xoxc-...)
  SLACK_COOKIE          value of the browser's `d` cookie
"#
    );
    Ok(())
}
