use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use slacky::{cli, config::Config};

#[derive(Parser)]
#[command(name = "slacky")]
#[command(about = "Slack bot that toggles channel visibility", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server that receives Slack requests
    Serve {
        /// Port to listen on (defaults to PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },

    /// Show a channel's visibility, members and managers
    Inspect {
        /// Channel ID
        channel: String,

        /// Also check whether this user may toggle the channel
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Show configuration file path
    Path,
    /// Initialize configuration file with defaults
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().await?;

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_deref().unwrap_or("info")))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Some(path) = &config.env_file {
        tracing::debug!("Loaded environment from {}", path.display());
    }
    for warning in &config.warnings {
        tracing::warn!("{}", warning);
    }

    match cli.command {
        Some(Commands::Serve { port, host }) => {
            cli::serve::execute(config, host, port).await?;
        }
        Some(Commands::Inspect { channel, user }) => {
            cli::inspect::execute(&config, &channel, user.as_deref()).await?;
        }
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Show => {
                cli::config::show().await?;
            }
            ConfigCommands::Path => {
                cli::config::path().await?;
            }
            ConfigCommands::Init => {
                cli::config::init().await?;
            }
        },
        Some(Commands::Version) => {
            println!("slacky {}", env!("CARGO_PKG_VERSION"));
        }
        None => {
            // Default: serve
            cli::serve::execute(config, None, None).await?;
        }
    }

    Ok(())
}
