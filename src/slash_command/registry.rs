use super::{CommandInfo, CommandInvocation, CommandOutcome, SlashCommand};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Explicit mapping from command name to handler
pub struct CommandRegistry {
    commands: RwLock<HashMap<String, Arc<dyn SlashCommand>>>,
}

/// `/toggle-visibility` and `toggle-visibility` name the same command
fn normalize(name: &str) -> &str {
    let name = name.trim();
    name.strip_prefix('/').unwrap_or(name)
}

impl CommandRegistry {
    /// Create a new command registry
    pub fn new() -> Self {
        Self {
            commands: RwLock::new(HashMap::new()),
        }
    }

    /// Register a command
    pub async fn register(&self, command: Arc<dyn SlashCommand>) {
        let name = normalize(command.name()).to_string();
        self.commands.write().await.insert(name, command);
    }

    /// Get a command by name
    pub async fn get(&self, name: &str) -> Option<Arc<dyn SlashCommand>> {
        self.commands.read().await.get(normalize(name)).cloned()
    }

    /// Route an invocation to its handler
    pub async fn dispatch(&self, invocation: &CommandInvocation) -> Result<CommandOutcome> {
        match self.get(&invocation.command_name).await {
            Some(cmd) => cmd.execute(invocation).await,
            None => {
                tracing::warn!(
                    command = %invocation.command_name,
                    user_id = %invocation.invoking_user_id,
                    "No handler registered for command"
                );
                Ok(CommandOutcome::Unrecognized {
                    command: invocation.command_name.clone(),
                })
            }
        }
    }

    /// List all registered commands
    pub async fn list(&self) -> Vec<CommandInfo> {
        let commands = self.commands.read().await;
        let mut infos: Vec<_> = commands
            .values()
            .map(|cmd| CommandInfo {
                name: cmd.name().to_string(),
                description: cmd.description().to_string(),
                usage: cmd.usage().to_string(),
            })
            .collect();

        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}
