//! Slacky - Slack bot that toggles channel visibility

pub mod cli;
pub mod config;
pub mod legacy;
pub mod permission;
pub mod server;
pub mod slack;
pub mod slash_command;
pub mod templates;
pub mod visibility;
