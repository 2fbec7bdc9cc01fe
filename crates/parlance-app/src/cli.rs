//! CLI argument definitions for the Parlance application.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parlance - a terminal chatbot with personas, multimodal input, and speech.
#[derive(Parser, Debug)]
#[command(name = "parlance", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Persona to start the conversation with.
    #[arg(short = 'p', long = "persona")]
    pub persona: Option<String>,

    /// Speak every assistant reply.
    #[arg(long = "speak")]
    pub speak: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Interactive chat session (default).
    Chat,
    /// List the models available to the configured API key.
    Models,
}

impl CliArgs {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Chat)
    }

    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > PARLANCE_CONFIG env var > platform default (~/.parlance/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        self.resolve_config_path_with(|key| std::env::var(key).ok())
    }

    fn resolve_config_path_with<F>(&self, lookup: F) -> PathBuf
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Some(p) = lookup("PARLANCE_CONFIG").filter(|p| !p.is_empty()) {
            return PathBuf::from(p);
        }
        default_config_path(&lookup)
    }

    /// Resolve the log filter.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }

    /// Resolve the starting persona.
    ///
    /// Priority: --persona flag > config file default.
    pub fn resolve_persona<'a>(&'a self, config_default: &'a str) -> &'a str {
        self.persona.as_deref().unwrap_or(config_default)
    }
}

/// Default config file path for the current platform.
fn default_config_path<F>(lookup: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    let home_var = if cfg!(target_os = "windows") {
        "USERPROFILE"
    } else {
        "HOME"
    };
    match lookup(home_var) {
        Some(home) => PathBuf::from(home).join(".parlance").join("config.toml"),
        None => PathBuf::from("config.toml"),
    }
}
