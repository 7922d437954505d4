//! CLI command definitions.
//!
//! Each subcommand has its own `Args` struct and an `execute` function.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use craft_chat::SiteConfig;

pub mod apply;
pub mod chat;
pub mod detect;
pub mod show;
pub mod strip;

/// sitecraft - co-author a website with an assistant
#[derive(Parser)]
#[command(name = "sitecraft")]
#[command(version, about = "sitecraft - co-author a website with an assistant")]
#[command(long_about = r#"
sitecraft talks to an assistant backend that embeds command tags in its
replies, applies those commands to the project document, and tracks which
preview section is waiting for approval.

COMMANDS:
  chat     → Interactive session against the configured backend
  detect   → Print the command tags found in a text as JSON
  strip    → Print a text with its command tags removed
  apply    → Apply the tags in a text to the local project store
  show     → Print the local project state as JSON

CONFIGURATION:
  <workspace>/.sitecraft/settings.json, then SITECRAFT_BASE_URL,
  SITECRAFT_USER_ID, SITECRAFT_TIMEOUT_MS and SITECRAFT_MAX_ATTEMPTS,
  then the flags below.

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments or configuration
  3 - Backend unreachable or failing
  4 - Backend rejected the request or answered nonsense
  5 - Local store error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Chat with the assistant
    Chat(chat::ChatArgs),

    /// Detect command tags in a text
    Detect(detect::DetectArgs),

    /// Remove command tags from a text
    Strip(strip::StripArgs),

    /// Apply the command tags in a text to the local store
    Apply(apply::ApplyArgs),

    /// Show the local project state
    Show(show::ShowArgs),
}

/// Overrides applied on top of the settings file and environment.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Workspace directory holding `.sitecraft/`
    #[arg(short, long, global = true, default_value = ".")]
    pub workspace: PathBuf,

    /// Backend base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Session identifier
    #[arg(long, global = true)]
    pub user_id: Option<String>,

    /// Per-attempt timeout in milliseconds (0 disables)
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,
}

impl ConfigArgs {
    /// Resolve the full configuration, flags winning.
    pub fn load(&self) -> Result<SiteConfig> {
        let mut config = SiteConfig::load(&self.workspace)
            .with_context(|| format!("Failed to load settings in {}", self.workspace.display()))?;

        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(user_id) = &self.user_id {
            config.user_id = user_id.clone();
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.retry.timeout_ms = timeout_ms;
        }
        config.validate()?;
        config.ensure_user_id();
        Ok(config)
    }
}

/// Read a file, or stdin when `source` is `-`.
pub fn read_input(source: &str) -> Result<String> {
    if source == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        return Ok(text);
    }

    std::fs::read_to_string(source).with_context(|| format!("Input not found: {}", source))
}
