//! sitecraft CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments or configuration
//! - 3: Backend unreachable or failing
//! - 4: Backend rejected the request or answered nonsense
//! - 5: Local store error

use std::process::ExitCode;

use clap::Parser;
use craft_chat::ChatError;
use craft_client::ClientError;
use craft_store::StoreError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const NETWORK_ERROR: u8 = 3;
    pub const BACKEND_REJECTED: u8 = 4;
    pub const STORE_ERROR: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let mut filter = EnvFilter::from_default_env();
    for directive in [
        format!("sitecraft={}", level),
        format!("craft={}", level),
        "warn".to_string(),
    ] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    let config = cli.config;
    let result = match cli.command {
        Commands::Chat(args) => commands::chat::execute(args, &config).await,
        Commands::Detect(args) => commands::detect::execute(args).await,
        Commands::Strip(args) => commands::strip::execute(args).await,
        Commands::Apply(args) => commands::apply::execute(args, &config).await,
        Commands::Show(args) => commands::show::execute(args, &config).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    let client = e
        .downcast_ref::<ClientError>()
        .or_else(|| match e.downcast_ref::<ChatError>() {
            Some(ChatError::Client(inner)) => Some(inner),
            _ => None,
        });

    if let Some(client) = client {
        return if matches!(client, ClientError::InvalidRequest(_)) {
            ExitCodes::GENERAL_ERROR
        } else if client.is_retryable() {
            ExitCodes::NETWORK_ERROR
        } else {
            ExitCodes::BACKEND_REJECTED
        };
    }

    if e.downcast_ref::<StoreError>().is_some() {
        return ExitCodes::STORE_ERROR;
    }

    match e.downcast_ref::<ChatError>() {
        Some(ChatError::Config(_)) => ExitCodes::INVALID_ARGS,
        _ => {
            let msg = e.to_string().to_lowercase();
            if msg.contains("argument") || msg.contains("not found") {
                ExitCodes::INVALID_ARGS
            } else {
                ExitCodes::GENERAL_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_exit_codes() {
        let unreachable = anyhow::Error::from(ClientError::ConnectionFailure("refused".into()));
        assert_eq!(categorize_error(&unreachable), ExitCodes::NETWORK_ERROR);

        let rejected = anyhow::Error::from(ChatError::Client(ClientError::from_status(422, "")));
        assert_eq!(categorize_error(&rejected), ExitCodes::BACKEND_REJECTED);

        let unencodable = anyhow::Error::from(ClientError::InvalidRequest("bad body".into()));
        assert_eq!(categorize_error(&unencodable), ExitCodes::GENERAL_ERROR);
    }

    #[test]
    fn test_config_error_is_invalid_args() {
        let err = anyhow::Error::from(ChatError::Config("bad timeout".into()));
        assert_eq!(categorize_error(&err), ExitCodes::INVALID_ARGS);
    }
}
