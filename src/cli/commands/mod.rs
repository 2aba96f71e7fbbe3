//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod check;
mod serve;

use clap::{Parser, Subcommand};

use ocrgate::config::GatewayArgs;

#[derive(Parser)]
#[command(name = "ocrgate")]
#[command(about = "Authenticated OCR gateway backed by Tesseract")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    gateway: GatewayArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Check if verbose mode is enabled (before full parsing).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway (default)
    Serve,

    /// Load the OCR engine once, report, and exit
    Check,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = cli.gateway.into_settings()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve::cmd_serve(&settings).await,
        Commands::Check => check::cmd_check(&settings).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let cli = Cli::try_parse_from(["ocrgate"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_check_with_flags() {
        let cli =
            Cli::try_parse_from(["ocrgate", "--languages", "eng", "check", "-v"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Check)));
        assert!(cli.verbose);
        assert_eq!(cli.gateway.languages, "eng");
    }
}
