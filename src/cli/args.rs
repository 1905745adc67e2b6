//! Command-line argument parsing for fusionrag
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// fusionrag - Fusion retrieval with graded, grounded answers
#[derive(Parser, Debug)]
#[command(name = "fusionrag")]
#[command(author = "Jerome (Kubashen) Naidoo")]
#[command(version)]
#[command(about = "Answer questions over your documents with fused retrieval and grounding checks", long_about = None)]
pub struct Args {
    /// Configuration file path (default: ~/.fusionrag/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: default (config), -v (debug), -vv (trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Build the pipeline and serve the HTTP API
    Serve {
        /// Override server.host
        #[arg(long)]
        host: Option<String>,

        /// Override server.port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Build the pipeline and answer one question
    Ask {
        /// The question to answer
        #[arg(value_name = "QUESTION")]
        question: String,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate and display the configuration
    Config {
        /// Write a starter configuration to the config path if none exists
        #[arg(long)]
        init: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask() {
        let args = Args::parse_from(["fusionrag", "ask", "What raises sea levels?", "--json"]);
        assert_eq!(
            args.command,
            Commands::Ask {
                question: "What raises sea levels?".to_string(),
                json: true
            }
        );
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn test_parse_serve_with_overrides() {
        let args = Args::parse_from(["fusionrag", "-vv", "serve", "--port", "9000", "-c", "rag.toml"]);
        assert_eq!(
            args.command,
            Commands::Serve {
                host: None,
                port: Some(9000)
            }
        );
        assert_eq!(args.verbose, 2);
        assert_eq!(args.config, Some(PathBuf::from("rag.toml")));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Args::try_parse_from(["fusionrag"]).is_err());
    }

    #[test]
    fn test_config_subcommand() {
        let args = Args::parse_from(["fusionrag", "config", "--init"]);
        assert_eq!(args.command, Commands::Config { init: true });
    }
}
