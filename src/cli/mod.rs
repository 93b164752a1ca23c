//! Command-line interface
//!
//! - `serve`: HTTP API
//! - `process`: run the workflow on local images and print the final states
//! - `query`: answer one natural-language question
//! - `migrate`: apply the invoice schema migrations

pub mod migrate;
pub mod process;
pub mod query;
pub mod serve;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// Invoice Workflow - OCR, validation, persistence and natural-language queries
#[derive(Debug, Parser)]
#[command(name = "invoice-workflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve,

    /// Process invoice images and print the final workflow states as JSON
    Process(process::ProcessArgs),

    /// Answer a question about the stored invoices
    Query(query::QueryArgs),

    /// Apply pending schema migrations
    Migrate,
}

/// Load `.env` and the layered configuration, then install logging
pub fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_process_command() {
        let cli = Cli::try_parse_from([
            "invoice-workflow",
            "process",
            "a.png",
            "b.jpg",
            "--query",
            "Total amount?",
            "--concurrency",
            "2",
        ])
        .unwrap();

        let Command::Process(args) = cli.command else {
            panic!("expected process command");
        };
        assert_eq!(args.images, vec!["a.png".to_string(), "b.jpg".to_string()]);
        assert_eq!(args.query.as_deref(), Some("Total amount?"));
        assert_eq!(args.concurrency, 2);
    }

    #[test]
    fn test_process_requires_an_image() {
        assert!(Cli::try_parse_from(["invoice-workflow", "process"]).is_err());
    }

    #[test]
    fn test_parse_query_and_migrate() {
        let cli = Cli::try_parse_from(["invoice-workflow", "query", "How many invoices?"]).unwrap();
        assert!(matches!(cli.command, Command::Query(ref args) if args.question == "How many invoices?"));

        let cli = Cli::try_parse_from(["invoice-workflow", "migrate"]).unwrap();
        assert!(matches!(cli.command, Command::Migrate));
    }
}
