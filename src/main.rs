use clap::Parser;
use invoice_workflow::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => cli::serve::run().await,
        Command::Process(args) => cli::process::run(args).await,
        Command::Query(args) => cli::query::run(args).await,
        Command::Migrate => cli::migrate::run().await,
    }
}
