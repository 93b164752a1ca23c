//! Query command - answers one question about the stored invoices

use clap::Args;

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Natural-language question
    pub question: String,

    /// Print the generated SQL as well
    #[arg(long)]
    pub show_sql: bool,
}

pub async fn run(args: QueryArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let app = crate::build_application(&config).await?;

    let answer = app.query_agent.answer(args.question.trim()).await?;

    if args.show_sql {
        println!("SQL: {}", answer.sql);
    }
    println!("{}", answer.answer);

    Ok(())
}
