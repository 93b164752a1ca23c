//! Migrate command - applies the invoice schema to PostgreSQL

use tracing::info;

use crate::infrastructure::storage::{connect_pool, run_invoice_migrations};

pub async fn run() -> anyhow::Result<()> {
    let config = super::bootstrap()?;

    let pool = connect_pool(&config.database).await?;
    let applied = run_invoice_migrations(&pool).await?;

    info!(applied, "Invoice schema is up to date");
    println!("Applied {} migration(s)", applied);

    Ok(())
}
