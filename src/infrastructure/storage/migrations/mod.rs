//! Database migrations for the invoice schema

use sqlx::postgres::PgPool;
use tracing::info;

use crate::domain::DomainError;

/// Applies and reverts versioned migrations, recording them in `_migrations`
#[derive(Debug)]
pub struct PostgresMigrator {
    pool: PgPool,
}

impl PostgresMigrator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the migrations table if it doesn't exist
    async fn ensure_migrations_table(&self) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                description TEXT NOT NULL,
                installed_on TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                success BOOLEAN NOT NULL DEFAULT TRUE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create migrations table: {}", e)))?;

        Ok(())
    }

    async fn is_applied(&self, version: i64) -> Result<bool, DomainError> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM _migrations WHERE version = $1)")
            .bind(version)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to check migration status: {}", e)))
    }

    /// Runs a single migration; returns false when it was already applied
    pub async fn run_migration(&self, migration: &Migration) -> Result<bool, DomainError> {
        self.ensure_migrations_table().await?;

        if self.is_applied(migration.version).await? {
            return Ok(false);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to begin migration: {}", e)))?;

        // raw_sql allows several statements per migration
        sqlx::raw_sql(&migration.up)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to run migration {}: {}",
                    migration.version, e
                ))
            })?;

        sqlx::query("INSERT INTO _migrations (version, description) VALUES ($1, $2)")
            .bind(migration.version)
            .bind(&migration.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to record migration {}: {}",
                    migration.version, e
                ))
            })?;

        tx.commit()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to commit migration: {}", e)))?;

        info!(version = migration.version, description = %migration.description, "Migration applied");
        Ok(true)
    }

    /// Reverts a single migration
    pub async fn revert_migration(&self, migration: &Migration) -> Result<(), DomainError> {
        self.ensure_migrations_table().await?;

        if !self.is_applied(migration.version).await? {
            return Ok(());
        }

        sqlx::raw_sql(&migration.down)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to revert migration {}: {}",
                    migration.version, e
                ))
            })?;

        sqlx::query("DELETE FROM _migrations WHERE version = $1")
            .bind(migration.version)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to remove migration record {}: {}",
                    migration.version, e
                ))
            })?;

        Ok(())
    }

    /// Returns the latest applied migration version
    pub async fn current_version(&self) -> Result<Option<i64>, DomainError> {
        self.ensure_migrations_table().await?;

        sqlx::query_scalar("SELECT MAX(version) FROM _migrations WHERE success = TRUE")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get migration version: {}", e)))
    }
}

/// A versioned schema change
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: String,
    /// SQL to run when applying the migration
    pub up: String,
    /// SQL to run when reverting the migration
    pub down: String,
}

impl Migration {
    pub fn new(
        version: i64,
        description: impl Into<String>,
        up: impl Into<String>,
        down: impl Into<String>,
    ) -> Self {
        Self {
            version,
            description: description.into(),
            up: up.into(),
            down: down.into(),
        }
    }
}

/// Tables written by the persistence stage, in dependency order
pub const INVOICE_TABLES: [&str; 8] = [
    "invoices",
    "sellers",
    "buyers",
    "invoice_items",
    "invoice_summary",
    "payment_information",
    "invoice_metadata",
    "processing_history",
];

/// Invoice schema migrations
pub fn invoice_migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            1,
            "Create invoices table",
            r#"
            CREATE TABLE IF NOT EXISTS invoices (
                id UUID PRIMARY KEY,
                invoice_number VARCHAR(100) NOT NULL,
                invoice_date DATE,
                due_date DATE,
                invoice_type VARCHAR(50) NOT NULL DEFAULT 'STANDARD',
                total_amount NUMERIC(15, 2) NOT NULL,
                currency VARCHAR(3) NOT NULL DEFAULT 'USD',
                ocr_confidence_score DOUBLE PRECISION,
                status VARCHAR(50) NOT NULL DEFAULT 'PROCESSED',
                source_file_url TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_invoices_number ON invoices(invoice_number);
            CREATE INDEX IF NOT EXISTS idx_invoices_created_at ON invoices(created_at);
            "#,
            "DROP TABLE IF EXISTS invoices;",
        ),
        Migration::new(
            2,
            "Create sellers and buyers tables",
            r#"
            CREATE TABLE IF NOT EXISTS sellers (
                id SERIAL PRIMARY KEY,
                invoice_id UUID NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
                name VARCHAR(255),
                address TEXT,
                contact_information TEXT,
                tax_id VARCHAR(100),
                email VARCHAR(255),
                phone VARCHAR(50)
            );
            CREATE TABLE IF NOT EXISTS buyers (
                id SERIAL PRIMARY KEY,
                invoice_id UUID NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
                name VARCHAR(255),
                address TEXT,
                contact_information TEXT,
                tax_id VARCHAR(100),
                email VARCHAR(255),
                phone VARCHAR(50)
            );
            CREATE INDEX IF NOT EXISTS idx_sellers_invoice ON sellers(invoice_id);
            CREATE INDEX IF NOT EXISTS idx_buyers_invoice ON buyers(invoice_id);
            "#,
            "DROP TABLE IF EXISTS buyers; DROP TABLE IF EXISTS sellers;",
        ),
        Migration::new(
            3,
            "Create invoice_items and invoice_summary tables",
            r#"
            CREATE TABLE IF NOT EXISTS invoice_items (
                id SERIAL PRIMARY KEY,
                invoice_id UUID NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
                item_description TEXT,
                item_code VARCHAR(100),
                quantity NUMERIC(15, 4) NOT NULL DEFAULT 0,
                unit_price NUMERIC(15, 4) NOT NULL DEFAULT 0,
                discount_percentage NUMERIC(7, 4) NOT NULL DEFAULT 0,
                discount_amount NUMERIC(15, 2) NOT NULL DEFAULT 0,
                tax_rate NUMERIC(7, 4) NOT NULL DEFAULT 0,
                tax_amount NUMERIC(15, 2) NOT NULL DEFAULT 0,
                line_total NUMERIC(15, 2) NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS invoice_summary (
                id SERIAL PRIMARY KEY,
                invoice_id UUID NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
                subtotal NUMERIC(15, 2) NOT NULL DEFAULT 0,
                total_discount NUMERIC(15, 2) NOT NULL DEFAULT 0,
                total_tax NUMERIC(15, 2) NOT NULL DEFAULT 0,
                shipping_cost NUMERIC(15, 2) NOT NULL DEFAULT 0,
                total_amount_due NUMERIC(15, 2) NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_items_invoice ON invoice_items(invoice_id);
            CREATE INDEX IF NOT EXISTS idx_summary_invoice ON invoice_summary(invoice_id);
            "#,
            "DROP TABLE IF EXISTS invoice_summary; DROP TABLE IF EXISTS invoice_items;",
        ),
        Migration::new(
            4,
            "Create payment, metadata and history tables",
            r#"
            CREATE TABLE IF NOT EXISTS payment_information (
                id SERIAL PRIMARY KEY,
                invoice_id UUID NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
                payment_terms VARCHAR(255),
                payment_method VARCHAR(100),
                bank_account_details TEXT,
                payment_status VARCHAR(50) NOT NULL DEFAULT 'UNPAID',
                payment_date DATE
            );
            CREATE TABLE IF NOT EXISTS invoice_metadata (
                id SERIAL PRIMARY KEY,
                invoice_id UUID NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
                po_number VARCHAR(100),
                notes TEXT,
                terms_and_conditions TEXT,
                ocr_raw_data JSONB NOT NULL DEFAULT '{}'::jsonb,
                custom_fields JSONB NOT NULL DEFAULT '{}'::jsonb
            );
            CREATE TABLE IF NOT EXISTS processing_history (
                id SERIAL PRIMARY KEY,
                invoice_id UUID NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
                action VARCHAR(100) NOT NULL,
                status VARCHAR(50) NOT NULL,
                details JSONB,
                performed_by VARCHAR(100) NOT NULL,
                performed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_payment_invoice ON payment_information(invoice_id);
            CREATE INDEX IF NOT EXISTS idx_payment_status ON payment_information(payment_status);
            CREATE INDEX IF NOT EXISTS idx_metadata_invoice ON invoice_metadata(invoice_id);
            CREATE INDEX IF NOT EXISTS idx_history_invoice ON processing_history(invoice_id);
            "#,
            r#"
            DROP TABLE IF EXISTS processing_history;
            DROP TABLE IF EXISTS invoice_metadata;
            DROP TABLE IF EXISTS payment_information;
            "#,
        ),
    ]
}

/// Runs all pending invoice migrations; returns how many were applied
pub async fn run_invoice_migrations(pool: &PgPool) -> Result<usize, DomainError> {
    let migrator = PostgresMigrator::new(pool.clone());
    let mut applied = 0;

    for migration in invoice_migrations() {
        if migrator.run_migration(&migration).await? {
            applied += 1;
        }
    }

    Ok(applied)
}
