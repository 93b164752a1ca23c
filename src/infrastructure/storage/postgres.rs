//! PostgreSQL invoice repository with connection pooling

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::invoice::{
    BuyerTotal, InvoiceItem, InvoiceLookup, InvoiceRecord, InvoiceRepository, InvoiceStatistics,
    Party, QueryOutcome, RecentInvoice, StatusCount, STATISTICS_LIST_LIMIT,
};
use crate::domain::DomainError;

/// PostgreSQL connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn with_idle_timeout(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }
}

/// Open a pool for the configured database
pub async fn connect_pool(config: &PostgresConfig) -> Result<PgPool, DomainError> {
    if config.url.is_empty() {
        return Err(DomainError::configuration(
            "Database URL is not set (database.url or DATABASE_URL)",
        ));
    }

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))
}

/// Invoice repository backed by the eight invoice tables
#[derive(Debug, Clone)]
pub struct PostgresInvoiceRepository {
    pool: PgPool,
}

impl PostgresInvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &PostgresConfig) -> Result<Self, DomainError> {
        Ok(Self::new(connect_pool(config).await?))
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert_header(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        record: &InvoiceRecord,
    ) -> Result<(), sqlx::Error> {
        let header = &record.header;

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, invoice_number, invoice_date, due_date, invoice_type,
                total_amount, currency, ocr_confidence_score, status, source_file_url
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(id)
        .bind(&header.invoice_number)
        .bind(header.invoice_date)
        .bind(header.due_date)
        .bind(&header.invoice_type)
        .bind(header.total_amount)
        .bind(&header.currency)
        .bind(header.ocr_confidence_score)
        .bind(&header.status)
        .bind(&header.source_file_url)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn insert_party(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        table: PartyTable,
        id: Uuid,
        party: &Party,
    ) -> Result<(), sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO {} (
                invoice_id, name, address, contact_information, tax_id, email, phone
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
            table.name()
        );

        sqlx::query(&sql)
            .bind(id)
            .bind(non_empty(&party.name))
            .bind(non_empty(&party.address))
            .bind(non_empty(&party.contact_information))
            .bind(non_empty(&party.tax_id))
            .bind(non_empty(&party.email))
            .bind(non_empty(&party.phone))
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    async fn insert_item(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        item: &InvoiceItem,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO invoice_items (
                invoice_id, item_description, item_code, quantity, unit_price,
                discount_percentage, discount_amount, tax_rate, tax_amount, line_total
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(id)
        .bind(non_empty(&item.item_description))
        .bind(&item.item_code)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.discount_percentage)
        .bind(item.discount_amount)
        .bind(item.tax_rate)
        .bind(item.tax_amount)
        .bind(item.line_total)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn insert_summary(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        record: &InvoiceRecord,
    ) -> Result<(), sqlx::Error> {
        let summary = &record.summary;

        sqlx::query(
            r#"
            INSERT INTO invoice_summary (
                invoice_id, subtotal, total_discount, total_tax, shipping_cost, total_amount_due
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(summary.subtotal)
        .bind(summary.total_discount)
        .bind(summary.total_tax)
        .bind(summary.shipping_cost)
        .bind(summary.total_amount_due)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn insert_payment(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        record: &InvoiceRecord,
    ) -> Result<(), sqlx::Error> {
        let Some(payment) = &record.payment else {
            return Ok(());
        };

        sqlx::query(
            r#"
            INSERT INTO payment_information (
                invoice_id, payment_terms, payment_method, bank_account_details, payment_status
            ) VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(&payment.payment_terms)
        .bind(&payment.payment_method)
        .bind(&payment.bank_account_details)
        .bind(&payment.payment_status)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn insert_metadata(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        record: &InvoiceRecord,
    ) -> Result<(), sqlx::Error> {
        let metadata = &record.metadata;

        sqlx::query(
            r#"
            INSERT INTO invoice_metadata (
                invoice_id, po_number, notes, terms_and_conditions, ocr_raw_data, custom_fields
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(&metadata.po_number)
        .bind(&metadata.notes)
        .bind(&metadata.terms_and_conditions)
        .bind(&metadata.ocr_raw_data)
        .bind(&metadata.custom_fields)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn insert_history(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        record: &InvoiceRecord,
    ) -> Result<(), sqlx::Error> {
        let history = &record.history;

        sqlx::query(
            r#"
            INSERT INTO processing_history (invoice_id, action, status, details, performed_by)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(&history.action)
        .bind(&history.status)
        .bind(&history.details)
        .bind(&history.performed_by)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn write_record(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        record: &InvoiceRecord,
    ) -> Result<(), sqlx::Error> {
        self.insert_header(tx, id, record).await?;

        if let Some(seller) = &record.seller {
            self.insert_party(tx, PartyTable::Sellers, id, seller).await?;
        }
        if let Some(buyer) = &record.buyer {
            self.insert_party(tx, PartyTable::Buyers, id, buyer).await?;
        }
        for item in &record.items {
            self.insert_item(tx, id, item).await?;
        }

        self.insert_summary(tx, id, record).await?;
        self.insert_payment(tx, id, record).await?;
        self.insert_metadata(tx, id, record).await?;
        self.insert_history(tx, id, record).await?;

        Ok(())
    }

    async fn fetch_json(&self, sql: &str, id: Uuid) -> Result<Option<Value>, DomainError> {
        sqlx::query_scalar::<_, Value>(sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to fetch invoice: {}", e)))
    }

    async fn fetch_statistics(&self) -> Result<InvoiceStatistics, sqlx::Error> {
        let limit = STATISTICS_LIST_LIMIT as i64;

        let (total_invoices, total_amount, average_confidence): (i64, Decimal, Option<f64>) =
            sqlx::query_as(
                r#"
                SELECT COUNT(*)::BIGINT,
                       COALESCE(SUM(total_amount), 0),
                       AVG(ocr_confidence_score)::DOUBLE PRECISION
                FROM invoices
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        let status_distribution: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*)::BIGINT FROM invoices GROUP BY status ORDER BY 2 DESC, 1",
        )
        .fetch_all(&self.pool)
        .await?;

        let recent_invoices: Vec<(String, Decimal, Option<chrono::NaiveDate>, String)> =
            sqlx::query_as(
                r#"
                SELECT invoice_number, total_amount, invoice_date, status
                FROM invoices
                ORDER BY created_at DESC
                LIMIT $1
                "#,
            )
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let top_buyers: Vec<(String, i64, Decimal)> = sqlx::query_as(
            r#"
            SELECT b.name, COUNT(*)::BIGINT, COALESCE(SUM(i.total_amount), 0)
            FROM buyers b
            JOIN invoices i ON i.id = b.invoice_id
            WHERE b.name IS NOT NULL
            GROUP BY b.name
            ORDER BY 3 DESC, 1
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(InvoiceStatistics {
            total_invoices,
            total_amount,
            average_confidence,
            status_distribution: status_distribution
                .into_iter()
                .map(|(status, count)| StatusCount { status, count })
                .collect(),
            recent_invoices: recent_invoices
                .into_iter()
                .map(|(invoice_number, total_amount, invoice_date, status)| RecentInvoice {
                    invoice_number,
                    total_amount,
                    invoice_date,
                    status,
                })
                .collect(),
            top_buyers: top_buyers
                .into_iter()
                .map(|(name, invoice_count, total_amount)| BuyerTotal {
                    name,
                    invoice_count,
                    total_amount,
                })
                .collect(),
        })
    }
}

#[async_trait]
impl InvoiceRepository for PostgresInvoiceRepository {
    async fn save_invoice(&self, record: &InvoiceRecord) -> Result<String, DomainError> {
        let id = Uuid::new_v4();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        // Dropping the transaction on error rolls every insert back
        self.write_record(&mut tx, id, record)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to save invoice: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to commit invoice: {}", e)))?;

        info!(
            invoice_id = %id,
            invoice_number = %record.header.invoice_number,
            writes = record.write_count(),
            "Invoice saved"
        );

        Ok(id.to_string())
    }

    async fn get_invoice(&self, lookup: &InvoiceLookup) -> Result<Option<Value>, DomainError> {
        let header: Option<Value> = match lookup {
            InvoiceLookup::Id(raw) => {
                let Ok(id) = Uuid::parse_str(raw) else {
                    debug!(invoice_id = %raw, "Invoice id is not a UUID");
                    return Ok(None);
                };
                self.fetch_json("SELECT row_to_json(i) FROM invoices i WHERE i.id = $1", id)
                    .await?
            }
            InvoiceLookup::Number(number) => sqlx::query_scalar::<_, Value>(
                r#"
                SELECT row_to_json(i) FROM invoices i
                WHERE i.invoice_number = $1
                ORDER BY i.created_at DESC
                LIMIT 1
                "#,
            )
            .bind(number)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to fetch invoice: {}", e)))?,
        };

        let Some(mut invoice) = header else {
            return Ok(None);
        };

        let id = invoice
            .get("id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| DomainError::storage("Stored invoice has no id"))?;

        let related = [
            ("seller", "SELECT row_to_json(t) FROM sellers t WHERE t.invoice_id = $1 LIMIT 1"),
            ("buyer", "SELECT row_to_json(t) FROM buyers t WHERE t.invoice_id = $1 LIMIT 1"),
            (
                "items",
                "SELECT COALESCE(json_agg(t ORDER BY t.id), '[]'::json) FROM invoice_items t WHERE t.invoice_id = $1",
            ),
            (
                "summary",
                "SELECT row_to_json(t) FROM invoice_summary t WHERE t.invoice_id = $1 LIMIT 1",
            ),
            (
                "payment",
                "SELECT row_to_json(t) FROM payment_information t WHERE t.invoice_id = $1 LIMIT 1",
            ),
        ];

        for (key, sql) in related {
            let value = self.fetch_json(sql, id).await?.unwrap_or(Value::Null);
            invoice[key] = value;
        }

        Ok(Some(invoice))
    }

    async fn execute_query(&self, sql: &str) -> QueryOutcome {
        let statement = sql.trim().trim_end_matches(';').trim();

        if returns_rows(statement) {
            let wrapped = format!(
                "SELECT COALESCE(json_agg(t), '[]'::json) FROM ({}) t",
                statement
            );

            match sqlx::query_scalar::<_, Value>(&wrapped)
                .fetch_one(&self.pool)
                .await
            {
                Ok(Value::Array(rows)) => QueryOutcome::rows(rows),
                Ok(other) => QueryOutcome::rows(vec![other]),
                Err(e) => {
                    warn!(error = %e, "Query failed");
                    QueryOutcome::failed(e.to_string())
                }
            }
        } else {
            match sqlx::query(statement).execute(&self.pool).await {
                Ok(result) => QueryOutcome::affected(result.rows_affected()),
                Err(e) => {
                    warn!(error = %e, "Statement failed");
                    QueryOutcome::failed(e.to_string())
                }
            }
        }
    }

    async fn statistics(&self) -> Result<InvoiceStatistics, DomainError> {
        self.fetch_statistics()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to load statistics: {}", e)))
    }
}

#[derive(Debug, Clone, Copy)]
enum PartyTable {
    Sellers,
    Buyers,
}

impl PartyTable {
    fn name(self) -> &'static str {
        match self {
            Self::Sellers => "sellers",
            Self::Buyers => "buyers",
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Whether a statement produces a result set
pub(crate) fn returns_rows(statement: &str) -> bool {
    let first = statement
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();

    matches!(first.as_str(), "SELECT" | "WITH" | "VALUES" | "TABLE")
}
