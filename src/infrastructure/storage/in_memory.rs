//! In-memory invoice repository

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::migrations::INVOICE_TABLES;
use crate::domain::invoice::{
    BuyerTotal, InvoiceLookup, InvoiceRecord, InvoiceRepository, InvoiceStatistics, QueryOutcome,
    RecentInvoice, StatusCount, STATISTICS_LIST_LIMIT,
};
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct Tables {
    invoices: Vec<(String, InvoiceRecord)>,
    rows: BTreeMap<&'static str, Vec<Value>>,
}

/// Thread-safe in-memory invoice store
///
/// Writes are staged and committed together, so a failed save leaves no rows
/// behind. Raw SQL is not interpreted: canned outcomes can be registered per
/// statement, and `SELECT 1` always succeeds.
#[derive(Debug, Default)]
pub struct InMemoryInvoiceRepository {
    tables: RwLock<Tables>,
    fail_on_write: Option<usize>,
    canned: RwLock<HashMap<String, QueryOutcome>>,
}

impl InMemoryInvoiceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the n-th table write (1-based) of every save fail
    pub fn failing_on_write(mut self, n: usize) -> Self {
        self.fail_on_write = Some(n);
        self
    }

    /// Register the outcome returned for an exact statement
    pub fn with_query_outcome(self, sql: impl Into<String>, outcome: QueryOutcome) -> Self {
        if let Ok(mut canned) = self.canned.write() {
            canned.insert(sql.into().trim().to_string(), outcome);
        }
        self
    }

    /// Number of committed rows in a table
    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .map(|t| t.rows.get(table).map_or(0, Vec::len))
            .unwrap_or_default()
    }

    /// Committed rows across all invoice tables
    pub fn total_rows(&self) -> usize {
        INVOICE_TABLES.iter().map(|t| self.row_count(t)).sum()
    }

    fn stage(
        &self,
        staged: &mut Vec<(&'static str, Value)>,
        table: &'static str,
        id: &str,
        part: &impl Serialize,
    ) -> Result<(), DomainError> {
        if self.fail_on_write == Some(staged.len() + 1) {
            return Err(DomainError::storage(format!(
                "Failed to save invoice: insert into {} failed",
                table
            )));
        }

        let mut row = serde_json::to_value(part)
            .map_err(|e| DomainError::internal(format!("Failed to serialize row: {}", e)))?;
        if let Value::Object(map) = &mut row {
            let key = if table == "invoices" { "id" } else { "invoice_id" };
            map.insert(key.to_string(), Value::String(id.to_string()));
        }

        staged.push((table, row));
        Ok(())
    }

    fn stage_record(&self, id: &str, record: &InvoiceRecord) -> Result<Vec<(&'static str, Value)>, DomainError> {
        let mut staged = Vec::with_capacity(record.write_count());

        self.stage(&mut staged, "invoices", id, &record.header)?;
        if let Some(seller) = &record.seller {
            self.stage(&mut staged, "sellers", id, seller)?;
        }
        if let Some(buyer) = &record.buyer {
            self.stage(&mut staged, "buyers", id, buyer)?;
        }
        for item in &record.items {
            self.stage(&mut staged, "invoice_items", id, item)?;
        }
        self.stage(&mut staged, "invoice_summary", id, &record.summary)?;
        if let Some(payment) = &record.payment {
            self.stage(&mut staged, "payment_information", id, payment)?;
        }
        self.stage(&mut staged, "invoice_metadata", id, &record.metadata)?;
        self.stage(&mut staged, "processing_history", id, &record.history)?;

        Ok(staged)
    }
}

fn rows_for<'a>(tables: &'a Tables, table: &str, id: &'a str) -> impl Iterator<Item = &'a Value> {
    tables
        .rows
        .get(table)
        .into_iter()
        .flatten()
        .filter(move |row| row.get("invoice_id").and_then(Value::as_str) == Some(id))
}

#[async_trait]
impl InvoiceRepository for InMemoryInvoiceRepository {
    async fn save_invoice(&self, record: &InvoiceRecord) -> Result<String, DomainError> {
        let id = Uuid::new_v4().to_string();
        let staged = self.stage_record(&id, record)?;

        let mut tables = self
            .tables
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))?;

        for (table, row) in staged {
            tables.rows.entry(table).or_default().push(row);
        }
        tables.invoices.push((id.clone(), record.clone()));

        Ok(id)
    }

    async fn get_invoice(&self, lookup: &InvoiceLookup) -> Result<Option<Value>, DomainError> {
        let tables = self
            .tables
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))?;

        let header = tables.rows.get("invoices").into_iter().flatten().rev().find(|row| {
            match lookup {
                InvoiceLookup::Id(id) => row.get("id").and_then(Value::as_str) == Some(id.as_str()),
                InvoiceLookup::Number(number) => {
                    row.get("invoice_number").and_then(Value::as_str) == Some(number.as_str())
                }
            }
        });

        let Some(mut invoice) = header.cloned() else {
            return Ok(None);
        };
        let id = invoice
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let first = |table: &str| rows_for(&tables, table, &id).next().cloned().unwrap_or(Value::Null);
        invoice["seller"] = first("sellers");
        invoice["buyer"] = first("buyers");
        invoice["items"] = Value::Array(rows_for(&tables, "invoice_items", &id).cloned().collect());
        invoice["summary"] = first("invoice_summary");
        invoice["payment"] = first("payment_information");

        Ok(Some(invoice))
    }

    async fn execute_query(&self, sql: &str) -> QueryOutcome {
        let statement = sql.trim();

        if let Some(outcome) = self
            .canned
            .read()
            .ok()
            .and_then(|canned| canned.get(statement).cloned())
        {
            return outcome;
        }

        if statement.trim_end_matches(';').eq_ignore_ascii_case("SELECT 1") {
            return QueryOutcome::rows(vec![json!({"?column?": 1})]);
        }

        QueryOutcome::failed("SQL execution is not supported by the in-memory store")
    }

    async fn statistics(&self) -> Result<InvoiceStatistics, DomainError> {
        let tables = self
            .tables
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))?;
        let records: Vec<&InvoiceRecord> = tables.invoices.iter().map(|(_, r)| r).collect();

        let confidences: Vec<f64> = records
            .iter()
            .filter_map(|r| r.header.ocr_confidence_score)
            .collect();
        let average_confidence = (!confidences.is_empty())
            .then(|| confidences.iter().sum::<f64>() / confidences.len() as f64);

        let mut statuses: BTreeMap<&str, i64> = BTreeMap::new();
        for record in &records {
            *statuses.entry(record.header.status.as_str()).or_default() += 1;
        }
        let mut status_distribution: Vec<StatusCount> = statuses
            .into_iter()
            .map(|(status, count)| StatusCount {
                status: status.to_string(),
                count,
            })
            .collect();
        status_distribution.sort_by(|a, b| b.count.cmp(&a.count));

        let recent_invoices = records
            .iter()
            .rev()
            .take(STATISTICS_LIST_LIMIT)
            .map(|r| RecentInvoice {
                invoice_number: r.header.invoice_number.clone(),
                total_amount: r.header.total_amount,
                invoice_date: r.header.invoice_date,
                status: r.header.status.clone(),
            })
            .collect();

        let mut buyers: BTreeMap<&str, (i64, Decimal)> = BTreeMap::new();
        for record in &records {
            if let Some(buyer) = record.buyer.as_ref().filter(|b| b.has_name()) {
                let entry = buyers.entry(buyer.name.as_str()).or_default();
                entry.0 += 1;
                entry.1 += record.header.total_amount;
            }
        }
        let mut top_buyers: Vec<BuyerTotal> = buyers
            .into_iter()
            .map(|(name, (invoice_count, total_amount))| BuyerTotal {
                name: name.to_string(),
                invoice_count,
                total_amount,
            })
            .collect();
        top_buyers.sort_by(|a, b| b.total_amount.cmp(&a.total_amount));
        top_buyers.truncate(STATISTICS_LIST_LIMIT);

        Ok(InvoiceStatistics {
            total_invoices: records.len() as i64,
            total_amount: records.iter().map(|r| r.header.total_amount).sum(),
            average_confidence,
            status_distribution,
            recent_invoices,
            top_buyers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::invoice::{InvoiceItem, Party, ProcessedInvoice};

    fn record(number: &str, buyer: &str, total: i64) -> InvoiceRecord {
        let invoice = ProcessedInvoice::new(number)
            .with_seller(Party::named("Acme"))
            .with_buyer(Party::named(buyer))
            .with_item(InvoiceItem::new("Widget", Decimal::ONE, Decimal::from(total)))
            .with_ocr_confidence(90.0);
        let mut record = InvoiceRecord::from_processed(&invoice, &json!({"invoice_info": {}}));
        record.header.total_amount = Decimal::from(total);
        record
    }

    #[tokio::test]
    async fn test_save_writes_every_table() {
        let repo = InMemoryInvoiceRepository::new();
        let record = record("INV-1", "Globex", 100);

        let id = repo.save_invoice(&record).await.unwrap();

        assert!(Uuid::parse_str(&id).is_ok());
        assert_eq!(repo.total_rows(), record.write_count());
        assert_eq!(repo.row_count("invoices"), 1);
        assert_eq!(repo.row_count("processing_history"), 1);
        assert_eq!(repo.row_count("payment_information"), 0);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_rows() {
        let repo = InMemoryInvoiceRepository::new().failing_on_write(5);

        let err = repo.save_invoice(&record("INV-1", "Globex", 100)).await.unwrap_err();

        assert!(err.to_string().contains("Failed to save invoice"));
        assert_eq!(repo.total_rows(), 0);
        assert!(repo.statistics().await.unwrap().recent_invoices.is_empty());
    }

    #[tokio::test]
    async fn test_get_invoice_by_id_and_number() {
        let repo = InMemoryInvoiceRepository::new();
        let id = repo.save_invoice(&record("INV-7", "Globex", 100)).await.unwrap();

        let by_id = repo
            .get_invoice(&InvoiceLookup::Id(id.clone()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_id["invoice_number"], "INV-7");
        assert_eq!(by_id["seller"]["name"], "Acme");
        assert_eq!(by_id["items"].as_array().unwrap().len(), 1);
        assert_eq!(by_id["summary"]["invoice_id"], json!(id));

        let by_number = repo
            .get_invoice(&InvoiceLookup::Number("INV-7".to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_number["id"], json!(id));

        assert!(repo
            .get_invoice(&InvoiceLookup::Number("missing".to_string()))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_statistics() {
        let repo = InMemoryInvoiceRepository::new();
        repo.save_invoice(&record("INV-1", "Globex", 100)).await.unwrap();
        repo.save_invoice(&record("INV-2", "Initech", 50)).await.unwrap();
        repo.save_invoice(&record("INV-3", "Globex", 25)).await.unwrap();

        let stats = repo.statistics().await.unwrap();

        assert_eq!(stats.total_invoices, 3);
        assert_eq!(stats.total_amount, Decimal::from(175));
        assert_eq!(stats.average_confidence, Some(90.0));
        assert_eq!(stats.status_distribution[0].count, 3);
        assert_eq!(stats.recent_invoices[0].invoice_number, "INV-3");
        assert_eq!(stats.top_buyers[0].name, "Globex");
        assert_eq!(stats.top_buyers[0].invoice_count, 2);
        assert_eq!(stats.top_buyers[0].total_amount, Decimal::from(125));
    }

    #[tokio::test]
    async fn test_execute_query_and_health_check() {
        let canned = QueryOutcome::rows(vec![json!({"count": 2})]);
        let repo = InMemoryInvoiceRepository::new()
            .with_query_outcome("SELECT COUNT(*) FROM invoices", canned.clone());

        assert!(repo.health_check().await);
        assert_eq!(repo.execute_query(" SELECT COUNT(*) FROM invoices ").await, canned);
        assert!(!repo.execute_query("DELETE FROM invoices").await.success);
    }
}
