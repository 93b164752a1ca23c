//! Storage record written by the persistence stage
//!
//! One record fans out to the eight invoice tables. It can be built from the
//! raw OCR extraction or from a validated [`ProcessedInvoice`]; either way the
//! raw extraction is kept as the audit blob.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entity::{InvoiceItem, InvoiceSummary, Party, ProcessedInvoice, DEFAULT_INVOICE_TYPE};
use super::extraction::{InvoiceExtraction, ItemExtraction, PartyExtraction};
use super::mapping::{parse_date, MappingError};

/// Header status for invoices created by the workflow
pub const STATUS_PROCESSED: &str = "PROCESSED";

/// Currency recorded when the document does not state one
pub const DEFAULT_CURRENCY: &str = "USD";

/// Payment status of a freshly ingested invoice
pub const PAYMENT_STATUS_UNPAID: &str = "UNPAID";

/// Processing-history row appended on insert
pub const HISTORY_ACTION_CREATED: &str = "INVOICE_CREATED";
pub const HISTORY_STATUS_SUCCESS: &str = "SUCCESS";
pub const HISTORY_SOURCE: &str = "OCR_PROCESSING";
pub const HISTORY_PERFORMED_BY: &str = "system";

/// `invoices` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceHeader {
    pub invoice_number: String,
    pub invoice_date: Option<chrono::NaiveDate>,
    pub due_date: Option<chrono::NaiveDate>,
    pub invoice_type: String,
    pub total_amount: Decimal,
    pub currency: String,
    pub ocr_confidence_score: Option<f64>,
    pub status: String,
    pub source_file_url: Option<String>,
}

/// `payment_information` row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_terms: Option<String>,
    pub payment_method: Option<String>,
    pub bank_account_details: Option<String>,
    pub payment_status: String,
}

/// `invoice_metadata` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceMetadataRecord {
    pub po_number: Option<String>,
    pub notes: Option<String>,
    pub terms_and_conditions: Option<String>,
    pub ocr_raw_data: Value,
    pub custom_fields: Value,
}

/// `processing_history` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub action: String,
    pub status: String,
    pub details: Value,
    pub performed_by: String,
}

impl Default for HistoryRecord {
    fn default() -> Self {
        Self {
            action: HISTORY_ACTION_CREATED.to_string(),
            status: HISTORY_STATUS_SUCCESS.to_string(),
            details: serde_json::json!({ "source": HISTORY_SOURCE }),
            performed_by: HISTORY_PERFORMED_BY.to_string(),
        }
    }
}

/// Everything persisted for one invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub header: InvoiceHeader,
    pub seller: Option<Party>,
    pub buyer: Option<Party>,
    pub items: Vec<InvoiceItem>,
    pub summary: InvoiceSummary,
    pub payment: Option<PaymentRecord>,
    pub metadata: InvoiceMetadataRecord,
    pub history: HistoryRecord,
}

impl InvoiceRecord {
    /// Build a record straight from the raw OCR extraction
    ///
    /// Absent amounts are stored as zero; only the invoice number and the
    /// amount due are mandatory.
    pub fn from_extraction(raw: &Value) -> Result<Self, MappingError> {
        let extraction = InvoiceExtraction::from_value(raw)
            .map_err(|e| MappingError::Malformed(e.to_string()))?;
        let info = &extraction.invoice_info;

        let invoice_number = info
            .invoice_number
            .clone()
            .ok_or_else(|| MappingError::MissingField("invoice_number".to_string()))?;
        let total_amount = extraction
            .summary
            .total_amount_due
            .ok_or_else(|| MappingError::MissingField("summary.total_amount_due".to_string()))?;

        let summary = InvoiceSummary {
            subtotal: extraction.summary.subtotal.unwrap_or_default(),
            total_discount: extraction.summary.total_discount.unwrap_or_default(),
            total_tax: extraction.summary.total_tax.unwrap_or_default(),
            shipping_cost: extraction.summary.shipping_cost.unwrap_or_default(),
            total_amount_due: total_amount,
        };

        let payment = extraction.payment.as_ref().map(|p| PaymentRecord {
            payment_terms: p.terms.clone(),
            payment_method: p.method.clone(),
            bank_account_details: p.bank_details.clone(),
            payment_status: PAYMENT_STATUS_UNPAID.to_string(),
        });

        Ok(Self {
            header: InvoiceHeader {
                invoice_number,
                invoice_date: parse_date("invoice_date", info.invoice_date.as_deref())?,
                due_date: parse_date("due_date", info.due_date.as_deref())?,
                invoice_type: info
                    .invoice_type
                    .clone()
                    .unwrap_or_else(|| DEFAULT_INVOICE_TYPE.to_string()),
                total_amount,
                currency: DEFAULT_CURRENCY.to_string(),
                ocr_confidence_score: extraction.confidence_scores.overall,
                status: STATUS_PROCESSED.to_string(),
                source_file_url: None,
            },
            seller: extraction.seller.as_ref().map(raw_party),
            buyer: extraction.buyer.as_ref().map(raw_party),
            items: extraction.items.iter().map(raw_item).collect(),
            summary,
            payment,
            metadata: InvoiceMetadataRecord {
                po_number: info.po_number.clone(),
                notes: extraction.additional.notes.clone(),
                terms_and_conditions: extraction.additional.terms_and_conditions.clone(),
                ocr_raw_data: raw.clone(),
                custom_fields: Value::Object(Default::default()),
            },
            history: HistoryRecord::default(),
        })
    }

    /// Build a record from a validated invoice, keeping the raw extraction for audit
    pub fn from_processed(invoice: &ProcessedInvoice, raw: &Value) -> Self {
        let terms_and_conditions = raw
            .pointer("/additional/terms_and_conditions")
            .and_then(Value::as_str)
            .map(str::to_string);
        let bank_account_details = raw
            .pointer("/payment/bank_details")
            .and_then(Value::as_str)
            .map(str::to_string);

        let payment = (invoice.payment_terms.is_some()
            || invoice.payment_method.is_some()
            || bank_account_details.is_some())
        .then(|| PaymentRecord {
            payment_terms: invoice.payment_terms.clone(),
            payment_method: invoice.payment_method.clone(),
            bank_account_details,
            payment_status: PAYMENT_STATUS_UNPAID.to_string(),
        });

        Self {
            header: InvoiceHeader {
                invoice_number: invoice.invoice_number.clone(),
                invoice_date: invoice.invoice_date,
                due_date: invoice.due_date,
                invoice_type: invoice.invoice_type.clone(),
                total_amount: invoice.summary.total_amount_due,
                currency: DEFAULT_CURRENCY.to_string(),
                ocr_confidence_score: Some(invoice.ocr_confidence),
                status: STATUS_PROCESSED.to_string(),
                source_file_url: None,
            },
            seller: Some(invoice.seller.clone()),
            buyer: Some(invoice.buyer.clone()),
            items: invoice.items.clone(),
            summary: invoice.summary.clone(),
            payment,
            metadata: InvoiceMetadataRecord {
                po_number: invoice.po_number.clone(),
                notes: invoice.notes.clone(),
                terms_and_conditions,
                ocr_raw_data: raw.clone(),
                custom_fields: Value::Object(Default::default()),
            },
            history: HistoryRecord::default(),
        }
    }

    /// Number of table writes this record produces
    pub fn write_count(&self) -> usize {
        // header, summary, metadata, history are always written
        4 + usize::from(self.seller.is_some())
            + usize::from(self.buyer.is_some())
            + usize::from(self.payment.is_some())
            + self.items.len()
    }
}

fn raw_party(party: &PartyExtraction) -> Party {
    Party {
        name: party.name.clone().unwrap_or_default(),
        address: party.address.clone().unwrap_or_default(),
        contact_information: party.contact_information.clone().unwrap_or_default(),
        tax_id: party.tax_id.clone().unwrap_or_default(),
        email: party.email.clone().unwrap_or_default(),
        phone: party.phone.clone().unwrap_or_default(),
    }
}

fn raw_item(item: &ItemExtraction) -> InvoiceItem {
    InvoiceItem {
        item_description: item.description.clone().unwrap_or_default(),
        item_code: item.code.clone(),
        quantity: item.quantity.unwrap_or_default(),
        unit_price: item.unit_price.unwrap_or_default(),
        discount_percentage: item.discount_percentage.unwrap_or_default(),
        discount_amount: item.discount_amount.unwrap_or_default(),
        tax_rate: item.tax_rate.unwrap_or_default(),
        tax_amount: item.tax_amount.unwrap_or_default(),
        line_total: item.line_total.unwrap_or_default(),
    }
}
