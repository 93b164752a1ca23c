//! Processed invoice - the cleaned, typed form of an OCR extraction

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Default invoice type when the extraction does not name one
pub const DEFAULT_INVOICE_TYPE: &str = "STANDARD";

/// Seller or buyer contact record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    pub address: String,
    pub contact_information: String,
    pub tax_id: String,
    pub email: String,
    pub phone: String,
}

impl Party {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

/// One invoice line. All amounts are exact decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub item_description: String,
    pub item_code: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount_percentage: Decimal,
    pub discount_amount: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub line_total: Decimal,
}

impl InvoiceItem {
    /// Item with zero discount and tax; line total is quantity times unit price
    pub fn new(description: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            item_description: description.into(),
            item_code: None,
            quantity,
            unit_price,
            discount_percentage: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            tax_rate: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            line_total: quantity * unit_price,
        }
    }

    pub fn with_discount_percentage(mut self, percentage: Decimal) -> Self {
        self.discount_percentage = percentage;
        self
    }

    pub fn with_tax_rate(mut self, rate: Decimal) -> Self {
        self.tax_rate = rate;
        self
    }
}

/// Invoice totals as printed on the document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceSummary {
    pub subtotal: Decimal,
    pub total_discount: Decimal,
    pub total_tax: Decimal,
    pub shipping_cost: Decimal,
    pub total_amount_due: Decimal,
}

/// Invoice after data mapping, the input of the validation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedInvoice {
    pub invoice_number: String,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub invoice_type: String,
    pub seller: Party,
    pub buyer: Party,
    pub items: Vec<InvoiceItem>,
    pub summary: InvoiceSummary,
    pub payment_terms: Option<String>,
    pub payment_method: Option<String>,
    pub po_number: Option<String>,
    pub notes: Option<String>,
    /// Overall OCR confidence, 0-100
    pub ocr_confidence: f64,
}

impl ProcessedInvoice {
    pub fn new(invoice_number: impl Into<String>) -> Self {
        Self {
            invoice_number: invoice_number.into(),
            invoice_date: None,
            due_date: None,
            invoice_type: DEFAULT_INVOICE_TYPE.to_string(),
            seller: Party::default(),
            buyer: Party::default(),
            items: Vec::new(),
            summary: InvoiceSummary::default(),
            payment_terms: None,
            payment_method: None,
            po_number: None,
            notes: None,
            ocr_confidence: 0.0,
        }
    }

    pub fn with_dates(mut self, invoice_date: Option<NaiveDate>, due_date: Option<NaiveDate>) -> Self {
        self.invoice_date = invoice_date;
        self.due_date = due_date;
        self
    }

    pub fn with_seller(mut self, seller: Party) -> Self {
        self.seller = seller;
        self
    }

    pub fn with_buyer(mut self, buyer: Party) -> Self {
        self.buyer = buyer;
        self
    }

    pub fn with_item(mut self, item: InvoiceItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_summary(mut self, summary: InvoiceSummary) -> Self {
        self.summary = summary;
        self
    }

    pub fn with_payment_terms(mut self, terms: impl Into<String>) -> Self {
        self.payment_terms = Some(terms.into());
        self
    }

    pub fn with_ocr_confidence(mut self, confidence: f64) -> Self {
        self.ocr_confidence = confidence;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_defaults() {
        let item = InvoiceItem::new("Widget", Decimal::from(3), Decimal::new(250, 2));

        assert_eq!(item.line_total, Decimal::new(750, 2));
        assert_eq!(item.discount_percentage, Decimal::ZERO);
        assert!(item.item_code.is_none());
    }

    #[test]
    fn test_invoice_defaults() {
        let invoice = ProcessedInvoice::new("INV-1");

        assert_eq!(invoice.invoice_type, DEFAULT_INVOICE_TYPE);
        assert!(invoice.items.is_empty());
        assert!(!invoice.seller.has_name());
    }

    #[test]
    fn test_decimal_serialization_is_exact() {
        let summary = InvoiceSummary {
            subtotal: Decimal::new(1010, 2),
            ..Default::default()
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["subtotal"], serde_json::json!("10.10"));
    }
}
