//! Invoice validation engine
//!
//! Pure checks over a [`ProcessedInvoice`]. Hard errors decide validity;
//! warnings and suggestions are advisory only.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::entity::{Party, ProcessedInvoice};

/// Maximum absolute difference tolerated between computed and printed totals
pub const DEFAULT_TOTALS_TOLERANCE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

/// OCR confidence below which manual review is suggested
pub const DEFAULT_LOW_CONFIDENCE_THRESHOLD: f64 = 80.0;

static INVOICE_NUMBER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9\-/]+$").unwrap());

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

/// Verdict produced by the validation engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

impl ValidationResult {
    /// Build a verdict; validity is derived from the error list
    pub fn new(errors: Vec<String>, warnings: Vec<String>, suggestions: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            suggestions,
        }
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Internal failure of the engine itself, distinct from validation findings
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationFault {
    #[error("arithmetic overflow while checking {0}")]
    Overflow(String),
}

/// Invoice validator
#[derive(Debug, Clone)]
pub struct InvoiceValidator {
    totals_tolerance: Decimal,
    low_confidence_threshold: f64,
}

impl Default for InvoiceValidator {
    fn default() -> Self {
        Self {
            totals_tolerance: DEFAULT_TOTALS_TOLERANCE,
            low_confidence_threshold: DEFAULT_LOW_CONFIDENCE_THRESHOLD,
        }
    }
}

impl InvoiceValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_totals_tolerance(mut self, tolerance: Decimal) -> Self {
        self.totals_tolerance = tolerance;
        self
    }

    pub fn with_low_confidence_threshold(mut self, threshold: f64) -> Self {
        self.low_confidence_threshold = threshold;
        self
    }

    /// Run every check against the invoice
    pub fn validate(&self, invoice: &ProcessedInvoice) -> Result<ValidationResult, ValidationFault> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut suggestions = Vec::new();

        let number = invoice.invoice_number.trim();
        if number.is_empty() {
            errors.push("Invoice number is required".to_string());
        }

        if invoice.invoice_date.is_none() {
            warnings.push("Invoice date is missing".to_string());
        }

        if !number.is_empty() && !INVOICE_NUMBER_PATTERN.is_match(&number.to_uppercase()) {
            warnings.push("Invoice number format may be incorrect".to_string());
        }

        if let (Some(invoice_date), Some(due_date)) = (invoice.invoice_date, invoice.due_date) {
            if due_date < invoice_date {
                errors.push("Due date cannot be before invoice date".to_string());
            }
        }

        if !self.totals_match(invoice)? {
            warnings.push("Invoice totals may not add up correctly".to_string());
        }

        if !invoice.seller.has_name() {
            warnings.push("Seller information is incomplete".to_string());
        }

        if !invoice.buyer.has_name() {
            warnings.push("Buyer information is incomplete".to_string());
        }

        if !email_is_valid(&invoice.seller) {
            warnings.push("Seller email format is invalid".to_string());
        }

        if !email_is_valid(&invoice.buyer) {
            warnings.push("Buyer email format is invalid".to_string());
        }

        if invoice.items.is_empty() {
            errors.push("Invoice must have at least one line item".to_string());
        }

        for (i, item) in invoice.items.iter().enumerate() {
            if item.quantity <= Decimal::ZERO {
                errors.push(format!("Item {}: Quantity must be positive", i + 1));
            }
            if item.unit_price < Decimal::ZERO {
                errors.push(format!("Item {}: Unit price cannot be negative", i + 1));
            }
        }

        if invoice.ocr_confidence < self.low_confidence_threshold {
            suggestions.push("OCR confidence is low. Manual review recommended.".to_string());
        }

        if invoice
            .payment_terms
            .as_deref()
            .is_none_or(|terms| terms.trim().is_empty())
        {
            suggestions.push("Consider adding payment terms".to_string());
        }

        Ok(ValidationResult::new(errors, warnings, suggestions))
    }

    /// Recompute subtotal and tax from the line items and compare to the summary
    fn totals_match(&self, invoice: &ProcessedInvoice) -> Result<bool, ValidationFault> {
        let overflow = || ValidationFault::Overflow("invoice totals".to_string());
        let hundred = Decimal::ONE_HUNDRED;

        let mut subtotal = Decimal::ZERO;
        let mut tax = Decimal::ZERO;

        for item in &invoice.items {
            let mut line = item
                .quantity
                .checked_mul(item.unit_price)
                .ok_or_else(overflow)?;

            if !item.discount_percentage.is_zero() {
                let factor = hundred
                    .checked_sub(item.discount_percentage)
                    .and_then(|v| v.checked_div(hundred))
                    .ok_or_else(overflow)?;
                line = line.checked_mul(factor).ok_or_else(overflow)?;
            }

            subtotal = subtotal.checked_add(line).ok_or_else(overflow)?;

            if !item.tax_rate.is_zero() {
                let line_tax = line
                    .checked_mul(item.tax_rate)
                    .and_then(|v| v.checked_div(hundred))
                    .ok_or_else(overflow)?;
                tax = tax.checked_add(line_tax).ok_or_else(overflow)?;
            }
        }

        let subtotal_diff = subtotal
            .checked_sub(invoice.summary.subtotal)
            .ok_or_else(overflow)?
            .abs();
        let tax_diff = tax
            .checked_sub(invoice.summary.total_tax)
            .ok_or_else(overflow)?
            .abs();

        Ok(subtotal_diff <= self.totals_tolerance && tax_diff <= self.totals_tolerance)
    }
}

/// Blank emails pass; present ones must look like an address
fn email_is_valid(party: &Party) -> bool {
    let email = party.email.trim();
    email.is_empty() || EMAIL_PATTERN.is_match(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::invoice::entity::{InvoiceItem, InvoiceSummary};
    use chrono::NaiveDate;

    fn dec(text: &str) -> Decimal {
        Decimal::from_str_exact(text).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    fn clean_invoice() -> ProcessedInvoice {
        ProcessedInvoice::new("INV-2024-001")
            .with_dates(date(2024, 1, 15), date(2024, 2, 14))
            .with_seller(Party::named("Acme Corp").with_email("billing@acme.com"))
            .with_buyer(Party::named("Globex"))
            .with_item(InvoiceItem::new("Widget", dec("2"), dec("10.00")).with_tax_rate(dec("10")))
            .with_summary(InvoiceSummary {
                subtotal: dec("20.00"),
                total_tax: dec("2.00"),
                total_amount_due: dec("22.00"),
                ..Default::default()
            })
            .with_payment_terms("Net 30")
            .with_ocr_confidence(92.0)
    }

    #[test]
    fn test_clean_invoice_has_no_findings() {
        let result = InvoiceValidator::new().validate(&clean_invoice()).unwrap();

        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
        assert!(result.suggestions.is_empty());
    }

    #[test]
    fn test_totals_within_tolerance() {
        let mut invoice = clean_invoice();
        invoice.summary.total_tax = dec("2.05");

        let result = InvoiceValidator::new().validate(&invoice).unwrap();
        assert!(!result.warnings.contains(&"Invoice totals may not add up correctly".to_string()));
    }

    #[test]
    fn test_totals_mismatch_is_a_warning() {
        let mut invoice = clean_invoice();
        invoice.summary.total_tax = dec("5.00");

        let result = InvoiceValidator::new().validate(&invoice).unwrap();

        assert!(result.is_valid);
        assert_eq!(result.warnings, vec!["Invoice totals may not add up correctly"]);
    }

    #[test]
    fn test_totals_use_exact_decimals() {
        // 0.1 * 3 summed thirty times drifts in binary floating point
        let mut invoice = clean_invoice();
        invoice.items = (0..30)
            .map(|_| InvoiceItem::new("Bolt", dec("3"), dec("0.1")))
            .collect();
        invoice.summary.subtotal = dec("9.0");
        invoice.summary.total_tax = Decimal::ZERO;

        let validator = InvoiceValidator::new().with_totals_tolerance(Decimal::ZERO);
        let result = validator.validate(&invoice).unwrap();
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_discount_reduces_subtotal() {
        let mut invoice = clean_invoice();
        invoice.items = vec![
            InvoiceItem::new("Widget", dec("2"), dec("10.00"))
                .with_discount_percentage(dec("10"))
                .with_tax_rate(dec("20")),
        ];
        invoice.summary.subtotal = dec("18.00");
        invoice.summary.total_tax = dec("3.60");

        let result = InvoiceValidator::new().validate(&invoice).unwrap();
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_missing_invoice_number_and_items() {
        let mut invoice = clean_invoice();
        invoice.invoice_number = String::new();
        invoice.items.clear();
        invoice.summary = InvoiceSummary::default();

        let result = InvoiceValidator::new().validate(&invoice).unwrap();

        assert!(!result.is_valid);
        assert_eq!(
            result.errors,
            vec![
                "Invoice number is required",
                "Invoice must have at least one line item"
            ]
        );
    }

    #[test]
    fn test_due_date_before_invoice_date() {
        let mut invoice = clean_invoice();
        invoice.due_date = date(2024, 1, 1);

        let result = InvoiceValidator::new().validate(&invoice).unwrap();
        assert_eq!(result.errors, vec!["Due date cannot be before invoice date"]);
    }

    #[test]
    fn test_item_errors_are_indexed_from_one() {
        let mut invoice = clean_invoice();
        invoice.items.push(InvoiceItem::new("Refund", dec("0"), dec("-5")));

        let result = InvoiceValidator::new().validate(&invoice).unwrap();

        assert!(!result.is_valid);
        assert!(result.errors.contains(&"Item 2: Quantity must be positive".to_string()));
        assert!(result.errors.contains(&"Item 2: Unit price cannot be negative".to_string()));
    }

    #[test]
    fn test_format_and_completeness_warnings() {
        let mut invoice = clean_invoice();
        invoice.invoice_number = "inv 001".to_string();
        invoice.invoice_date = None;
        invoice.buyer = Party::default().with_email("not-an-email");

        let result = InvoiceValidator::new().validate(&invoice).unwrap();

        assert!(result.is_valid);
        assert_eq!(
            result.warnings,
            vec![
                "Invoice date is missing",
                "Invoice number format may be incorrect",
                "Buyer information is incomplete",
                "Buyer email format is invalid",
            ]
        );
    }

    #[test]
    fn test_lowercase_invoice_number_is_accepted() {
        let mut invoice = clean_invoice();
        invoice.invoice_number = "inv-2024/001".to_string();

        let result = InvoiceValidator::new().validate(&invoice).unwrap();
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_suggestions_never_affect_validity() {
        let mut invoice = clean_invoice();
        invoice.payment_terms = None;
        invoice.ocr_confidence = 55.0;

        let result = InvoiceValidator::new().validate(&invoice).unwrap();

        assert!(result.is_valid);
        assert_eq!(
            result.suggestions,
            vec![
                "OCR confidence is low. Manual review recommended.",
                "Consider adding payment terms"
            ]
        );
    }

    #[test]
    fn test_validity_tracks_errors_only() {
        let invoices = [
            clean_invoice(),
            ProcessedInvoice::new(""),
            ProcessedInvoice::new("A1").with_item(InvoiceItem::new("x", dec("1"), dec("1"))),
        ];

        for invoice in &invoices {
            let result = InvoiceValidator::new().validate(invoice).unwrap();
            assert_eq!(result.is_valid, result.errors.is_empty());
        }
    }

    #[test]
    fn test_overflow_is_a_fault() {
        let mut invoice = clean_invoice();
        invoice.items = vec![InvoiceItem {
            quantity: Decimal::MAX,
            unit_price: Decimal::MAX,
            line_total: Decimal::ZERO,
            ..InvoiceItem::new("Huge", Decimal::ONE, Decimal::ONE)
        }];

        let fault = InvoiceValidator::new().validate(&invoice).unwrap_err();
        assert!(matches!(fault, ValidationFault::Overflow(_)));
    }
}
