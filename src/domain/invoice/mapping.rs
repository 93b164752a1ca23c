//! Field mapping from an OCR extraction to a [`ProcessedInvoice`]

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;

use super::entity::{
    InvoiceItem, InvoiceSummary, Party, ProcessedInvoice, DEFAULT_INVOICE_TYPE,
};
use super::extraction::{InvoiceExtraction, ItemExtraction, PartyExtraction};

/// Date format used by the OCR service
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Reasons an extraction cannot be mapped
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MappingError {
    #[error("Malformed extraction: {0}")]
    Malformed(String),

    #[error("Required field '{0}' is missing")]
    MissingField(String),

    #[error("Field '{field}' has invalid date '{value}' (expected YYYY-MM-DD)")]
    InvalidDate { field: String, value: String },

    #[error("Item {index}: {message}")]
    InvalidItem { index: usize, message: String },

    #[error("Arithmetic overflow while deriving '{0}'")]
    Overflow(String),
}

/// Map a raw extraction (JSON) into a processed invoice
pub fn map_extraction_value(raw: &Value) -> Result<ProcessedInvoice, MappingError> {
    let extraction =
        InvoiceExtraction::from_value(raw).map_err(|e| MappingError::Malformed(e.to_string()))?;

    map_extraction(&extraction)
}

/// Map a decoded extraction into a processed invoice
pub fn map_extraction(extraction: &InvoiceExtraction) -> Result<ProcessedInvoice, MappingError> {
    let info = &extraction.invoice_info;

    let invoice_number = info
        .invoice_number
        .clone()
        .ok_or_else(|| MappingError::MissingField("invoice_number".to_string()))?;

    let items = extraction
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| map_item(i + 1, item))
        .collect::<Result<Vec<_>, _>>()?;

    let summary = &extraction.summary;
    let summary = InvoiceSummary {
        subtotal: summary
            .subtotal
            .ok_or_else(|| MappingError::MissingField("summary.subtotal".to_string()))?,
        total_discount: summary.total_discount.unwrap_or_default(),
        total_tax: summary.total_tax.unwrap_or_default(),
        shipping_cost: summary.shipping_cost.unwrap_or_default(),
        total_amount_due: summary
            .total_amount_due
            .ok_or_else(|| MappingError::MissingField("summary.total_amount_due".to_string()))?,
    };

    let payment = extraction.payment.clone().unwrap_or_default();

    Ok(ProcessedInvoice {
        invoice_number,
        invoice_date: parse_date("invoice_date", info.invoice_date.as_deref())?,
        due_date: parse_date("due_date", info.due_date.as_deref())?,
        invoice_type: info
            .invoice_type
            .clone()
            .unwrap_or_else(|| DEFAULT_INVOICE_TYPE.to_string()),
        seller: map_party(extraction.seller.as_ref()),
        buyer: map_party(extraction.buyer.as_ref()),
        items,
        summary,
        payment_terms: payment.terms,
        payment_method: payment.method,
        po_number: info.po_number.clone(),
        notes: extraction.additional.notes.clone(),
        ocr_confidence: extraction.confidence_scores.overall.unwrap_or(0.0),
    })
}

/// Parse an optional `YYYY-MM-DD` date
pub fn parse_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, MappingError> {
    value
        .map(|v| {
            NaiveDate::parse_from_str(v, DATE_FORMAT).map_err(|_| MappingError::InvalidDate {
                field: field.to_string(),
                value: v.to_string(),
            })
        })
        .transpose()
}

fn map_party(party: Option<&PartyExtraction>) -> Party {
    let Some(party) = party else {
        return Party::default();
    };

    Party {
        name: party.name.clone().unwrap_or_default(),
        address: party.address.clone().unwrap_or_default(),
        contact_information: party.contact_information.clone().unwrap_or_default(),
        tax_id: party.tax_id.clone().unwrap_or_default(),
        email: party.email.clone().unwrap_or_default(),
        phone: party.phone.clone().unwrap_or_default(),
    }
}

fn map_item(index: usize, item: &ItemExtraction) -> Result<InvoiceItem, MappingError> {
    let missing = |field: &str| MappingError::InvalidItem {
        index,
        message: format!("{} is missing", field),
    };
    let overflow = || MappingError::Overflow(format!("item {} amounts", index));

    let quantity = item.quantity.ok_or_else(|| missing("quantity"))?;
    let unit_price = item.unit_price.ok_or_else(|| missing("unit_price"))?;
    let discount_percentage = item.discount_percentage.unwrap_or_default();
    let tax_rate = item.tax_rate.unwrap_or_default();

    let gross = quantity.checked_mul(unit_price).ok_or_else(overflow)?;
    let hundred = Decimal::ONE_HUNDRED;

    let discount_amount = match item.discount_amount {
        Some(amount) => amount,
        None => gross
            .checked_mul(discount_percentage)
            .and_then(|v| v.checked_div(hundred))
            .ok_or_else(overflow)?,
    };

    let net = gross.checked_sub(discount_amount).ok_or_else(overflow)?;

    let tax_amount = match item.tax_amount {
        Some(amount) => amount,
        None => net
            .checked_mul(tax_rate)
            .and_then(|v| v.checked_div(hundred))
            .ok_or_else(overflow)?,
    };

    Ok(InvoiceItem {
        item_description: item.description.clone().unwrap_or_default(),
        item_code: item.code.clone(),
        quantity,
        unit_price,
        discount_percentage,
        discount_amount,
        tax_rate,
        tax_amount,
        line_total: item.line_total.unwrap_or(net),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dec(text: &str) -> Decimal {
        Decimal::from_str_exact(text).unwrap()
    }

    fn sample() -> Value {
        json!({
            "invoice_info": {
                "invoice_number": "INV-2024-001",
                "invoice_date": "2024-01-15",
                "due_date": "2024-02-14",
                "invoice_type": null,
                "po_number": "PO-77"
            },
            "seller": {"name": "Acme Corp", "address": "1 Main St", "tax_id": "TX-1",
                       "email": "billing@acme.com", "phone": null},
            "buyer": {"name": "Globex", "address": null, "tax_id": null, "email": null, "phone": null},
            "items": [
                {"description": "Widget", "code": "W-1", "quantity": 2, "unit_price": 10.00,
                 "discount_percentage": 10, "tax_rate": 20, "line_total": null}
            ],
            "summary": {"subtotal": 18.00, "total_discount": 2.00, "total_tax": 3.60,
                        "shipping_cost": null, "total_amount_due": 21.60},
            "payment": {"terms": "Net 30", "method": "Wire", "bank_details": null},
            "additional": {"notes": "Thanks", "terms_and_conditions": null},
            "confidence_scores": {"overall": 92, "invoice_number": 95, "amounts": 90, "dates": 88}
        })
    }

    #[test]
    fn test_map_complete_extraction() {
        let invoice = map_extraction_value(&sample()).unwrap();

        assert_eq!(invoice.invoice_number, "INV-2024-001");
        assert_eq!(invoice.invoice_date, NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(invoice.due_date, NaiveDate::from_ymd_opt(2024, 2, 14));
        assert_eq!(invoice.invoice_type, DEFAULT_INVOICE_TYPE);
        assert_eq!(invoice.seller.name, "Acme Corp");
        assert_eq!(invoice.buyer.email, "");
        assert_eq!(invoice.payment_terms.as_deref(), Some("Net 30"));
        assert_eq!(invoice.po_number.as_deref(), Some("PO-77"));
        assert_eq!(invoice.notes.as_deref(), Some("Thanks"));
        assert_eq!(invoice.ocr_confidence, 92.0);
        assert_eq!(invoice.summary.shipping_cost, Decimal::ZERO);
    }

    #[test]
    fn test_item_amounts_are_derived_exactly() {
        let invoice = map_extraction_value(&sample()).unwrap();
        let item = &invoice.items[0];

        assert_eq!(item.discount_amount, dec("2"));
        assert_eq!(item.tax_amount, dec("3.6"));
        assert_eq!(item.line_total, dec("18"));
    }

    #[test]
    fn test_missing_invoice_number() {
        let mut raw = sample();
        raw["invoice_info"]["invoice_number"] = Value::Null;

        let err = map_extraction_value(&raw).unwrap_err();
        assert_eq!(err, MappingError::MissingField("invoice_number".to_string()));
    }

    #[test]
    fn test_invalid_date() {
        let mut raw = sample();
        raw["invoice_info"]["invoice_date"] = json!("15/01/2024");

        let err = map_extraction_value(&raw).unwrap_err();
        assert!(matches!(err, MappingError::InvalidDate { ref field, .. } if field == "invoice_date"));
    }

    #[test]
    fn test_item_without_quantity() {
        let mut raw = sample();
        raw["items"][0]["quantity"] = Value::Null;

        let err = map_extraction_value(&raw).unwrap_err();
        assert_eq!(err.to_string(), "Item 1: quantity is missing");
    }

    #[test]
    fn test_non_object_payload_is_malformed() {
        let err = map_extraction_value(&json!("not an invoice")).unwrap_err();
        assert!(matches!(err, MappingError::Malformed(_)));
    }

    #[test]
    fn test_missing_parties_map_to_empty_records() {
        let mut raw = sample();
        raw["seller"] = Value::Null;

        let invoice = map_extraction_value(&raw).unwrap();
        assert_eq!(invoice.seller, Party::default());
    }
}
