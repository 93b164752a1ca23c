//! Typed view of the JSON object returned by the invoice OCR service
//!
//! Every field may be `null` in the payload. Numbers may arrive as JSON numbers
//! or as strings with currency symbols and thousands separators; both decode to
//! exact decimals.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Full extraction payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceExtraction {
    #[serde(deserialize_with = "null_as_default")]
    pub invoice_info: InvoiceInfoExtraction,
    pub seller: Option<PartyExtraction>,
    pub buyer: Option<PartyExtraction>,
    #[serde(deserialize_with = "null_as_default")]
    pub items: Vec<ItemExtraction>,
    #[serde(deserialize_with = "null_as_default")]
    pub summary: SummaryExtraction,
    pub payment: Option<PaymentExtraction>,
    #[serde(deserialize_with = "null_as_default")]
    pub additional: AdditionalExtraction,
    #[serde(deserialize_with = "null_as_default")]
    pub confidence_scores: ConfidenceExtraction,
}

impl InvoiceExtraction {
    /// Decode an extraction from its JSON form
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceInfoExtraction {
    #[serde(deserialize_with = "lenient_string")]
    pub invoice_number: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub invoice_date: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub due_date: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub invoice_type: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub po_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyExtraction {
    #[serde(deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub address: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub contact_information: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub tax_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemExtraction {
    #[serde(deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub code: Option<String>,
    #[serde(deserialize_with = "lenient_decimal")]
    pub quantity: Option<Decimal>,
    #[serde(deserialize_with = "lenient_decimal")]
    pub unit_price: Option<Decimal>,
    #[serde(deserialize_with = "lenient_decimal")]
    pub discount_percentage: Option<Decimal>,
    #[serde(deserialize_with = "lenient_decimal")]
    pub discount_amount: Option<Decimal>,
    #[serde(deserialize_with = "lenient_decimal")]
    pub tax_rate: Option<Decimal>,
    #[serde(deserialize_with = "lenient_decimal")]
    pub tax_amount: Option<Decimal>,
    #[serde(deserialize_with = "lenient_decimal")]
    pub line_total: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryExtraction {
    #[serde(deserialize_with = "lenient_decimal")]
    pub subtotal: Option<Decimal>,
    #[serde(deserialize_with = "lenient_decimal")]
    pub total_discount: Option<Decimal>,
    #[serde(deserialize_with = "lenient_decimal")]
    pub total_tax: Option<Decimal>,
    #[serde(deserialize_with = "lenient_decimal")]
    pub shipping_cost: Option<Decimal>,
    #[serde(deserialize_with = "lenient_decimal")]
    pub total_amount_due: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentExtraction {
    #[serde(deserialize_with = "lenient_string")]
    pub terms: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub method: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub bank_details: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdditionalExtraction {
    #[serde(deserialize_with = "lenient_string")]
    pub notes: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub terms_and_conditions: Option<String>,
}

/// Per-field confidence reported by the OCR service, 0-100
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceExtraction {
    pub overall: Option<f64>,
    pub invoice_number: Option<f64>,
    pub amounts: Option<f64>,
    pub dates: Option<f64>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts strings and numbers; blank strings become `None`
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected a string, found {}",
            other
        ))),
    }
}

fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_decimal_value(&value).map_err(serde::de::Error::custom)
}

/// Convert a JSON scalar into an exact decimal
///
/// JSON numbers are parsed from their textual form so `10.1` stays `10.1`.
pub fn parse_decimal_value(value: &Value) -> Result<Option<Decimal>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => parse_decimal_str(&n.to_string()).map(Some),
        Value::String(s) => {
            // currency symbols and codes around the amount
            let amount: String = s
                .trim_matches(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+')))
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();

            if amount.is_empty() {
                return Ok(None);
            }

            let cleaned = strip_thousands_separators(&amount)?;
            parse_decimal_str(&cleaned).map(Some)
        }
        other => Err(format!("expected a number, found {}", other)),
    }
}

/// Remove `,` thousands separators; any other comma is rejected
///
/// `1,234.56` is accepted while `12,50` and `1.234,56` are ambiguous and fail.
fn strip_thousands_separators(amount: &str) -> Result<String, String> {
    if !amount.contains(',') {
        return Ok(amount.to_string());
    }

    let integer_end = amount
        .find(|c: char| matches!(c, '.' | 'e' | 'E'))
        .unwrap_or(amount.len());
    let (integer, fraction) = amount.split_at(integer_end);
    let digits = integer.trim_start_matches(['-', '+']);

    let mut groups = digits.split(',');
    let leading_ok = groups
        .next()
        .is_some_and(|g| (1..=3).contains(&g.len()) && g.chars().all(|c| c.is_ascii_digit()));
    let grouped = leading_ok
        && groups.all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()))
        && !fraction.contains(',');

    if !grouped {
        return Err(format!("ambiguous decimal separator in '{}'", amount));
    }

    Ok(amount.replace(',', ""))
}

fn parse_decimal_str(text: &str) -> Result<Decimal, String> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|e| format!("invalid decimal '{}': {}", text, e))
}
