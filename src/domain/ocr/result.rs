use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::OcrError;

/// Extraction produced by the OCR stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    pub invoice_info: Map<String, Value>,
    pub table_info: Vec<Value>,
    pub total_info: Map<String, Value>,
    /// Field name to confidence, 0-100
    pub confidence_scores: BTreeMap<String, f64>,
    pub raw_text: String,
    /// Complete payload as returned by the service
    pub extraction: Value,
}

impl OcrResult {
    /// Split a service payload into its sections
    pub fn from_extraction(extraction: Value) -> Result<Self, OcrError> {
        let Value::Object(payload) = &extraction else {
            return Err(OcrError::malformed("extraction is not a JSON object"));
        };

        let object = |key: &str| match payload.get(key) {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };

        let table_info = match payload.get("items") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };

        let confidence_scores = object("confidence_scores")
            .into_iter()
            .filter_map(|(field, score)| score.as_f64().map(|s| (field, s)))
            .collect();

        Ok(Self {
            invoice_info: object("invoice_info"),
            table_info,
            total_info: object("summary"),
            confidence_scores,
            raw_text: extraction.to_string(),
            extraction,
        })
    }

    /// Overall confidence, 0 when the service did not report one
    pub fn overall_confidence(&self) -> f64 {
        self.confidence_scores.get("overall").copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_extraction() {
        let payload = json!({
            "invoice_info": {"invoice_number": "INV-1"},
            "items": [{"description": "Widget"}],
            "summary": {"total_amount_due": 10},
            "confidence_scores": {"overall": 92, "dates": null}
        });

        let result = OcrResult::from_extraction(payload.clone()).unwrap();

        assert_eq!(result.invoice_info["invoice_number"], json!("INV-1"));
        assert_eq!(result.table_info.len(), 1);
        assert_eq!(result.total_info["total_amount_due"], json!(10));
        assert_eq!(result.overall_confidence(), 92.0);
        assert!(!result.confidence_scores.contains_key("dates"));
        assert_eq!(result.extraction, payload);
        assert!(result.raw_text.contains("INV-1"));
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let result = OcrResult::from_extraction(json!({})).unwrap();

        assert!(result.invoice_info.is_empty());
        assert!(result.table_info.is_empty());
        assert_eq!(result.overall_confidence(), 0.0);
    }

    #[test]
    fn test_non_object_is_malformed() {
        let err = OcrResult::from_extraction(json!([1, 2])).unwrap_err();
        assert!(matches!(err, OcrError::MalformedResponse(_)));
    }
}
