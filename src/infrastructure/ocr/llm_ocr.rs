//! Invoice OCR through a vision-capable chat model

use std::io::ErrorKind;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::llm::{ContentPart, LlmResponseFormat};
use crate::domain::{InvoiceOcrService, LlmProvider, LlmRequest, Message, OcrError};
use crate::infrastructure::llm::{chat_with_metrics, strip_code_fences};

/// MIME type sent when the file extension says nothing useful
pub const DEFAULT_IMAGE_MIME: &str = "image/png";

const EXTRACTION_PROMPT: &str = r#"Analyze this invoice image and extract ALL information in a structured format.

Return a JSON object with the following structure:
{
    "invoice_info": {
        "invoice_number": "string",
        "invoice_date": "YYYY-MM-DD",
        "due_date": "YYYY-MM-DD",
        "invoice_type": "string (STANDARD/PROFORMA/CREDIT/DEBIT)",
        "po_number": "string or null"
    },
    "seller": {"name": "string", "address": "string", "tax_id": "string", "email": "string", "phone": "string"},
    "buyer": {"name": "string", "address": "string", "tax_id": "string", "email": "string", "phone": "string"},
    "items": [
        {
            "description": "string",
            "code": "string or null",
            "quantity": number,
            "unit_price": number,
            "discount_percentage": number,
            "tax_rate": number,
            "line_total": number
        }
    ],
    "summary": {
        "subtotal": number,
        "total_discount": number,
        "total_tax": number,
        "shipping_cost": number,
        "total_amount_due": number
    },
    "payment": {"terms": "string", "method": "string", "bank_details": "string or null"},
    "additional": {"notes": "string or null", "terms_and_conditions": "string or null"},
    "confidence_scores": {"overall": number (0-100), "invoice_number": number, "amounts": number, "dates": number}
}

IMPORTANT:
- Extract ALL visible text and data
- For missing fields, use null
- Ensure all amounts are numbers (remove currency symbols)
- Dates must be in YYYY-MM-DD format
- Include confidence scores for data accuracy
- If table has empty cells, mark them as null"#;

/// OCR service that sends the image to a chat model and parses its JSON reply
#[derive(Debug, Clone)]
pub struct LlmInvoiceOcr {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl LlmInvoiceOcr {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    async fn read_image(&self, image_path: &str) -> Result<ContentPart, OcrError> {
        let bytes = tokio::fs::read(image_path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => OcrError::ImageNotFound {
                path: image_path.to_string(),
            },
            _ => OcrError::Unreadable {
                path: image_path.to_string(),
                message: e.to_string(),
            },
        })?;

        let media_type = image_media_type(image_path);
        debug!(path = %image_path, bytes = bytes.len(), media_type = %media_type, "Image loaded");

        Ok(ContentPart::image_base64(STANDARD.encode(&bytes), media_type))
    }
}

/// MIME type guessed from the path, falling back to PNG for non-image extensions
pub fn image_media_type(path: &str) -> String {
    mime_guess::from_path(path)
        .first()
        .map(|mime| mime.essence_str().to_string())
        .filter(|essence| essence.starts_with("image/"))
        .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string())
}

/// Parse the model reply into a JSON object
pub fn parse_extraction_reply(reply: &str) -> Result<Value, OcrError> {
    let body = strip_code_fences(reply);

    match serde_json::from_str::<Value>(body) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(OcrError::malformed("expected a JSON object")),
        Err(e) => Err(OcrError::malformed(e.to_string())),
    }
}

#[async_trait]
impl InvoiceOcrService for LlmInvoiceOcr {
    async fn extract(&self, image_path: &str) -> Result<Value, OcrError> {
        let image = self.read_image(image_path).await?;

        let request = LlmRequest::builder()
            .message(Message::user_with_parts(vec![
                ContentPart::text(EXTRACTION_PROMPT),
                image,
            ]))
            .temperature(0.0)
            .response_format(LlmResponseFormat::JsonObject)
            .build();

        let response = chat_with_metrics(self.provider.as_ref(), "ocr", &self.model, request)
            .await
            .map_err(|e| OcrError::provider(e.to_string()))?;

        let reply = response
            .content()
            .ok_or_else(|| OcrError::malformed("empty reply"))?;
        let extraction = parse_extraction_reply(reply)?;

        info!(path = %image_path, model = %self.model, "Invoice extracted");
        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::MockLlmProvider;
    use std::io::Write;

    fn image_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        file.write_all(b"fake-jpeg").unwrap();
        file
    }

    #[tokio::test]
    async fn test_extract_sends_image_and_parses_fenced_json() {
        let provider = Arc::new(
            MockLlmProvider::new().with_reply("```json\n{\"invoice_info\": {\"invoice_number\": \"INV-1\"}}\n```"),
        );
        let ocr = LlmInvoiceOcr::new(provider.clone(), "gpt-4o");
        let file = image_file();

        let value = ocr.extract(file.path().to_str().unwrap()).await.unwrap();

        assert_eq!(value["invoice_info"]["invoice_number"], "INV-1");

        let (model, request) = &provider.requests()[0];
        assert_eq!(model, "gpt-4o");
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.response_format, Some(LlmResponseFormat::JsonObject));
        let parts = request.messages[0].content_parts();
        assert_eq!(
            parts[1].as_data_url().unwrap(),
            format!("data:image/jpeg;base64,{}", STANDARD.encode(b"fake-jpeg"))
        );
    }

    #[tokio::test]
    async fn test_missing_image_is_not_sent() {
        let provider = Arc::new(MockLlmProvider::new().with_reply("{}"));
        let ocr = LlmInvoiceOcr::new(provider.clone(), "gpt-4o");

        let err = ocr.extract("/no/such/invoice.png").await.unwrap_err();

        assert_eq!(
            err,
            OcrError::ImageNotFound {
                path: "/no/such/invoice.png".to_string()
            }
        );
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_provider_failure() {
        let provider = Arc::new(MockLlmProvider::new().with_error("HTTP 500"));
        let ocr = LlmInvoiceOcr::new(provider, "gpt-4o");
        let file = image_file();

        let err = ocr.extract(file.path().to_str().unwrap()).await.unwrap_err();

        assert!(matches!(err, OcrError::Provider(message) if message.contains("HTTP 500")));
    }

    #[test]
    fn test_parse_extraction_reply() {
        assert!(parse_extraction_reply("{\"a\": 1}").is_ok());
        assert!(matches!(
            parse_extraction_reply("[1, 2]"),
            Err(OcrError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_extraction_reply("I could not read this invoice."),
            Err(OcrError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_reply_with_preamble() {
        let reply = "Here is the extracted data:\n```json\n{\"invoice_number\": \"INV-7\"}\n```\nLet me know if you need more.";

        let parsed = parse_extraction_reply(reply).unwrap();

        assert_eq!(parsed["invoice_number"], "INV-7");
    }

    #[test]
    fn test_image_media_type() {
        assert_eq!(image_media_type("scan.JPG"), "image/jpeg");
        assert_eq!(image_media_type("scan.webp"), "image/webp");
        assert_eq!(image_media_type("scan.bin"), DEFAULT_IMAGE_MIME);
        assert_eq!(image_media_type("scan"), DEFAULT_IMAGE_MIME);
    }
}
