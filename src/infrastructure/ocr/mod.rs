//! OCR adapters

mod llm_ocr;

pub use llm_ocr::{image_media_type, parse_extraction_reply, LlmInvoiceOcr, DEFAULT_IMAGE_MIME};
