//! Infrastructure layer - collaborator adapters and the workflow engine

pub mod llm;
pub mod logging;
pub mod observability;
pub mod ocr;
pub mod query;
pub mod storage;
pub mod workflow;
