//! Invoice domain - extraction shape, processed invoice, validation and storage

pub mod entity;
pub mod extraction;
pub mod mapping;
pub mod record;
pub mod repository;
pub mod validation;

pub use entity::{InvoiceItem, InvoiceSummary, Party, ProcessedInvoice, DEFAULT_INVOICE_TYPE};
pub use extraction::{InvoiceExtraction, parse_decimal_value};
pub use mapping::{map_extraction, map_extraction_value, MappingError};
pub use record::InvoiceRecord;
pub use repository::{
    BuyerTotal, InvoiceLookup, InvoiceRepository, InvoiceStatistics, QueryOutcome, RecentInvoice,
    StatusCount, STATISTICS_LIST_LIMIT,
};
pub use validation::{InvoiceValidator, ValidationFault, ValidationResult};

#[cfg(test)]
pub use repository::MockInvoiceRepository;
