//! Storage infrastructure - invoice repository implementations

mod factory;
mod in_memory;
pub mod migrations;
mod postgres;

pub use factory::InvoiceRepositoryFactory;
pub use in_memory::InMemoryInvoiceRepository;
pub use migrations::{
    invoice_migrations, run_invoice_migrations, Migration, PostgresMigrator, INVOICE_TABLES,
};
pub use postgres::{connect_pool, PostgresConfig, PostgresInvoiceRepository};
