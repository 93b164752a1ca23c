//! Repository factory for runtime backend selection

use std::sync::Arc;

use tracing::info;

use crate::config::{StorageBackend, StorageConfig};
use crate::domain::invoice::InvoiceRepository;
use crate::domain::DomainError;

use super::in_memory::InMemoryInvoiceRepository;
use super::migrations::run_invoice_migrations;
use super::postgres::{PostgresConfig, PostgresInvoiceRepository};

/// Factory for creating invoice repositories
#[derive(Debug)]
pub struct InvoiceRepositoryFactory;

impl InvoiceRepositoryFactory {
    /// Creates the repository selected by the storage configuration
    pub async fn create(
        storage: &StorageConfig,
        database: &PostgresConfig,
    ) -> Result<Arc<dyn InvoiceRepository>, DomainError> {
        match storage.backend {
            StorageBackend::InMemory => {
                info!("Using in-memory invoice storage");
                Ok(Self::create_in_memory())
            }
            StorageBackend::Postgres => {
                let repository = Self::create_postgres(database, storage.auto_migrate).await?;
                Ok(repository)
            }
        }
    }

    pub fn create_in_memory() -> Arc<InMemoryInvoiceRepository> {
        Arc::new(InMemoryInvoiceRepository::new())
    }

    pub async fn create_postgres(
        config: &PostgresConfig,
        migrate: bool,
    ) -> Result<Arc<PostgresInvoiceRepository>, DomainError> {
        let repository = PostgresInvoiceRepository::connect(config).await?;

        if migrate {
            let applied = run_invoice_migrations(repository.pool()).await?;
            info!(applied, "Invoice schema migrations checked");
        }

        info!(max_connections = config.max_connections, "Connected to PostgreSQL");
        Ok(Arc::new(repository))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_in_memory_backend() {
        let storage = StorageConfig {
            backend: StorageBackend::InMemory,
            auto_migrate: false,
        };

        let repository = InvoiceRepositoryFactory::create(&storage, &PostgresConfig::default())
            .await
            .unwrap();

        assert!(repository.health_check().await);
    }

    #[tokio::test]
    async fn test_postgres_backend_requires_url() {
        let storage = StorageConfig::default();

        let err = InvoiceRepositoryFactory::create(&storage, &PostgresConfig::default())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Database URL is not set"));
    }
}
