use serde::Deserialize;

use crate::infrastructure::llm::LlmProviderConfig;
use crate::infrastructure::observability::MetricsConfig;
use crate::infrastructure::storage::PostgresConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub database: PostgresConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub workflow: WorkflowSettings,
    #[serde(default)]
    pub uploads: UploadConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Chat-model settings shared by the OCR adapter and the SQL agent
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(flatten)]
    pub provider: LlmProviderConfig,
    /// Vision-capable model used for extraction
    #[serde(default = "default_ocr_model")]
    pub ocr_model: String,
    /// Model used for SQL generation and answer summaries
    #[serde(default = "default_sql_model")]
    pub sql_model: String,
}

fn default_ocr_model() -> String {
    "gpt-4o".to_string()
}

fn default_sql_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Postgres,
    InMemory,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Apply pending schema migrations when the repository is created
    #[serde(default)]
    pub auto_migrate: bool,
}

/// What the persistence stage writes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceSource {
    /// The OCR extraction as returned by the service
    #[default]
    RawExtraction,
    /// The mapped and validated invoice
    ProcessedInvoice,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowSettings {
    #[serde(default)]
    pub persistence_source: PersistenceSource,
    #[serde(default = "default_max_transitions")]
    pub max_transitions: usize,
}

fn default_max_transitions() -> usize {
    crate::domain::workflow::DEFAULT_MAX_TRANSITIONS
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderConfig::default(),
            ocr_model: default_ocr_model(),
            sql_model: default_sql_model(),
        }
    }
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            persistence_source: PersistenceSource::default(),
            max_transitions: default_max_transitions(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: "uploads".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut app_config: Self = config.try_deserialize()?;
        app_config.apply_env_fallbacks(|key| std::env::var(key).ok());

        Ok(app_config)
    }

    /// Fill empty secrets from the conventional variables
    fn apply_env_fallbacks(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.database.url.is_empty() {
            if let Some(url) = lookup("DATABASE_URL") {
                self.database.url = url;
            }
        }

        if self.llm.provider.api_key.is_empty() {
            if let Some(key) = lookup("OPENAI_API_KEY") {
                self.llm.provider.api_key = key;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.server.port, 8000);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        assert_eq!(config.workflow.persistence_source, PersistenceSource::RawExtraction);
        assert_eq!(config.uploads.dir, "uploads");
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_env_fallbacks_fill_only_empty_values() {
        let mut config = AppConfig::default();
        config.llm.provider.api_key = "from-config".to_string();

        config.apply_env_fallbacks(|key| match key {
            "DATABASE_URL" => Some("postgres://localhost/invoices".to_string()),
            "OPENAI_API_KEY" => Some("from-env".to_string()),
            _ => None,
        });

        assert_eq!(config.database.url, "postgres://localhost/invoices");
        assert_eq!(config.llm.provider.api_key, "from-config");
    }

    #[test]
    fn test_deserialize_sections() {
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [storage]
                backend = "in_memory"

                [workflow]
                persistence_source = "processed_invoice"

                [llm]
                api_key = "sk-test"
                base_url = "http://localhost:11434"
                ocr_model = "llava"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.storage.backend, StorageBackend::InMemory);
        assert_eq!(config.workflow.persistence_source, PersistenceSource::ProcessedInvoice);
        assert_eq!(config.llm.provider.api_key, "sk-test");
        assert_eq!(config.llm.provider.base_url, "http://localhost:11434");
        assert_eq!(config.llm.ocr_model, "llava");
        assert_eq!(config.llm.sql_model, "gpt-4o-mini");
    }
}
