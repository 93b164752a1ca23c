//! Layered application configuration

mod app_config;

pub use app_config::{
    AppConfig, LlmConfig, LogFormat, LoggingConfig, PersistenceSource, ServerConfig,
    StorageBackend, StorageConfig, UploadConfig, WorkflowSettings,
};
