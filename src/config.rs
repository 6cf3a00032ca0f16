use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

use crate::retry::RetryPolicy;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

const DEFAULT_DI_MODEL_ID: &str = "prebuilt-layout";
const DEFAULT_DI_API_VERSION: &str = "2024-11-30";
const DEFAULT_OPENAI_API_VERSION: &str = "2024-02-01";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
const DEFAULT_EXTRACTION_MAX_WAIT_SECS: u64 = 300;
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;
const DEFAULT_DATABASE_POOL_SIZE: usize = 8;
/// Character budget applied to text submitted for semantic analysis.
pub const DEFAULT_SEMANTIC_INPUT_CHAR_LIMIT: usize = 20_000;
/// Largest document accepted by the pipeline (50 MiB).
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 50 * 1024 * 1024;

/// Runtime configuration for the ingestion service.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the document-intelligence (layout extraction) service.
    pub di_endpoint: String,
    /// Subscription key for the document-intelligence service.
    pub di_key: String,
    /// Analysis model invoked for layout extraction.
    pub di_model_id: String,
    /// API version appended to document-intelligence requests.
    pub di_api_version: String,
    /// Base URL of the chat-completions service used for semantic analysis.
    pub openai_endpoint: String,
    /// API key for the chat-completions service.
    pub openai_key: String,
    /// Deployment (model) name used for chat completions.
    pub openai_deployment: String,
    /// API version appended to chat-completion requests.
    pub openai_api_version: String,
    /// Postgres connection string.
    pub database_url: String,
    /// Maximum number of pooled Postgres connections.
    pub database_pool_size: usize,
    /// Base URL that source names are appended to when recording provenance.
    pub source_base_url: String,
    /// Upper bound applied to every remote call.
    pub request_timeout_secs: u64,
    /// Delay between polls of a long-running layout analysis.
    pub extraction_poll_interval_ms: u64,
    /// Total time allowed for a single layout analysis to complete.
    pub extraction_max_wait_secs: u64,
    /// Attempts made for transient failures before giving up.
    pub retry_max_attempts: u32,
    /// Base delay for exponential backoff between attempts.
    pub retry_base_delay_ms: u64,
    /// Character cap applied to text before semantic analysis.
    pub semantic_input_char_limit: usize,
    /// Largest accepted input document in bytes.
    pub max_document_bytes: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            di_endpoint: load_env("DI_ENDPOINT")?,
            di_key: load_env("DI_KEY")?,
            di_model_id: load_env_optional("DI_MODEL_ID")
                .unwrap_or_else(|| DEFAULT_DI_MODEL_ID.to_string()),
            di_api_version: load_env_optional("DI_API_VERSION")
                .unwrap_or_else(|| DEFAULT_DI_API_VERSION.to_string()),
            openai_endpoint: load_env("OPENAI_ENDPOINT")?,
            openai_key: load_env("OPENAI_KEY")?,
            openai_deployment: load_env("OPENAI_DEPLOYMENT")?,
            openai_api_version: load_env_optional("OPENAI_API_VERSION")
                .unwrap_or_else(|| DEFAULT_OPENAI_API_VERSION.to_string()),
            database_url: load_env("DATABASE_URL")?,
            database_pool_size: parse_env_or("DATABASE_POOL_SIZE", DEFAULT_DATABASE_POOL_SIZE)?,
            source_base_url: load_env("SOURCE_BASE_URL")?,
            request_timeout_secs: parse_env_or("REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            extraction_poll_interval_ms: parse_env_or(
                "EXTRACTION_POLL_INTERVAL_MS",
                DEFAULT_POLL_INTERVAL_MS,
            )?,
            extraction_max_wait_secs: parse_env_or(
                "EXTRACTION_MAX_WAIT_SECS",
                DEFAULT_EXTRACTION_MAX_WAIT_SECS,
            )?,
            retry_max_attempts: parse_env_or("RETRY_MAX_ATTEMPTS", DEFAULT_RETRY_MAX_ATTEMPTS)?,
            retry_base_delay_ms: parse_env_or("RETRY_BASE_DELAY_MS", DEFAULT_RETRY_BASE_DELAY_MS)?,
            semantic_input_char_limit: parse_env_or(
                "SEMANTIC_INPUT_CHAR_LIMIT",
                DEFAULT_SEMANTIC_INPUT_CHAR_LIMIT,
            )?,
            max_document_bytes: parse_env_or("MAX_DOCUMENT_BYTES", DEFAULT_MAX_DOCUMENT_BYTES)?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }

    /// Timeout applied to each individual remote call.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Backoff policy shared by the remote adapters and the persistence stage.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
        .map(|value| value.unwrap_or(default))
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        di_endpoint = %config.di_endpoint,
        di_model = %config.di_model_id,
        openai_endpoint = %config.openai_endpoint,
        deployment = %config.openai_deployment,
        source_base_url = %config.source_base_url,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
