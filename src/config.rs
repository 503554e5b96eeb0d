use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 15;

const PAYSTACK_BASE_URL: &str = "https://api.paystack.co";
const FLUTTERWAVE_BASE_URL: &str = "https://api.flutterwave.com";

/// Application configuration with validation
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database pool connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// Minimum database pool connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// Run migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Deployment environment: "development", "staging" or "production"
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,

    /// Comma-separated list of allowed CORS origins; permissive in development
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Paystack secret key; signs webhooks and authorizes API calls
    #[validate(length(min = 1))]
    pub paystack_secret_key: String,

    /// Paystack API base URL (overridable for tests)
    #[serde(default = "default_paystack_base_url")]
    pub paystack_base_url: String,

    /// Flutterwave secret key for API calls
    #[validate(length(min = 1))]
    pub flutterwave_secret_key: String,

    /// Flutterwave webhook hash, compared against the verif-hash header
    #[validate(length(min = 1))]
    pub flutterwave_secret_hash: String,

    /// Flutterwave API base URL (overridable for tests)
    #[serde(default = "default_flutterwave_base_url")]
    pub flutterwave_base_url: String,

    /// Timeout for outbound payment-provider calls, in seconds
    #[serde(default = "default_provider_timeout_secs")]
    #[validate(range(min = 1, max = 120))]
    pub provider_timeout_secs: u64,

    /// ISO currency code charged for all transactions
    #[serde(default = "default_currency")]
    pub currency: String,

    /// URL the provider redirects the customer back to after payment
    #[serde(default)]
    pub payment_redirect_url: Option<String>,
}

fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_paystack_base_url() -> String {
    PAYSTACK_BASE_URL.to_string()
}
fn default_flutterwave_base_url() -> String {
    FLUTTERWAVE_BASE_URL.to_string()
}
fn default_provider_timeout_secs() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_SECS
}
fn default_currency() -> String {
    "NGN".to_string()
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Loads layered configuration: built-in defaults, then `config/default`
/// and `config/<env>` files, then `APP__*` environment variables.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    // Provider secrets have no defaults: they must come from config files or
    // the environment, so an unconfigured deployment fails loudly at boot.
    let builder = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("environment", DEFAULT_ENV)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    for key in [
        "paystack_secret_key",
        "flutterwave_secret_key",
        "flutterwave_secret_hash",
    ] {
        if config.get_string(key).is_err() {
            error!(
                "{} is not configured. Set APP__{} or add it to a config file.",
                key,
                key.to_uppercase()
            );
            return Err(AppConfigError::Load(ConfigError::NotFound(format!(
                "{} is required but not configured",
                key
            ))));
        }
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    Ok(app_config)
}

/// Initializes the global tracing subscriber. RUST_LOG takes precedence over
/// the configured level when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("storefront_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".to_string(),
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            auto_migrate: false,
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            cors_allowed_origins: None,
            paystack_secret_key: "sk_test_x".to_string(),
            paystack_base_url: default_paystack_base_url(),
            flutterwave_secret_key: "FLWSECK_TEST-x".to_string(),
            flutterwave_secret_hash: "hash".to_string(),
            flutterwave_base_url: default_flutterwave_base_url(),
            provider_timeout_secs: default_provider_timeout_secs(),
            currency: default_currency(),
            payment_redirect_url: None,
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn empty_provider_secret_fails_validation() {
        let mut cfg = base_config();
        cfg.paystack_secret_key = String::new();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_provider_timeout_fails_validation() {
        let mut cfg = base_config();
        cfg.provider_timeout_secs = 0;
        assert!(cfg.validate().is_err());
    }
}
