use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CURRENCY: &str = "EUR";
const DEFAULT_SQUARE_API_VERSION: &str = "2024-10-17";
const SQUARE_SANDBOX_BASE_URL: &str = "https://connect.squareupsandbox.com";
const SQUARE_PRODUCTION_BASE_URL: &str = "https://connect.squareup.com";

/// Which payment gateway implementation to build at startup
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GatewayProvider {
    Square,
    InMemory,
}

/// Gateway account environment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayEnvironment {
    Sandbox,
    Production,
}

/// Payment gateway configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PaymentGatewayConfig {
    #[serde(default = "default_gateway_provider")]
    pub provider: GatewayProvider,

    #[serde(default = "default_gateway_environment")]
    pub environment: GatewayEnvironment,

    /// Square access token
    #[serde(default)]
    pub access_token: Option<String>,

    /// Square location the payment links are created for
    #[serde(default)]
    pub location_id: Option<String>,

    /// ISO 4217 currency used for every order
    #[validate(length(equal = 3))]
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Value sent in the Square-Version header
    #[serde(default = "default_square_api_version")]
    pub api_version: String,

    /// Overrides the base URL derived from `environment` (used by tests)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Upper bound for a single gateway call
    #[validate(range(min = 1, max = 120))]
    #[serde(default = "default_gateway_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Attempts per checkout, including the first call
    #[validate(range(min = 1, max = 10))]
    #[serde(default = "default_gateway_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_gateway_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_gateway_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for PaymentGatewayConfig {
    fn default() -> Self {
        Self {
            provider: default_gateway_provider(),
            environment: default_gateway_environment(),
            access_token: None,
            location_id: None,
            currency: default_currency(),
            api_version: default_square_api_version(),
            base_url: None,
            request_timeout_secs: default_gateway_timeout_secs(),
            max_attempts: default_gateway_max_attempts(),
            initial_backoff_ms: default_gateway_initial_backoff_ms(),
            max_backoff_ms: default_gateway_max_backoff_ms(),
        }
    }
}

impl PaymentGatewayConfig {
    /// Resolves the API base URL once, from the override or the account environment.
    pub fn base_url(&self) -> &str {
        match (&self.base_url, self.environment) {
            (Some(url), _) => url.trim_end_matches('/'),
            (None, GatewayEnvironment::Sandbox) => SQUARE_SANDBOX_BASE_URL,
            (None, GatewayEnvironment::Production) => SQUARE_PRODUCTION_BASE_URL,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Location id sent with every payment link; the in-memory gateway has none.
    pub fn location(&self) -> String {
        self.location_id.clone().unwrap_or_else(|| "local".to_string())
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[validate(length(min = 1))]
    pub environment: String,

    /// Logging level
    #[validate(custom = "validate_log_level")]
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// CORS: allow credentials
    #[serde(default)]
    pub cors_allow_credentials: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB pool: connect timeout (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    /// DB pool: idle timeout (seconds)
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,

    /// DB pool: acquire timeout (seconds)
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Public URL of the storefront; the gateway redirects customers back here
    #[validate(url)]
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Maximum number of cart lines accepted in one checkout
    #[validate(range(min = 1, max = 500))]
    #[serde(default = "default_max_cart_lines")]
    pub max_cart_lines: usize,

    /// Payment gateway settings
    #[validate]
    #[serde(default)]
    pub payment_gateway: PaymentGatewayConfig,
}

impl AppConfig {
    /// Gets database URL reference
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Creates a new configuration
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            cors_allow_credentials: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            public_base_url: default_public_base_url(),
            max_cart_lines: default_max_cart_lines(),
            payment_gateway: PaymentGatewayConfig::default(),
        }
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        let gateway = &self.payment_gateway;
        match gateway.provider {
            GatewayProvider::Square => {
                let missing = |value: &Option<String>| {
                    value.as_deref().map(str::trim).unwrap_or("").is_empty()
                };
                if missing(&gateway.access_token) {
                    let mut err = ValidationError::new("gateway_access_token_required");
                    err.message =
                        Some("Set APP__PAYMENT_GATEWAY__ACCESS_TOKEN for the square provider".into());
                    errors.add("payment_gateway", err);
                }
                if missing(&gateway.location_id) {
                    let mut err = ValidationError::new("gateway_location_id_required");
                    err.message =
                        Some("Set APP__PAYMENT_GATEWAY__LOCATION_ID for the square provider".into());
                    errors.add("payment_gateway", err);
                }
            }
            GatewayProvider::InMemory if self.is_production() => {
                let mut err = ValidationError::new("gateway_in_memory_in_production");
                err.message =
                    Some("The in-memory payment gateway cannot be used in production".into());
                errors.add("payment_gateway", err);
            }
            GatewayProvider::InMemory => {}
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_public_base_url() -> String {
    format!("http://localhost:{}", DEFAULT_PORT)
}

fn default_max_cart_lines() -> usize {
    50
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_square_api_version() -> String {
    DEFAULT_SQUARE_API_VERSION.to_string()
}

fn default_gateway_provider() -> GatewayProvider {
    GatewayProvider::InMemory
}

fn default_gateway_environment() -> GatewayEnvironment {
    GatewayEnvironment::Sandbox
}

fn default_gateway_timeout_secs() -> u64 {
    10
}

fn default_gateway_max_attempts() -> u32 {
    3
}

fn default_gateway_initial_backoff_ms() -> u64 {
    200
}

fn default_gateway_max_backoff_ms() -> u64 {
    2_000
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("takeaway_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::new(filter_directive);
    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Same as [`load_config`] with an explicit configuration directory.
pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://takeaway.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(&run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
