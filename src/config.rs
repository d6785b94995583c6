use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CATALOG_PAGE_SIZE: u64 = 9;
const DEFAULT_MAX_PAGE_SIZE: u64 = 100;
const DEFAULT_ACTIVATION_TTL_SECS: u64 = 3 * 24 * 60 * 60;
const DEFAULT_MAX_AVATAR_BYTES: usize = 4 * 1024 * 1024;
const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

/// Application configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret key, also keys account activation tokens
    #[validate(length(min = 64), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    /// JWT expiration time in seconds
    #[validate(range(min = 300, max = 86400))]
    pub jwt_expiration: usize,

    /// Refresh token expiration in seconds
    #[validate(range(min = 3600, max = 2592000))]
    pub refresh_token_expiration: usize,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback outside development
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

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Request timeout for the HTTP layer (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Items per catalog page
    #[serde(default = "default_catalog_page_size")]
    #[validate(range(min = 1, max = 100))]
    pub catalog_page_size: u64,

    /// Upper bound for client supplied page sizes
    #[serde(default = "default_api_max_page_size")]
    #[validate(range(min = 1, max = 1000))]
    pub api_max_page_size: u64,

    /// Scheme and domain used to build links in outgoing email
    #[serde(default = "default_public_base_url")]
    #[validate(url)]
    pub public_base_url: String,

    /// Lifetime of account activation tokens (seconds)
    #[serde(default = "default_activation_token_ttl_secs")]
    #[validate(range(min = 60))]
    pub activation_token_ttl_secs: u64,

    /// Sender address for outgoing mail
    #[serde(default = "default_mail_from")]
    #[validate(email)]
    pub mail_from: String,

    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// Directory uploaded media is written to
    #[serde(default = "default_media_root")]
    pub media_root: String,

    /// URL prefix media is served under
    #[serde(default = "default_media_url")]
    pub media_url: String,

    /// Maximum decoded avatar size in bytes
    #[serde(default = "default_max_avatar_bytes")]
    pub max_avatar_bytes: usize,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    #[validate(range(min = 1))]
    pub event_channel_capacity: usize,
}

impl AppConfig {
    /// Creates a new configuration with defaults for everything not passed in
    pub fn new(
        database_url: String,
        jwt_secret: String,
        jwt_expiration: usize,
        refresh_token_expiration: usize,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            refresh_token_expiration,
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
            request_timeout_secs: default_request_timeout_secs(),
            catalog_page_size: default_catalog_page_size(),
            api_max_page_size: default_api_max_page_size(),
            public_base_url: default_public_base_url(),
            activation_token_ttl_secs: default_activation_token_ttl_secs(),
            mail_from: default_mail_from(),
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            media_root: default_media_root(),
            media_url: default_media_url(),
            max_avatar_bytes: default_max_avatar_bytes(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Configured CORS origins, blanks dropped
    pub fn cors_origins(&self) -> impl Iterator<Item = &str> {
        self.cors_allowed_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    /// Public base URL without a trailing slash; activation links start with it
    pub fn public_base_url(&self) -> &str {
        self.public_base_url.trim_end_matches('/')
    }

    /// Cross-field checks the derive cannot express.
    pub fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let has_origins = self.cors_origins().next().is_some();

        if !self.should_allow_permissive_cors() && !has_origins {
            reject(
                &mut errors,
                "cors_allowed_origins",
                "Set APP__CORS_ALLOWED_ORIGINS outside development or opt in with APP__CORS_ALLOW_ANY_ORIGIN=true",
            );
        }
        if self.cors_allow_credentials && self.should_allow_permissive_cors() && !has_origins {
            reject(
                &mut errors,
                "cors_allow_credentials",
                "CORS credentials cannot be combined with a wildcard origin",
            );
        }
        if !self.is_development() && self.jwt_secret.trim() == DEV_DEFAULT_JWT_SECRET {
            reject(
                &mut errors,
                "jwt_secret",
                "The bundled development secret signs tokens and activation links; set APP__JWT_SECRET",
            );
        }
        if self.is_production() && self.public_base_url.starts_with("http://localhost") {
            reject(
                &mut errors,
                "public_base_url",
                "Activation links would point at localhost; set APP__PUBLIC_BASE_URL",
            );
        }
        let media_url = self.media_url.trim_end_matches('/');
        if !media_url.starts_with('/') || media_url.len() < 2 {
            reject(
                &mut errors,
                "media_url",
                "media_url must be an absolute path such as /media",
            );
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

fn reject(errors: &mut ValidationErrors, field: &'static str, message: &'static str) {
    let mut err = ValidationError::new(field);
    err.message = Some(message.into());
    errors.add(field, err);
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    2
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
fn default_request_timeout_secs() -> u64 {
    30
}

fn default_catalog_page_size() -> u64 {
    DEFAULT_CATALOG_PAGE_SIZE
}
fn default_api_max_page_size() -> u64 {
    DEFAULT_MAX_PAGE_SIZE
}

fn default_public_base_url() -> String {
    format!("http://localhost:{}", DEFAULT_PORT)
}

fn default_activation_token_ttl_secs() -> u64 {
    DEFAULT_ACTIVATION_TTL_SECS
}

fn default_mail_from() -> String {
    "no-reply@storefront.local".to_string()
}
fn default_smtp_host() -> String {
    DEFAULT_SMTP_HOST.to_string()
}
fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

fn default_media_root() -> String {
    "media".to_string()
}
fn default_media_url() -> String {
    "/media".to_string()
}
fn default_max_avatar_bytes() -> usize {
    DEFAULT_MAX_AVATAR_BYTES
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    const PLACEHOLDERS: [&str; 3] = [
        "CHANGE_THIS_SECRET_IN_PRODUCTION",
        "your-secret-key",
        "default-secret-key",
    ];
    let trimmed = secret.trim();
    let distinct = trimmed.chars().collect::<std::collections::HashSet<_>>().len();

    let problem = if trimmed.len() < 64 {
        Some("JWT secret must be at least 64 characters")
    } else if PLACEHOLDERS.iter().any(|p| trimmed.eq_ignore_ascii_case(p)) {
        Some("JWT secret must be overridden with a random value")
    } else if distinct < 10 {
        Some("JWT secret needs at least 10 distinct characters")
    } else {
        None
    };

    match problem {
        Some(message) => {
            let mut err = ValidationError::new("jwt_secret");
            err.message = Some(message.into());
            Err(err)
        }
        None => Ok(()),
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over the configured level;
/// request spans from `tower_http` are kept at debug.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("storefront_api={level},tower_http=debug")));

    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Loads settings from built-in defaults, `config/default.toml`,
/// `config/{RUN_ENV}.toml` and `APP__*` variables, later sources winning.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    if !Path::new(CONFIG_DIR).exists() {
        info!(dir = CONFIG_DIR, "no config directory, using defaults and APP__* variables");
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("jwt_expiration", 3600)?
        .set_default("refresh_token_expiration", 604800)?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", run_env.as_str())?
        .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
        .add_source(File::with_name(&format!("{CONFIG_DIR}/{run_env}")).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // No default: it signs tokens and activation links.
    if config.get_string("jwt_secret").is_err() {
        error!("APP__JWT_SECRET is not set");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret (set APP__JWT_SECRET, at least 64 characters)".into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;
    if let Err(e) = app_config
        .validate()
        .and_then(|_| app_config.validate_additional_constraints())
    {
        error!(errors = ?e, "invalid configuration");
        return Err(AppConfigError::Validation(e));
    }

    info!(environment = %app_config.environment, "configuration loaded");
    Ok(app_config)
}

#[cfg(test)]
mod cors_validation_tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "k3Jq9vX2mP8rT5wY1zB4nC7dF0gH6jL9qS2uV5xA8eD1iK4oN7rU0tW3yZ6bE9hM".into(),
            3600,
            86_400,
            "127.0.0.1".into(),
            8080,
            "production".into(),
        )
    }

    #[test]
    fn non_dev_requires_cors_origins() {
        let mut cfg = base_config();
        cfg.public_base_url = "https://shop.example.com".into();
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn non_dev_with_origins_passes() {
        let mut cfg = base_config();
        cfg.public_base_url = "https://shop.example.com".into();
        cfg.cors_allowed_origins = Some("https://example.com".into());
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn credentials_with_wildcard_rejected() {
        let mut cfg = base_config();
        cfg.environment = "development".into();
        cfg.cors_allow_credentials = true;
        let errors = cfg.validate_additional_constraints().unwrap_err();
        assert!(errors.field_errors().contains_key("cors_allow_credentials"));
    }

    #[test]
    fn production_rejects_localhost_links() {
        let mut cfg = base_config();
        cfg.cors_allowed_origins = Some("https://example.com".into());
        let errors = cfg.validate_additional_constraints().unwrap_err();
        assert!(errors.field_errors().contains_key("public_base_url"));
    }

    #[test]
    fn development_allows_permissive_by_default() {
        let mut cfg = base_config();
        cfg.environment = "development".into();
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn defaults_match_storefront_settings() {
        let cfg = base_config();
        assert_eq!(cfg.catalog_page_size, 9);
        assert_eq!(cfg.max_avatar_bytes, 4 * 1024 * 1024);
        assert_eq!(cfg.smtp_port, 587);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn weak_jwt_secret_rejected() {
        assert!(validate_jwt_secret(&"a".repeat(64)).is_err());
        assert!(validate_jwt_secret("short").is_err());
    }

    #[test]
    fn public_base_url_strips_trailing_slash() {
        let mut cfg = base_config();
        cfg.public_base_url = "https://shop.example.com/".into();
        assert_eq!(cfg.public_base_url(), "https://shop.example.com");
    }
}
