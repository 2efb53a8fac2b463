//! Gerai configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `GERAI_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `SHIPPING_API_KEY` - Carrier rate API key
//! - `SHIPPING_ORIGIN_ID` - Origin destination id used for every cost calculation
//! - `PAYMENT_API_KEY` - Payment gateway API key (basic-auth username)
//!
//! ## Optional
//! - `GERAI_HOST` - Bind address (default: 127.0.0.1)
//! - `GERAI_PORT` - Listen port (default: 3000)
//! - `SHIPPING_BASE_URL` - Carrier rate API base URL (default: RajaOngkir v1)
//! - `SHIPPING_COURIERS` - Courier set passed to cost calculation (default: jne:pos)
//! - `PAYMENT_BASE_URL` - Payment gateway base URL (default: Xendit)
//! - `PAYMENT_GRACE_PERIOD_SECS` - Delay before an unpaid order is reconciled (default: 86400)
//! - `PAYMENT_CHECK_POLL_SECS` - Consumer poll interval (default: 5)
//! - `PAYMENT_CHECK_VISIBILITY_SECS` - Claimed-message visibility timeout (default: 60)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Gerai application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Carrier rate API configuration
    pub shipping: ShippingConfig,
    /// Payment gateway configuration
    pub payments: PaymentConfig,
    /// Delayed payment-check queue configuration
    pub queue: QueueConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Carrier rate API configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct ShippingConfig {
    /// API base URL (e.g. `https://rajaongkir.komerce.id/api/v1`)
    pub base_url: String,
    /// API key sent as the `key` header
    pub api_key: SecretString,
    /// Origin destination id for all shipments
    pub origin_id: String,
    /// Courier set for cost calculation (e.g. `jne:pos`)
    pub couriers: String,
}

impl std::fmt::Debug for ShippingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShippingConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("origin_id", &self.origin_id)
            .field("couriers", &self.couriers)
            .finish()
    }
}

/// Payment gateway configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct PaymentConfig {
    /// Gateway base URL (e.g. `https://api.xendit.co`)
    pub base_url: String,
    /// API key used as the basic-auth username (empty password)
    pub api_key: SecretString,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Delayed payment-check queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// How long an order may stay `Pending` before its stock is reconciled.
    pub payment_grace_period: Duration,
    /// How often the consumer polls for due messages when the queue is idle.
    pub poll_interval: Duration,
    /// How long a claimed message stays invisible to other consumers.
    pub visibility_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            payment_grace_period: Duration::from_secs(86_400),
            poll_interval: Duration::from_secs(5),
            visibility_timeout: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail placeholder validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("GERAI_DATABASE_URL")?;
        let host = get_env_or_default("GERAI_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("GERAI_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("GERAI_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("GERAI_PORT".to_string(), e.to_string()))?;

        let shipping = ShippingConfig::from_env()?;
        let payments = PaymentConfig::from_env()?;
        let queue = QueueConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");

        Ok(Self {
            database_url,
            host,
            port,
            shipping,
            payments,
            queue,
            sentry_dsn,
            sentry_environment,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl ShippingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: get_env_or_default("SHIPPING_BASE_URL", "https://rajaongkir.komerce.id/api/v1"),
            api_key: get_validated_secret("SHIPPING_API_KEY")?,
            origin_id: get_required_env("SHIPPING_ORIGIN_ID")?,
            couriers: get_env_or_default("SHIPPING_COURIERS", "jne:pos"),
        })
    }
}

impl PaymentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: get_env_or_default("PAYMENT_BASE_URL", "https://api.xendit.co"),
            api_key: get_validated_secret("PAYMENT_API_KEY")?,
        })
    }
}

impl QueueConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            payment_grace_period: get_duration_secs(
                "PAYMENT_GRACE_PERIOD_SECS",
                defaults.payment_grace_period,
            )?,
            poll_interval: get_duration_secs("PAYMENT_CHECK_POLL_SECS", defaults.poll_interval)?,
            visibility_timeout: get_duration_secs(
                "PAYMENT_CHECK_VISIBILITY_SECS",
                defaults.visibility_timeout,
            )?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a duration in whole seconds, with a default.
fn get_duration_secs(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Validate that a secret is not an obvious placeholder.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_changeme() {
        assert!(validate_secret_strength("changeme123", "TEST_VAR").is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("xnd_development_Zk8qlT2VbW", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_queue_config_defaults() {
        let queue = QueueConfig::default();
        assert_eq!(queue.payment_grace_period, Duration::from_secs(86_400));
        assert_eq!(queue.poll_interval, Duration::from_secs(5));
        assert_eq!(queue.visibility_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_socket_addr() {
        let config = Config {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            shipping: ShippingConfig {
                base_url: "https://rates.test/api/v1".to_string(),
                api_key: SecretString::from("k"),
                origin_id: "501".to_string(),
                couriers: "jne:pos".to_string(),
            },
            payments: PaymentConfig {
                base_url: "https://gateway.test".to_string(),
                api_key: SecretString::from("k"),
            },
            queue: QueueConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_shipping_config_debug_redacts_api_key() {
        let config = ShippingConfig {
            base_url: "https://rates.test/api/v1".to_string(),
            api_key: SecretString::from("super_secret_key"),
            origin_id: "501".to_string(),
            couriers: "jne:pos".to_string(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_key"));
    }
}
