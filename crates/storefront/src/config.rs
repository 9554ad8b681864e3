//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `PAYPAL_CLIENT_ID` - PayPal REST app client ID
//! - `PAYPAL_CLIENT_SECRET` - PayPal REST app secret (high entropy)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `ORDER_API_BASE_URL` - Order API root (default: <http://localhost:5000>)
//! - `ORDER_API_TOKEN` - Bearer token for the order API
//! - `ORDER_API_TIMEOUT_SECS` - Order API request timeout (default: 15)
//! - `PAYPAL_API_BASE` - PayPal API root (default: sandbox)
//! - `PAYPAL_BRAND_NAME` - Brand shown on PayPal pages (default: QUQU LONDON)
//! - `CHECKOUT_REGION` - `uk` or `international` (default: uk)
//! - `CHECKOUT_CURRENCY` - ISO currency code (default: GBP)
//! - `EXPRESS_DELIVERY_SURCHARGE` - Express delivery charge (default: 4.99)
//! - `CART_PERSIST_DEBOUNCE_MS` - Quiet period before a cart is written (default: 300)
//! - `CART_STORAGE_DIR` - Directory for persisted carts (default: data/carts)
//! - `SESSION_IDLE_MINUTES` - Idle time before a shopper session is evicted (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.1)

use std::collections::HashMap;
use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::checkout::{CheckoutRegion, CheckoutSettings};

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_PAYPAL_API_BASE: &str = "https://api-m.sandbox.paypal.com";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
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

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: Url,
    /// Order API client configuration
    pub order_api: OrderApiConfig,
    /// PayPal client configuration
    pub paypal: PayPalConfig,
    /// Checkout region, currency and charges
    pub checkout: CheckoutSettings,
    /// Cart persistence
    pub cart: CartConfig,
    /// Idle time before an in-memory shopper session is evicted
    pub session_idle: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (production, staging)
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of requests traced
    pub sentry_traces_sample_rate: f32,
}

/// Order API configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct OrderApiConfig {
    /// Root URL; `/api/orders` is appended
    pub base_url: Url,
    /// Bearer token attached to every request
    pub token: Option<SecretString>,
    /// Whole-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for OrderApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// PayPal REST API configuration.
///
/// Implements `Debug` manually to redact the secret.
#[derive(Clone)]
pub struct PayPalConfig {
    /// REST app client ID
    pub client_id: String,
    /// REST app secret
    pub client_secret: SecretString,
    /// API root (sandbox or live)
    pub api_base: Url,
}

impl std::fmt::Debug for PayPalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayPalConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("api_base", &self.api_base.as_str())
            .finish()
    }
}

/// Cart persistence configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Quiet period before a changed cart is written
    pub debounce: Duration,
    /// Directory carts are stored under
    pub storage_dir: PathBuf,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env_or_default::<IpAddr>("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        let base_url = parse_value::<Url>("STOREFRONT_BASE_URL", &base_url)?;

        let order_api = OrderApiConfig::from_env()?;
        let paypal = PayPalConfig::from_env()?;
        let checkout = checkout_settings_from_env()?;
        let debounce_ms = parse_env_or_default("CART_PERSIST_DEBOUNCE_MS", "300")?;
        let cart = CartConfig {
            debounce: Duration::from_millis(debounce_ms),
            storage_dir: PathBuf::from(get_env_or_default("CART_STORAGE_DIR", "data/carts")),
        };
        let session_idle = minutes_to_duration(
            "SESSION_IDLE_MINUTES",
            parse_env_or_default("SESSION_IDLE_MINUTES", "30")?,
        )?;

        Ok(Self {
            host,
            port,
            base_url,
            order_api,
            paypal,
            checkout,
            cart,
            session_idle,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env_or_default("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl OrderApiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let token = match get_optional_env("ORDER_API_TOKEN") {
            Some(value) => {
                validate_secret_strength(&value, "ORDER_API_TOKEN")?;
                Some(SecretString::from(value))
            }
            None => None,
        };

        Ok(Self {
            base_url: parse_env_or_default("ORDER_API_BASE_URL", "http://localhost:5000")?,
            token,
            timeout: Duration::from_secs(parse_env_or_default("ORDER_API_TIMEOUT_SECS", "15")?),
        })
    }
}

impl PayPalConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            client_id: get_required_env("PAYPAL_CLIENT_ID")?,
            client_secret: get_validated_secret("PAYPAL_CLIENT_SECRET")?,
            api_base: parse_env_or_default("PAYPAL_API_BASE", DEFAULT_PAYPAL_API_BASE)?,
        })
    }
}

fn checkout_settings_from_env() -> Result<CheckoutSettings, ConfigError> {
    let express_surcharge: Decimal = parse_env_or_default("EXPRESS_DELIVERY_SURCHARGE", "4.99")?;
    if express_surcharge.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar(
            "EXPRESS_DELIVERY_SURCHARGE".to_string(),
            "must not be negative".to_string(),
        ));
    }

    Ok(CheckoutSettings {
        region: parse_env_or_default::<CheckoutRegion>("CHECKOUT_REGION", "uk")?,
        currency: parse_env_or_default("CHECKOUT_CURRENCY", "GBP")?,
        express_surcharge,
        brand_name: get_env_or_default("PAYPAL_BRAND_NAME", CheckoutSettings::DEFAULT_BRAND_NAME),
    })
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Blank values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a raw value, naming the variable in the error.
fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

/// Convert a number of minutes, rejecting values too large to hold in seconds.
fn minutes_to_duration(key: &str, minutes: u64) -> Result<Duration, ConfigError> {
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| {
            ConfigError::InvalidEnvVar(key.to_string(), format!("{minutes} is too large"))
        })
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
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

    // Real API secrets have high entropy
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the value issued by the provider."
            ),
        ));
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
    use ququ_core::CurrencyCode;

    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-paypal-secret", "PAYPAL_CLIENT_SECRET").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "ORDER_API_TOKEN");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("EHk3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "PAYPAL_CLIENT_SECRET");
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value::<u16>("STOREFRONT_PORT", " 8080 ").unwrap(), 8080);
        assert_eq!(
            parse_value::<CheckoutRegion>("CHECKOUT_REGION", "international").unwrap(),
            CheckoutRegion::International
        );
        assert_eq!(
            parse_value::<CurrencyCode>("CHECKOUT_CURRENCY", "gbp").unwrap(),
            CurrencyCode::GBP
        );
        assert_eq!(
            parse_value::<Decimal>("EXPRESS_DELIVERY_SURCHARGE", "4.99").unwrap(),
            CheckoutSettings::default_express_surcharge()
        );

        let err = parse_value::<u16>("STOREFRONT_PORT", "http").unwrap_err();
        assert!(err.to_string().contains("STOREFRONT_PORT"));
    }

    #[test]
    fn test_minutes_to_duration() {
        assert_eq!(
            minutes_to_duration("SESSION_IDLE_MINUTES", 30).unwrap(),
            Duration::from_secs(1_800)
        );
        assert!(matches!(
            minutes_to_duration("SESSION_IDLE_MINUTES", u64::MAX),
            Err(ConfigError::InvalidEnvVar(key, _)) if key == "SESSION_IDLE_MINUTES"
        ));
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: Url::parse("http://localhost:3000").unwrap(),
            order_api: OrderApiConfig {
                base_url: Url::parse("http://localhost:5000").unwrap(),
                token: None,
                timeout: Duration::from_secs(15),
            },
            paypal: PayPalConfig {
                client_id: "client".to_string(),
                client_secret: SecretString::from("secret"),
                api_base: Url::parse(DEFAULT_PAYPAL_API_BASE).unwrap(),
            },
            checkout: CheckoutSettings::default(),
            cart: CartConfig {
                debounce: Duration::from_millis(300),
                storage_dir: PathBuf::from("data/carts"),
            },
            session_idle: Duration::from_secs(30 * 60),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let paypal = PayPalConfig {
            client_id: "client_id_value".to_string(),
            client_secret: SecretString::from("super_secret_paypal_value"),
            api_base: Url::parse(DEFAULT_PAYPAL_API_BASE).unwrap(),
        };
        let order_api = OrderApiConfig {
            base_url: Url::parse("http://localhost:5000").unwrap(),
            token: Some(SecretString::from("super_secret_order_token")),
            timeout: Duration::from_secs(15),
        };

        let debug_output = format!("{paypal:?} {order_api:?}");

        assert!(debug_output.contains("client_id_value"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_paypal_value"));
        assert!(!debug_output.contains("super_secret_order_token"));
    }
}
