//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `POS_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `IMAGE_STORE_URL` - Base URL of the object store holding product images
//!
//! ## Optional
//! - `POS_HOST` - Bind address (default: 127.0.0.1)
//! - `POS_PORT` - Listen port (default: 3000)
//! - `POS_DEFAULT_STORE_ID` - Store used when a request names none (default: 1)
//! - `IMAGE_STORE_TOKEN` - Bearer token for the object store
//! - `IMAGE_PUBLIC_URL` - Public base URL for stored images (default: `IMAGE_STORE_URL`)
//! - `IMAGE_MAX_COUNT` - Images per product (default: 8)
//! - `IMAGE_MAX_BYTES` - Bytes per image (default: 5242880)
//! - `IMAGE_THUMBNAIL_PX` - Thumbnail bounding box (default: 320)
//! - `ORDER_EXPIRY_HOURS` - Pending orders older than this expire (default: 48)
//! - `ORDER_MATCH_WINDOW_HOURS` - Look-back window for sale/order matching (default: 24)
//! - `CATALOG_CACHE_TTL_SECS` - Public catalog cache lifetime (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! ## Optional (TLS)
//! - `POS_TLS_CERT` - PEM-encoded certificate chain
//! - `POS_TLS_KEY` - PEM-encoded private key

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use counterline_core::StoreId;
use counterline_core::images::ImageRules;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

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
    "insert",
    "put-your",
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

/// Server configuration.
#[derive(Debug, Clone)]
pub struct PosConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    /// Store assumed when a request has no `store_id` parameter
    pub default_store_id: StoreId,
    pub image_store: ImageStoreConfig,
    pub images: ImageConfig,
    pub orders: OrderConfig,
    pub catalog_cache_ttl: Duration,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
    pub tls: Option<TlsConfig>,
}

/// External object store configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct ImageStoreConfig {
    /// Base URL objects are written under (`PUT {base}/{key}`)
    pub base_url: Url,
    /// Base URL clients read objects from
    pub public_url: Url,
    pub token: Option<SecretString>,
}

impl std::fmt::Debug for ImageStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageStoreConfig")
            .field("base_url", &self.base_url.as_str())
            .field("public_url", &self.public_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Limits for product images.
#[derive(Debug, Clone, Copy)]
pub struct ImageConfig {
    pub max_count: usize,
    pub max_bytes: usize,
    /// Longest edge of generated thumbnails, in pixels
    pub thumbnail_px: u32,
}

impl ImageConfig {
    #[must_use]
    pub const fn rules(&self) -> ImageRules {
        ImageRules {
            max_images: self.max_count,
            max_bytes: self.max_bytes,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        let rules = ImageRules::default();
        Self {
            max_count: rules.max_images,
            max_bytes: rules.max_bytes,
            thumbnail_px: 320,
        }
    }
}

/// Pending-order lifetimes.
#[derive(Debug, Clone, Copy)]
pub struct OrderConfig {
    pub expiry: chrono::Duration,
    pub match_window: chrono::Duration,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            expiry: chrono::Duration::hours(48),
            match_window: chrono::Duration::hours(24),
        }
    }
}

/// TLS configuration for HTTPS.
#[derive(Clone)]
pub struct TlsConfig {
    /// PEM-encoded certificate chain
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: SecretString,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("cert_pem", &"[CERTIFICATE]")
            .field("key_pem", &"[REDACTED]")
            .finish()
    }
}

impl TlsConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let cert_pem = get_optional_env("POS_TLS_CERT");
        let key_pem = get_optional_env("POS_TLS_KEY");

        match (cert_pem, key_pem) {
            (Some(cert), Some(key)) => Ok(Some(Self {
                cert_pem: cert,
                key_pem: SecretString::from(key),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "POS_TLS_*".to_string(),
                "Both POS_TLS_CERT and POS_TLS_KEY must be set together".to_string(),
            )),
        }
    }
}

impl PosConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the object store token looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("POS_DATABASE_URL")?;
        let host = parse_env("POS_HOST", "127.0.0.1")?;
        let port = parse_env("POS_PORT", "3000")?;
        let default_store_id = StoreId::new(parse_env("POS_DEFAULT_STORE_ID", "1")?);

        let image_store = ImageStoreConfig::from_env()?;
        let images = ImageConfig {
            max_count: parse_env("IMAGE_MAX_COUNT", "8")?,
            max_bytes: parse_env("IMAGE_MAX_BYTES", "5242880")?,
            thumbnail_px: parse_env("IMAGE_THUMBNAIL_PX", "320")?,
        };
        let orders = OrderConfig {
            expiry: chrono::Duration::hours(parse_env("ORDER_EXPIRY_HOURS", "48")?),
            match_window: chrono::Duration::hours(parse_env("ORDER_MATCH_WINDOW_HOURS", "24")?),
        };
        let catalog_cache_ttl = Duration::from_secs(parse_env("CATALOG_CACHE_TTL_SECS", "30")?);

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);
        let tls = TlsConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            default_store_id,
            image_store,
            images,
            orders,
            catalog_cache_ttl,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
            tls,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl ImageStoreConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = parse_url("IMAGE_STORE_URL", &get_required_env("IMAGE_STORE_URL")?)?;
        let public_url = match get_optional_env("IMAGE_PUBLIC_URL") {
            Some(raw) => parse_url("IMAGE_PUBLIC_URL", &raw)?,
            None => base_url.clone(),
        };
        let token = match get_optional_env("IMAGE_STORE_TOKEN") {
            Some(token) => {
                validate_secret_strength(&token, "IMAGE_STORE_TOKEN")?;
                Some(SecretString::from(token))
            }
            None => None,
        };

        Ok(Self {
            base_url,
            public_url,
            token,
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

/// Parse an environment variable, using `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a base URL, making sure joins append rather than replace the last segment.
fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut url =
        Url::parse(raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
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
            #[allow(clippy::cast_precision_loss)]
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

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated token."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config() -> PosConfig {
        let base = Url::parse("http://localhost:9000/images/").unwrap();
        PosConfig {
            database_url: SecretString::from("postgres://localhost/counterline"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            default_store_id: StoreId::new(1),
            image_store: ImageStoreConfig {
                base_url: base.clone(),
                public_url: base,
                token: Some(SecretString::from("tk_9fQ2xLr7Vb3Np0Zs")),
            },
            images: ImageConfig::default(),
            orders: OrderConfig::default(),
            catalog_cache_ttl: Duration::from_secs(30),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
            tls: None,
        }
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.to_string(), "127.0.0.1:3000");
    }

    #[test]
    fn test_image_store_debug_redacts_token() {
        let debug_output = format!("{:?}", test_config().image_store);
        assert!(debug_output.contains("localhost:9000"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("tk_9fQ2xLr7Vb3Np0Zs"));
    }

    #[test]
    fn test_image_defaults_match_rules() {
        let rules = ImageConfig::default().rules();
        assert_eq!(rules.max_images, 8);
        assert_eq!(rules.max_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_parse_url_appends_slash() {
        let url = parse_url("X", "https://cdn.example.net/bucket").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.net/bucket/");
        assert_eq!(
            url.join("products/1/a.jpg").unwrap().as_str(),
            "https://cdn.example.net/bucket/products/1/a.jpg"
        );
    }

    #[test]
    fn test_parse_url_rejects_relative() {
        assert!(matches!(
            parse_url("X", "not a url"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_placeholder_token_rejected() {
        let result = validate_secret_strength("changeme-token", "IMAGE_STORE_TOKEN");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_low_entropy_token_rejected() {
        assert!(validate_secret_strength("aaaaaaaaaaaaaaaa", "IMAGE_STORE_TOKEN").is_err());
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }
}
