use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::services::retry::RetryPolicy;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/nagpur_events";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";
const DEFAULT_RAZORPAY_API_BASE: &str = "https://api.razorpay.com/v1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    /// Secret used for webhook bodies. Razorpay lets merchants pick a separate
    /// one; when unset the key secret signs both.
    pub webhook_secret: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct BucketConfig {
    pub tickets: String,
    pub invoices: String,
    pub qr_codes: String,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            tickets: "tickets".to_string(),
            invoices: "invoices".to_string(),
            qr_codes: "qr-codes".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub supabase_url: String,
    pub service_key: String,
    pub buckets: BucketConfig,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    pub timeout: Duration,
}

pub struct Config {
    pub bind_addr: SocketAddr,
    pub production: bool,
    pub cors_allowed_origins: Option<String>,
    pub database: DatabaseConfig,
    pub session_secret: String,
    pub razorpay: RazorpayConfig,
    pub storage: StorageConfig,
    /// `None` when SMTP credentials are absent; mail is then only logged.
    pub smtp: Option<SmtpConfig>,
    pub font_dir: PathBuf,
    pub retry: RetryPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let key_secret = required("RAZORPAY_KEY_SECRET")?;

        Ok(Self {
            bind_addr: parsed("BIND_ADDR", DEFAULT_BIND_ADDR.parse().ok())?,
            production: env::var("RUST_ENV")
                .map(|v| v.to_lowercase() == "production")
                .unwrap_or(false),
            cors_allowed_origins: optional("CORS_ALLOWED_ORIGINS"),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: parsed("DATABASE_MAX_CONNECTIONS", Some(5))?,
                acquire_timeout_secs: parsed("DATABASE_ACQUIRE_TIMEOUT_SECS", Some(5))?,
            },
            session_secret: required("NEXTAUTH_SECRET")?,
            razorpay: RazorpayConfig {
                key_id: optional("RAZORPAY_KEY_ID").unwrap_or_default(),
                webhook_secret: optional("RAZORPAY_WEBHOOK_SECRET")
                    .unwrap_or_else(|| key_secret.clone()),
                key_secret,
                api_base: optional("RAZORPAY_API_BASE")
                    .unwrap_or_else(|| DEFAULT_RAZORPAY_API_BASE.to_string()),
            },
            storage: StorageConfig {
                supabase_url: required("SUPABASE_URL")?,
                service_key: required("SUPABASE_SERVICE_KEY")?,
                buckets: BucketConfig {
                    tickets: optional("STORAGE_TICKETS_BUCKET")
                        .unwrap_or_else(|| "tickets".to_string()),
                    invoices: optional("STORAGE_INVOICES_BUCKET")
                        .unwrap_or_else(|| "invoices".to_string()),
                    qr_codes: optional("STORAGE_QR_BUCKET")
                        .unwrap_or_else(|| "qr-codes".to_string()),
                },
            },
            smtp: smtp_from_env()?,
            font_dir: optional("FONT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("public/fonts")),
            retry: RetryPolicy::builder()
                .max_retries(parsed("RETRY_MAX_ATTEMPTS", Some(3))?)
                .initial_delay(Duration::from_millis(parsed(
                    "RETRY_INITIAL_DELAY_MS",
                    Some(400),
                )?))
                .max_delay(Duration::from_millis(parsed("RETRY_MAX_DELAY_MS", Some(5000))?))
                .build(),
        })
    }
}

fn smtp_from_env() -> Result<Option<SmtpConfig>, ConfigError> {
    let (Some(username), Some(password)) = (optional("SMTP_USERNAME"), optional("SMTP_PASSWORD"))
    else {
        return Ok(None);
    };

    Ok(Some(SmtpConfig {
        host: optional("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
        port: parsed("SMTP_PORT", Some(465))?,
        from_email: optional("SMTP_FROM_EMAIL").unwrap_or_else(|| username.clone()),
        from_name: optional("SMTP_FROM_NAME").unwrap_or_else(|| "NagpurEvents Elite".to_string()),
        timeout: Duration::from_secs(parsed("SMTP_TIMEOUT_SECS", Some(10))?),
        username,
        password,
    }))
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: Option<T>) -> Result<T, ConfigError> {
    match optional(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => default.ok_or(ConfigError::Missing(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsed_falls_back_to_default() {
        std::env::remove_var("NAGPUR_TEST_UNSET_PORT");
        let port: u16 = parsed("NAGPUR_TEST_UNSET_PORT", Some(465)).unwrap();
        assert_eq!(port, 465);
    }

    #[test]
    fn test_parsed_rejects_garbage() {
        std::env::set_var("NAGPUR_TEST_BAD_NUMBER", "eleven");
        let result: Result<u32, _> = parsed("NAGPUR_TEST_BAD_NUMBER", Some(5));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { name: "NAGPUR_TEST_BAD_NUMBER", .. })
        ));
        std::env::remove_var("NAGPUR_TEST_BAD_NUMBER");
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        std::env::set_var("NAGPUR_TEST_BLANK", "   ");
        assert!(matches!(
            required("NAGPUR_TEST_BLANK"),
            Err(ConfigError::Missing("NAGPUR_TEST_BLANK"))
        ));
        std::env::remove_var("NAGPUR_TEST_BLANK");
    }
}
