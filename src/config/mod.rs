use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub export: ExportConfig,
    pub pricing: PricingConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Export artifact configuration
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Local directory the artifacts are written under.
    pub directory: PathBuf,
    /// Bucket name used when building download URLs.
    pub bucket: String,
    /// Base URL prepended to `{bucket}/exports/{filename}`.
    pub url_base: String,
    /// Lifetime of a download link in hours.
    pub link_ttl_hours: i64,
    /// Upper bound on the number of records a single export may contain.
    pub max_records: usize,
}

/// Per-token pricing used for cost estimates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingConfig {
    pub input_token_rate: f64,
    pub output_token_rate: f64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/history.db".to_string()),
            ),
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5)?,
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let export = ExportConfig {
            directory: PathBuf::from(
                env::var("EXPORT_DIR").unwrap_or_else(|_| "./data/exports".to_string()),
            ),
            bucket: env::var("EXPORT_BUCKET")
                .unwrap_or_else(|_| "verification-exports".to_string()),
            url_base: env::var("EXPORT_URL_BASE")
                .unwrap_or_else(|_| "https://s3.amazonaws.com".to_string()),
            link_ttl_hours: parse_ttl("EXPORT_LINK_TTL_HOURS", 24)?,
            max_records: parse_var("EXPORT_MAX_RECORDS", 10_000)?,
        };

        let defaults = PricingConfig::default();
        let pricing = PricingConfig {
            input_token_rate: parse_rate("INPUT_TOKEN_RATE", defaults.input_token_rate)?,
            output_token_rate: parse_rate("OUTPUT_TOKEN_RATE", defaults.output_token_rate)?,
        };

        Ok(Config {
            database,
            logging,
            export,
            pricing,
        })
    }
}

/// Read an optional variable, rejecting values that are present but unparsable.
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| AppError::Config {
            message: format!("{} has an invalid value: '{}'", name, raw),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_rate(name: &str, default: f64) -> Result<f64, AppError> {
    let rate: f64 = parse_var(name, default)?;
    if !rate.is_finite() || rate < 0.0 {
        return Err(AppError::Config {
            message: format!("{} must be a non-negative number", name),
        });
    }
    Ok(rate)
}

/// Longest accepted download link lifetime (one year).
pub const MAX_LINK_TTL_HOURS: i64 = 8760;

fn parse_ttl(name: &str, default: i64) -> Result<i64, AppError> {
    let hours: i64 = parse_var(name, default)?;
    if !(1..=MAX_LINK_TTL_HOURS).contains(&hours) {
        return Err(AppError::Config {
            message: format!("{} must be between 1 and {} hours", name, MAX_LINK_TTL_HOURS),
        });
    }
    Ok(hours)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            export: ExportConfig::default(),
            pricing: PricingConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/history.db"),
            max_connections: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            input_token_rate: 0.000003,
            output_token_rate: 0.000015,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./data/exports"),
            bucket: "verification-exports".to_string(),
            url_base: "https://s3.amazonaws.com".to_string(),
            link_ttl_hours: 24,
            max_records: 10_000,
        }
    }
}

impl PricingConfig {
    /// Estimated cost of a call with the given token counts.
    pub fn estimate(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        input_tokens as f64 * self.input_token_rate + output_tokens as f64 * self.output_token_rate
    }
}
