use std::env;

use crate::error::AppError;

/// Default address of the analysis service.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub service: ServiceConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
}

/// Analysis service location
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub base_url: String,
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

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Deadline applied to every service call.
    pub timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let service = ServiceConfig::new(
            env::var("ESG_API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        )?;

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

        let request = RequestConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30000),
        };

        Ok(Config {
            service,
            logging,
            request,
        })
    }

    /// Replace the service address, e.g. from a command-line flag.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Result<Self, AppError> {
        self.service = ServiceConfig::new(base_url)?;
        Ok(self)
    }
}

impl ServiceConfig {
    /// Validate and normalize a service address.
    pub fn new(base_url: impl Into<String>) -> Result<Self, AppError> {
        let base_url = base_url.into();
        let trimmed = base_url.trim().trim_end_matches('/');

        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(AppError::Config {
                message: format!("ESG_API_BASE_URL must be an http(s) URL, got '{}'", base_url),
            });
        }

        Ok(Self {
            base_url: trimmed.to_string(),
        })
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { timeout_ms: 30000 }
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
