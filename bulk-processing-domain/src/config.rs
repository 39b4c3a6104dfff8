//! Service configuration read from environment variables.
//!
//! A `.env` file in the working directory is loaded first when present;
//! variables already set in the environment win over it.

use std::time::Duration;

use bulk_processing_data::store::DEFAULT_KEY_PREFIX;
use thiserror::Error;
use url::Url;

/// Configuration errors, naming the offending variable
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A required variable is not set or empty
    #[error("{0} must be set")]
    Missing(&'static str),

    /// A variable is set to an unusable value
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Runtime configuration of the service
#[derive(Clone)]
pub struct AppConfig {
    /// Deployment environment, `prod` hides the API docs
    pub app_env: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub service_name: String,

    pub redis_host: String,
    pub redis_port: u16,
    pub redis_username: Option<String>,
    pub redis_password: Option<String>,
    pub redis_key_prefix: String,

    /// Base URL of the hospital directory API, without trailing slash
    pub hospital_api_base_url: String,
    pub hospital_api_request_timeout: Duration,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("app_env", &self.app_env)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("service_name", &self.service_name)
            .field("redis_host", &self.redis_host)
            .field("redis_port", &self.redis_port)
            .field("redis_username", &self.redis_username)
            .field("redis_password", &self.redis_password.as_ref().map(|_| "<redacted>"))
            .field("redis_key_prefix", &self.redis_key_prefix)
            .field("hospital_api_base_url", &self.hospital_api_base_url)
            .field("hospital_api_request_timeout", &self.hospital_api_request_timeout)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from `.env` and the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset, like an exported but blank variable.
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let hospital_api_base_url = get("HOSPITAL_API_BASE_URL")
            .ok_or(ConfigError::Missing("HOSPITAL_API_BASE_URL"))
            .and_then(|raw| parse_base_url("HOSPITAL_API_BASE_URL", &raw))?;

        let timeout_secs = parse_number::<u64>("HOSPITAL_API_REQUEST_TIMEOUT", get("HOSPITAL_API_REQUEST_TIMEOUT"), 30)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "HOSPITAL_API_REQUEST_TIMEOUT",
                reason: "must be at least 1 second".to_string(),
            });
        }

        Ok(Self {
            app_env: get("ENV").unwrap_or_else(|| "dev".to_string()),
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_number("PORT", get("PORT"), 8000)?,
            log_level: get("LOG_LEVEL")
                .map(|level| level.to_lowercase())
                .unwrap_or_else(|| "info".to_string()),
            service_name: get("SERVICE_NAME").unwrap_or_else(|| "bulk-processing".to_string()),
            redis_host: get("REDIS_HOST").unwrap_or_else(|| "localhost".to_string()),
            redis_port: parse_number("REDIS_PORT", get("REDIS_PORT"), 6379)?,
            redis_username: get("REDIS_USERNAME"),
            redis_password: get("REDIS_PASSWORD"),
            redis_key_prefix: get("REDIS_KEY_PREFIX").unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
            hospital_api_base_url,
            hospital_api_request_timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn is_production(&self) -> bool {
        self.app_env == "prod"
    }

    /// Connection URL for the Redis client, credentials percent-encoded
    pub fn redis_url(&self) -> String {
        let credentials = match (&self.redis_username, &self.redis_password) {
            (Some(user), Some(password)) => format!(
                "{}:{}@",
                urlencoding::encode(user),
                urlencoding::encode(password)
            ),
            (Some(user), None) => format!("{}@", urlencoding::encode(user)),
            (None, Some(password)) => format!(":{}@", urlencoding::encode(password)),
            (None, None) => String::new(),
        };
        format!("redis://{}{}:{}/", credentials, self.redis_host, self.redis_port)
    }
}

fn parse_base_url(name: &'static str, raw: &str) -> Result<String, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Invalid {
            name,
            reason: format!("unsupported scheme '{}', expected http or https", url.scheme()),
        });
    }
    if url.host_str().is_none() {
        return Err(ConfigError::Invalid {
            name,
            reason: "missing host".to_string(),
        });
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

fn parse_number<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
