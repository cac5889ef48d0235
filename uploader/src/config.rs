//! Client configuration.
//!
//! Constants for limits that never change at runtime, plus [`ClientConfig`]
//! loaded from the environment (and a `.env` file when present).

use std::env;
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::{LoggedInUser, Role};

/// Backing service base URL used when none is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// Maximum accepted upload size (10 MB).
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Subject columns run `sub1` ..= `sub10`.
pub const MAX_SUBJECT_PAIRS: usize = 10;

/// Capacity of the progress log channel.
pub const LOG_CHANNEL_CAPACITY: usize = 100;

pub const ENV_API_URL: &str = "VESPA_UPLOAD_API_URL";
pub const ENV_USER_ID: &str = "VESPA_USER_ID";
pub const ENV_USER_EMAIL: &str = "VESPA_USER_EMAIL";
pub const ENV_USER_ROLE: &str = "VESPA_USER_ROLE";
pub const ENV_REMOTE_VALIDATION: &str = "VESPA_REMOTE_VALIDATION";
pub const ENV_LOOKUP_TIMEOUT: &str = "VESPA_LOOKUP_TIMEOUT_SECS";

/// Runtime configuration for the wizard and its HTTP client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the backing service, without trailing slash.
    pub api_url: String,
    /// Operator driving the upload.
    pub operator: LoggedInUser,
    /// Also run the server-side `/validate` check after local rules pass.
    pub remote_validation: bool,
    /// Timeout for lookups and validation calls. Job submission is never timed out.
    pub lookup_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>, operator: LoggedInUser) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            operator,
            remote_validation: true,
            lookup_timeout: None,
        }
    }

    /// Build the configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let api_url = env::var(ENV_API_URL).unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let id = env::var(ENV_USER_ID).map_err(|_| ConfigError::Missing(ENV_USER_ID))?;
        let email = env::var(ENV_USER_EMAIL).map_err(|_| ConfigError::Missing(ENV_USER_EMAIL))?;
        let role = env::var(ENV_USER_ROLE)
            .map(Role::from)
            .unwrap_or(Role::StaffAdmin);

        let remote_validation = match env::var(ENV_REMOTE_VALIDATION) {
            Ok(value) => parse_bool(ENV_REMOTE_VALIDATION, &value)?,
            Err(_) => true,
        };

        let lookup_timeout = match env::var(ENV_LOOKUP_TIMEOUT) {
            Ok(value) => {
                let secs: u64 = value.trim().parse().map_err(|_| ConfigError::Invalid {
                    key: ENV_LOOKUP_TIMEOUT,
                    value: value.clone(),
                })?;
                Some(Duration::from_secs(secs))
            }
            Err(_) => None,
        };

        Ok(Self {
            lookup_timeout,
            remote_validation,
            ..Self::new(api_url, LoggedInUser { id, email, role })
        })
    }

    /// Absolute URL for a path relative to the base.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}
