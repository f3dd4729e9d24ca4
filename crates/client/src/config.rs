//! Client configuration.
//!
//! Resolved once at process startup and passed into the client, so request handling never
//! reads the environment.

use crate::error::{ClientError, ClientResult};
use reg_types::NonEmptyText;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Basic-auth credentials for the backend.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub username: NonEmptyText,
    pub password: String,
}

/// Connection settings for the OpenMRS backend.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    base_url: String,
    credentials: Option<Credentials>,
    timeout: Duration,
}

impl ClientConfig {
    /// Create a new `ClientConfig`.
    ///
    /// `base_url` is the OpenMRS context root, e.g. `https://emr.example.org/openmrs`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidConfig` if the base url is not an http(s) url or the
    /// timeout is zero.
    pub fn new(
        base_url: &str,
        credentials: Option<Credentials>,
        timeout: Duration,
    ) -> ClientResult<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidConfig(format!(
                "base url must start with http:// or https://, got '{base_url}'"
            )));
        }
        if timeout.is_zero() {
            return Err(ClientError::InvalidConfig("timeout cannot be zero".into()));
        }

        Ok(Self {
            base_url: base_url.to_string(),
            credentials,
            timeout,
        })
    }

    /// Builds the configuration from `OPENMRS_BASE_URL`, `OPENMRS_USERNAME`,
    /// `OPENMRS_PASSWORD` and `OPENMRS_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidConfig` when the base url is missing or a value is
    /// invalid.
    pub fn from_env() -> ClientResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ClientResult<Self> {
        let base_url = lookup("OPENMRS_BASE_URL")
            .ok_or_else(|| ClientError::InvalidConfig("OPENMRS_BASE_URL is not set".into()))?;

        let credentials = match lookup("OPENMRS_USERNAME") {
            Some(username) => Some(Credentials {
                username: NonEmptyText::new(&username).map_err(|err| {
                    ClientError::InvalidConfig(format!("OPENMRS_USERNAME: {err}"))
                })?,
                password: lookup("OPENMRS_PASSWORD").unwrap_or_default(),
            }),
            None => None,
        };

        let timeout = match lookup("OPENMRS_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(secs.trim().parse().map_err(|_| {
                ClientError::InvalidConfig(format!("OPENMRS_TIMEOUT_SECS is not a number: {secs}"))
            })?),
            None => DEFAULT_TIMEOUT,
        };

        Self::new(&base_url, credentials, timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Absolute url of a backend path, with or without a leading slash.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
