//! HTTP transport.
//!
//! Every backend call goes through [`OpenmrsTransport`], so lookups and caches can be tested
//! against an in-memory fake.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// JSON request/response boundary to the OpenMRS backend.
///
/// Paths are relative to the OpenMRS context root.
#[async_trait]
pub trait OpenmrsTransport: Send + Sync {
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> ClientResult<Value>;

    async fn post_json(&self, path: &str, body: &Value) -> ClientResult<Value>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    http: Client,
    config: ClientConfig,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Returns `ClientError::Network` if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|source| ClientError::Network {
                url: config.base_url().to_string(),
                source,
            })?;

        Ok(Self { http, config })
    }

    fn authorise(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.credentials() {
            Some(credentials) => {
                request.basic_auth(credentials.username.as_str(), Some(&credentials.password))
            }
            None => request,
        }
    }

    async fn read_json(url: &str, response: Response) -> ClientResult<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let text = response.text().await.map_err(|source| ClientError::Network {
            url: url.to_string(),
            source,
        })?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|err| ClientError::Decode {
            url: url.to_string(),
            message: err.to_string(),
        })
    }
}

#[async_trait]
impl OpenmrsTransport for HttpTransport {
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> ClientResult<Value> {
        let url = self.config.url(path);
        tracing::debug!(%url, "GET");

        let response = self
            .authorise(self.http.get(&url))
            .query(query)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| ClientError::Network {
                url: url.clone(),
                source,
            })?;

        Self::read_json(&url, response).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> ClientResult<Value> {
        let url = self.config.url(path);
        tracing::debug!(%url, "POST");

        let response = self
            .authorise(self.http.post(&url))
            .json(body)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| ClientError::Network {
                url: url.clone(),
                source,
            })?;

        Self::read_json(&url, response).await
    }
}

/// Checks that `value` is a single path segment (`[A-Za-z0-9-]+`) before it is placed in a
/// request path.
pub(crate) fn path_segment<'a>(kind: &str, value: &'a str) -> ClientResult<&'a str> {
    let valid = !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-');
    if !valid {
        return Err(ClientError::InvalidUrl(format!("invalid {kind}: {value:?}")));
    }
    Ok(value)
}

/// Decodes a JSON response body into `T`.
pub(crate) fn decode<T: DeserializeOwned>(path: &str, value: Value) -> ClientResult<T> {
    serde_json::from_value(value).map_err(|err| ClientError::Decode {
        url: path.to_string(),
        message: err.to_string(),
    })
}

/// Encodes a request body.
pub(crate) fn encode<T: serde::Serialize>(path: &str, body: &T) -> ClientResult<Value> {
    serde_json::to_value(body).map_err(|err| ClientError::Encode {
        url: path.to_string(),
        message: err.to_string(),
    })
}
