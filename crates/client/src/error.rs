//! Client error types.

/// Errors returned by the OpenMRS REST client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("failed to encode request to {url}: {message}")]
    Encode { url: String, message: String },

    #[error(transparent)]
    Registration(#[from] reg_core::RegistrationError),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// True for a 404 response, which the backend uses for unknown uuids.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Status { status: 404, .. })
    }
}
