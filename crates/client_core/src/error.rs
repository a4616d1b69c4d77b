use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid API base url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("unknown endpoint operation '{0}'")]
    UnknownOperation(String),
    #[error("operation '{operation}' takes {expected} argument(s), got {actual}")]
    EndpointArguments {
        operation: String,
        expected: usize,
        actual: usize,
    },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned {status}: {message}")]
    Status {
        url: String,
        status: StatusCode,
        message: String,
    },
    #[error("could not decode response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

impl ClientError {
    /// True when the backend answered; false when the request never completed.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ClientError::Status { .. } | ClientError::Decode { .. })
    }
}
