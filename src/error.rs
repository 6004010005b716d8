//! Request-level error taxonomy.
//!
//! Every handler failure is one of these and is converted to a response at
//! the request boundary; nothing propagates to the server loop.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// Malformed `/proxy/` target; nothing was forwarded.
    #[error("Invalid proxy URL. Must start with http:// or https:// after /proxy/ (got '{0}')")]
    InvalidTarget(String),

    #[error("Not Found")]
    NotFound,

    /// The upstream could not be reached or the outbound request could not be built.
    #[error("Proxy Request Failed: {0}")]
    Upstream(String),

    /// A text body that had to be rewritten was not valid UTF-8.
    #[error("Proxy Request Failed: upstream body is not valid UTF-8: {0}")]
    Decode(String),

    /// The inbound request could not be adapted for its upstream.
    #[error("Request adaptation failed: {0}")]
    Adaptation(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            ProxyError::NotFound => StatusCode::NOT_FOUND,
            ProxyError::Upstream(_) | ProxyError::Decode(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Adaptation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(e: reqwest::Error) -> Self {
        // The default Display of reqwest hides the root cause.
        let mut message = e.to_string();
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        ProxyError::Upstream(message)
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match self {
            ProxyError::NotFound => StatusCode::NOT_FOUND.into_response(),
            other => (other.status(), other.to_string()).into_response(),
        }
    }
}
