//! Load balancer error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::time::Duration;
use thiserror::Error;

/// Errors from pool membership operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The address could not be parsed into a backend identity.
    #[error("invalid backend address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// A backend with the same host identity is already registered.
    #[error("backend {0} is already registered")]
    AlreadyRegistered(String),

    /// No backend with this host identity is registered.
    #[error("backend {0} not found")]
    NotFound(String),

    /// The locally hosted backend server could not be started.
    #[error("failed to start local backend {identity}: {source}")]
    LocalBackend {
        identity: String,
        #[source]
        source: std::io::Error,
    },
}

/// Strategy name that is not one of the supported algorithms.
#[derive(Debug, Error)]
#[error("invalid load balancing strategy '{0}'")]
pub struct UnknownStrategy(pub String);

/// Per-request routing failures.
///
/// Every variant is contained to the request that produced it.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    InvalidStrategy(#[from] UnknownStrategy),

    /// Selection returned nothing (empty pool or empty ring).
    #[error("no backend available")]
    NoBackend,

    /// The selected backend is currently not alive.
    #[error("backend {0} is not alive")]
    BackendDown(String),

    #[error("failed to connect to backend {backend}: {source}")]
    Connect {
        backend: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    #[error("backend {backend} did not respond within {timeout:?}")]
    Timeout { backend: String, timeout: Duration },

    #[error("error reading response from backend {backend}: {source}")]
    Upstream {
        backend: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    #[error("cannot build upstream request: {0}")]
    InvalidUri(#[from] axum::http::uri::InvalidUri),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidStrategy(_) | ProxyError::InvalidUri(_) => StatusCode::BAD_REQUEST,
            ProxyError::NoBackend
            | ProxyError::BackendDown(_)
            | ProxyError::Connect { .. }
            | ProxyError::Timeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client. Backend addresses stay in the logs.
    fn client_message(&self) -> &'static str {
        match self {
            ProxyError::InvalidStrategy(_) => "Invalid Load Balancing Algorithm",
            ProxyError::InvalidUri(_) => "Invalid request URI",
            ProxyError::NoBackend | ProxyError::BackendDown(_) => "Service not available",
            ProxyError::Connect { .. } | ProxyError::Timeout { .. } => {
                "Failed to connect to backend server"
            }
            ProxyError::Upstream { .. } => "Error reading response from backend server",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.client_message()).into_response()
    }
}
