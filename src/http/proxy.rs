//! Upstream forwarding.
//!
//! # Responsibilities
//! - Rewrite the inbound request onto the selected backend
//! - Send it over the pooled upstream client (keep-alive per backend)
//! - Relay status, headers and a streamed body back to the caller
//! - Enforce connect and response deadlines
//!
//! # Design Decisions
//! - `pool_max_idle_per_host = 0` gives one fresh connection per request
//! - Hop-by-hop headers are stripped in both directions
//! - Connect failures and timeouts map to 503, other upstream errors to 500
//! - Proxy failures never flip backend liveness

use axum::body::Body;
use axum::http::{HeaderMap, Request, Response, Uri, Version};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::fmt;
use std::time::Duration;
use tokio::time;

use crate::config::TimeoutConfig;
use crate::load_balancer::{backend::Backend, error::ProxyError};

/// Response extension naming the backend that served the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedTo(pub String);

const HOP_BY_HOP: [&str; 7] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Pooled HTTP client used to reach backends.
#[derive(Clone)]
pub struct Upstream {
    client: Client<HttpConnector, Body>,
    response_timeout: Duration,
}

impl fmt::Debug for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upstream")
            .field("response_timeout", &self.response_timeout)
            .finish_non_exhaustive()
    }
}

impl Upstream {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeouts.connect));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(timeouts.pool_idle)
            .pool_max_idle_per_host(timeouts.pool_max_idle_per_host)
            .build(connector);

        Self {
            client,
            response_timeout: timeouts.request,
        }
    }

    /// Forward `request` to `backend` and return its response.
    pub async fn forward(
        &self,
        backend: &Backend,
        request: Request<Body>,
    ) -> Result<Response<Body>, ProxyError> {
        let (mut parts, body) = request.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        parts.uri = format!("{}{}", backend.addr().origin(), path_and_query).parse::<Uri>()?;
        parts.version = Version::HTTP_11;
        strip_hop_by_hop(&mut parts.headers);

        let request = Request::from_parts(parts, body);
        let identity = backend.identity();

        let response = match time::timeout(self.response_timeout, self.client.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(source)) if source.is_connect() => {
                return Err(ProxyError::Connect {
                    backend: identity.to_string(),
                    source,
                })
            }
            Ok(Err(source)) => {
                return Err(ProxyError::Upstream {
                    backend: identity.to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(ProxyError::Timeout {
                    backend: identity.to_string(),
                    timeout: self.response_timeout,
                })
            }
        };

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}
