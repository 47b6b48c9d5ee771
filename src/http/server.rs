//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: admin routes plus a catch-all proxy fallback
//! - Wire up middleware (request ID, tracing, timeout)
//! - Bind server to listener and stop on the shutdown broadcast
//! - Record per-request metrics

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::config::ProxyConfig;
use crate::http::proxy::RoutedTo;
use crate::http::request::{request_id, ProxyRequestId};
use crate::load_balancer::{error::ProxyError, pool::ServerPool};
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<ServerPool>,
    /// Strategy name applied to every proxied request.
    pub strategy: Arc<str>,
    /// Bearer key for admin routes. `None` disables auth.
    pub admin_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(config: &ProxyConfig, pool: Arc<ServerPool>) -> Self {
        let admin_key = Some(config.admin.api_key.trim())
            .filter(|key| !key.is_empty())
            .map(Arc::from);

        Self {
            pool,
            strategy: Arc::from(config.strategy.as_str()),
            admin_key,
        }
    }
}

/// HTTP server for the load balancer.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &ProxyConfig, pool: Arc<ServerPool>) -> Self {
        let state = AppState::new(config, pool);
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let mut router = Router::new();
        if config.admin.enabled {
            router = router.merge(admin::admin_router(&state));
        }

        // Outer deadline leaves room for the upstream timeouts to answer first.
        let deadline = config.timeouts.request + config.timeouts.connect;

        router
            .fallback(proxy_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(ProxyRequestId))
                    .layer(TraceLayer::new_for_http().make_span_with(
                        |request: &Request<Body>| {
                            tracing::info_span!(
                                "request",
                                method = %request.method(),
                                uri = %request.uri(),
                                request_id = %request_id(request),
                            )
                        },
                    ))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(deadline)),
            )
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until the shutdown broadcast fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Route every non-admin request through the pool.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let id = request_id(&request).to_string();

    match state.pool.route(request, &state.strategy, client).await {
        Ok(response) => {
            let backend = response
                .extensions()
                .get::<RoutedTo>()
                .map(|routed| routed.0.clone())
                .unwrap_or_default();
            metrics::record_request(&method, response.status().as_u16(), &backend, start);
            response
        }
        Err(e) => {
            match &e {
                ProxyError::Connect { .. }
                | ProxyError::Timeout { .. }
                | ProxyError::Upstream { .. } => {
                    tracing::error!(request_id = %id, client = %client, error = %e, "Proxy request failed");
                }
                _ => {
                    tracing::warn!(request_id = %id, client = %client, error = %e, "Request not routed");
                }
            }
            metrics::record_request(&method, e.status().as_u16(), "none", start);
            e.into_response()
        }
    }
}
