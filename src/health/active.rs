//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe backends
//! - Update backend liveness based on results

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures_util::future::join_all;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::validation::{parse_duration, ValidationError};
use crate::config::HealthCheckConfig;
use crate::load_balancer::backend::{Backend, HealthState};
use crate::load_balancer::pool::ServerPool;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("invalid health check settings: {0}")]
    Invalid(#[from] ValidationError),
}

pub struct HealthMonitor {
    pool: Arc<ServerPool>,
    interval: Duration,
    timeout: Duration,
    path: String,
    client: Client<HttpConnector, Body>,
}

impl HealthMonitor {
    pub fn new(pool: Arc<ServerPool>, config: &HealthCheckConfig) -> Result<Self, HealthError> {
        let interval = parse_duration("health_check.interval", &config.interval)?;
        let timeout = parse_duration("health_check.timeout", &config.timeout)?.min(interval);

        // Fresh connection per probe.
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(HttpConnector::new());

        Ok(Self {
            pool,
            interval,
            timeout,
            path: config.path.clone(),
            client,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe on every tick until shutdown. The first round runs one interval
    /// after start.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval = ?self.interval,
            timeout = ?self.timeout,
            path = %self.path,
            "Health monitor starting"
        );

        let mut ticker = time::interval_at(time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every backend in the current pool concurrently.
    pub async fn check_all(&self) {
        let snapshot = self.pool.snapshot();
        let probes = snapshot.backends().iter().map(|backend| self.check(backend));
        join_all(probes).await;
    }

    async fn check(&self, backend: &Arc<Backend>) {
        let alive = self.probe(backend).await;

        if let Some(previous) = backend.set_alive(alive) {
            if alive {
                tracing::info!(
                    backend = %backend.addr(),
                    previous = previous.as_str(),
                    "Backend is alive"
                );
            } else {
                tracing::warn!(
                    backend = %backend.addr(),
                    previous = previous.as_str(),
                    "Backend is not alive"
                );
            }
        }

        record_health(backend);
    }

    async fn probe(&self, backend: &Backend) -> bool {
        let uri = format!("{}{}", backend.addr().origin(), self.path);
        let request = match Request::builder()
            .method("GET")
            .uri(uri)
            .header("user-agent", "ring-proxy-health-check")
            .body(Body::empty())
        {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(backend = %backend.addr(), error = %e, "Failed to build health check request");
                return false;
            }
        };

        match time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) if response.status() == StatusCode::OK => true,
            Ok(Ok(response)) => {
                tracing::debug!(backend = %backend.addr(), status = %response.status(), "Health check failed: unexpected status");
                false
            }
            Ok(Err(e)) => {
                tracing::debug!(backend = %backend.addr(), error = %e, "Health check failed: connection error");
                false
            }
            Err(_) => {
                tracing::debug!(backend = %backend.addr(), "Health check failed: timeout");
                false
            }
        }
    }
}

/// Removed backends no longer export a health series.
fn record_health(backend: &Backend) {
    if backend.state() == HealthState::Removed {
        return;
    }
    metrics::record_backend_health(backend.identity(), backend.is_alive());
}
