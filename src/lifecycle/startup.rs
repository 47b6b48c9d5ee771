//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Initialize subsystems in dependency order
//! - Start background tasks (health checks, config reload)
//! - Bind the listener and begin accepting traffic

use std::io;
use std::net::{AddrParseError, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::validation::validate_config;
use crate::config::{ConfigError, ConfigWatcher, ProxyConfig};
use crate::health::{HealthError, HealthMonitor};
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::load_balancer::error::PoolError;
use crate::load_balancer::pool::{PoolOptions, ServerPool};
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Health(#[from] HealthError),

    #[error("failed to register initial backends: {0}")]
    Pool(#[from] PoolError),

    #[error("invalid metrics address: {0}")]
    MetricsAddress(#[from] AddrParseError),

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Io(#[from] io::Error),

    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A running proxy.
pub struct Launched {
    pub local_addr: SocketAddr,
    pub pool: Arc<ServerPool>,
    pub task: JoinHandle<io::Result<()>>,
}

impl Launched {
    /// Wait until the server and health monitor have stopped.
    pub async fn wait(self) -> Result<(), StartupError> {
        self.task.await??;
        Ok(())
    }
}

/// Bring up every subsystem and start serving in the background.
pub async fn launch(config: ProxyConfig, shutdown: &Shutdown) -> Result<Launched, StartupError> {
    let config = config.normalize();
    validate_config(&config).map_err(ConfigError::Validation)?;

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let pool = Arc::new(ServerPool::new(PoolOptions::from_config(&config)));
    pool.populate(&config.servers, &config.weights).await?;

    let monitor = if config.health_check.enabled {
        let monitor = HealthMonitor::new(pool.clone(), &config.health_check)?;
        Some(tokio::spawn(monitor.run(shutdown.subscribe())))
    } else {
        tracing::info!("Active health checks disabled");
        None
    };

    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;
    let local_addr = listener.local_addr()?;

    tracing::info!(
        address = %local_addr,
        strategy = %config.strategy,
        backends = pool.len(),
        "Load balancer started"
    );

    let server = HttpServer::new(&config, pool.clone());
    let stop = shutdown.subscribe();
    let task = tokio::spawn(async move {
        let result = server.run(listener, stop).await;
        if let Some(monitor) = monitor {
            let _ = monitor.await;
        }
        result
    });

    Ok(Launched {
        local_addr,
        pool,
        task,
    })
}

/// Run until SIGINT/SIGTERM, applying server list changes from
/// `config_path` while running.
pub async fn run(config: ProxyConfig, config_path: &Path) -> Result<(), StartupError> {
    let shutdown = Shutdown::new();
    let launched = launch(config, &shutdown).await?;

    let (watcher, mut updates) = ConfigWatcher::new(config_path);
    let _watch_handle = match watcher.run() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Config hot reload unavailable");
            None
        }
    };

    let pool = launched.pool.clone();
    let mut stop = shutdown.subscribe();
    let reconciler = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(config) = updates.recv() => {
                    let report = pool.reconcile(&config.servers, &config.weights).await;
                    tracing::info!(
                        added = ?report.added,
                        removed = ?report.removed,
                        failed = ?report.failed,
                        "Server list reloaded"
                    );
                }
                _ = stop.recv() => break,
            }
        }
    });

    signals::wait_for_signal().await;
    tracing::info!("Shutting down");
    shutdown.trigger();

    let _ = reconciler.await;
    launched.wait().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
