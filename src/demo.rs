//! Demo backend server.
//!
//! A minimal HTTP server answering `/` and `/health`, used when the proxy
//! hosts its own backends (`spawn_local_backends`) and by the
//! `demo-backend` binary.

use axum::{extract::State, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A running demo server. Stopping it releases the listener.
#[derive(Debug)]
pub struct DemoServer {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl DemoServer {
    /// Bind `addr` and serve in a background task.
    pub async fn spawn(addr: impl ToSocketAddrs) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel();

        tracing::info!(address = %local_addr, "Starting demo backend");

        let app = router(local_addr.to_string());
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(address = %local_addr, error = %e, "Demo backend failed");
            }
        });

        Ok(Self {
            local_addr,
            shutdown: Some(tx),
            task: Some(task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signal shutdown. Idempotent.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    /// Stop and wait for the server task to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for DemoServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Routes served by a demo backend named `name`.
pub fn router(name: String) -> Router {
    Router::new()
        .route("/", get(hello))
        .route("/health", get(health))
        .with_state(Arc::<str>::from(name))
}

async fn hello(State(name): State<Arc<str>>) -> String {
    tracing::debug!(server = %name, "Demo backend received request");
    format!("Hello from server {}!", name)
}

async fn health(State(name): State<Arc<str>>) -> String {
    format!("Server [{}] is healthy !!", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_hello_and_health() {
        let server = DemoServer::spawn("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr();
        let client = reqwest::Client::new();

        let hello = client.get(format!("http://{}/", addr)).send().await.unwrap();
        assert_eq!(hello.status(), 200);
        assert_eq!(hello.text().await.unwrap(), format!("Hello from server {}!", addr));

        let health = client.get(format!("http://{}/health", addr)).send().await.unwrap();
        assert_eq!(health.status(), 200);
        assert_eq!(
            health.text().await.unwrap(),
            format!("Server [{}] is healthy !!", addr)
        );

        server.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_releases_listener() {
        let server = DemoServer::spawn("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr();
        server.shutdown().await;

        // The port can be bound again once the server is gone.
        let rebound = TcpListener::bind(addr).await;
        assert!(rebound.is_ok());
    }
}
