//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, admin routes)
//!     → request.rs (request ID)
//!     → load_balancer::pool (strategy picks a live backend)
//!     → proxy.rs (forward, relay response)
//!     → Send to client
//! ```

pub mod proxy;
pub mod request;
pub mod server;

pub use request::{ProxyRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
