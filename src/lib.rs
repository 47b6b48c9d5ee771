//! Ring Proxy Library
//!
//! An HTTP load balancer with round-robin, weighted and consistent hashing
//! strategies over a runtime-mutable backend pool.

pub mod admin;
pub mod config;
pub mod demo;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::pool::ServerPool;
