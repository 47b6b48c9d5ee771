//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML or JSON.
//! Field names also accept the camelCase spelling used by JSON configs
//! (`listenPort`, `healthCheckInterval`, ...).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Port the proxy listens on.
    #[serde(alias = "listenPort")]
    pub listen_port: String,

    /// Interface the proxy binds to.
    #[serde(alias = "listenHost")]
    pub listen_host: String,

    /// Strategy applied to every proxied request.
    pub strategy: String,

    /// Consistent hashing key derivation.
    #[serde(alias = "hashKey")]
    pub hash_key: HashKey,

    /// Backend addresses, in rotation order.
    pub servers: Vec<String>,

    /// Weights parallel to `servers` (weighted round-robin only).
    pub weights: Vec<u32>,

    /// Host a demo server for every backend inside this process.
    #[serde(alias = "spawnLocalBackends")]
    pub spawn_local_backends: bool,

    /// Shorthand for `health_check.interval`.
    #[serde(alias = "healthCheckInterval", skip_serializing_if = "Option::is_none")]
    pub health_check_interval: Option<String>,

    #[serde(alias = "healthCheck")]
    pub health_check: HealthCheckConfig,

    pub ring: RingConfig,

    pub timeouts: TimeoutConfig,

    pub admin: AdminConfig,

    pub observability: ObservabilityConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_port: "8080".to_string(),
            listen_host: "0.0.0.0".to_string(),
            strategy: "consistentHashing".to_string(),
            hash_key: HashKey::default(),
            servers: Vec::new(),
            weights: Vec::new(),
            spawn_local_backends: false,
            health_check_interval: None,
            health_check: HealthCheckConfig::default(),
            ring: RingConfig::default(),
            timeouts: TimeoutConfig::default(),
            admin: AdminConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Fold top-level shorthands into their sections.
    pub fn normalize(mut self) -> Self {
        if let Some(interval) = self.health_check_interval.take() {
            self.health_check.interval = interval;
        }
        self
    }

    /// `host:port` the proxy binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }
}

/// How the consistent hashing routing key is derived from the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HashKey {
    /// Remote address of the connection (`ip:port`).
    #[default]
    RemoteAddr,
    /// Client IP only: all connections of a client share a backend.
    ClientIp,
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Probe interval as a duration string (`"5s"`, `"500ms"`).
    pub interval: String,

    /// Probe timeout. Capped at the interval.
    pub timeout: String,

    /// Path to probe.
    pub path: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: "5s".to_string(),
            timeout: "2s".to_string(),
            path: "/health".to_string(),
        }
    }
}

/// Hash ring configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RingConfig {
    /// Ring positions per backend (virtual nodes).
    pub replicas: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self { replicas: 1 }
    }
}

/// Timeouts for upstream traffic.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend connection establishment.
    #[serde(with = "humantime_duration")]
    pub connect: Duration,

    /// Time until the backend's response headers arrive.
    #[serde(with = "humantime_duration")]
    pub request: Duration,

    /// Idle keep-alive connections are closed after this long.
    #[serde(with = "humantime_duration")]
    pub pool_idle: Duration,

    /// Idle connections kept per backend. 0 disables reuse.
    pub pool_max_idle_per_host: usize,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(2),
            request: Duration::from_secs(30),
            pool_idle: Duration::from_secs(90),
            pool_max_idle_per_host: 32,
        }
    }
}

/// Admin surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount `/add-server`, `/remove-server` and `/admin/*`.
    pub enabled: bool,

    /// Bearer token required on admin routes. Empty disables auth.
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Prometheus endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Serde adapter for `"5s"`-style durations.
mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
