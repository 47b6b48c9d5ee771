//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend endpoint and its host identity
//! - Track liveness (Alive/NotAlive) behind a lock owned by this backend only
//! - Own the local demo server when the proxy hosts the backend itself
//!
//! # State Transitions
//! ```text
//! Alive ⇄ NotAlive   (health monitor only)
//! *     → Removed    (pool removal, terminal)
//! ```

use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::demo::DemoServer;
use crate::load_balancer::error::PoolError;

/// Liveness state of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Alive,
    NotAlive,
    /// Removed from the pool. Never leaves this state.
    Removed,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Alive => "alive",
            HealthState::NotAlive => "not_alive",
            HealthState::Removed => "removed",
        }
    }
}

/// Parsed backend address.
///
/// The host identity (`host:port`, default port filled in) is what the hash
/// ring stores and what the pool matches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendAddr {
    url: Url,
    identity: String,
}

impl BackendAddr {
    /// Parse a backend address. A bare `host:port` is treated as `http://host:port`.
    pub fn parse(raw: &str) -> Result<Self, PoolError> {
        let raw = raw.trim();
        let invalid = |reason: &str| PoolError::InvalidAddress {
            address: raw.to_string(),
            reason: reason.to_string(),
        };

        let url = if raw.contains("://") {
            Url::parse(raw)
        } else {
            Url::parse(&format!("http://{}", raw))
        }
        .map_err(|e| invalid(&e.to_string()))?;

        if url.scheme() != "http" {
            return Err(invalid("only http backends are supported"));
        }
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port"))?;

        let identity = format!("{}:{}", host, port);
        Ok(Self { url, identity })
    }

    /// `host:port` identity.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Scheme and authority, e.g. `http://10.0.0.1:8080`.
    pub fn origin(&self) -> String {
        format!("{}://{}", self.url.scheme(), self.identity)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl FromStr for BackendAddr {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for BackendAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.origin())
    }
}

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    addr: BackendAddr,
    /// Share of the weighted rotation (>= 1).
    weight: u32,
    state: RwLock<HealthState>,
    local: Mutex<Option<DemoServer>>,
}

impl Backend {
    /// Create a new backend. Backends start alive.
    pub fn new(addr: BackendAddr, weight: u32) -> Self {
        Self {
            addr,
            weight: weight.max(1),
            state: RwLock::new(HealthState::Alive),
            local: Mutex::new(None),
        }
    }

    pub fn addr(&self) -> &BackendAddr {
        &self.addr
    }

    pub fn identity(&self) -> &str {
        self.addr.identity()
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn state(&self) -> HealthState {
        *self.state.read()
    }

    /// True only while the backend is in the `Alive` state.
    pub fn is_alive(&self) -> bool {
        self.state() == HealthState::Alive
    }

    /// Record a liveness observation.
    ///
    /// Returns the previous state when this call changed it. A removed
    /// backend ignores the observation.
    pub fn set_alive(&self, alive: bool) -> Option<HealthState> {
        let mut state = self.state.write();
        let next = match (*state, alive) {
            (HealthState::Removed, _) => return None,
            (_, true) => HealthState::Alive,
            (_, false) => HealthState::NotAlive,
        };
        if *state == next {
            return None;
        }
        Some(std::mem::replace(&mut *state, next))
    }

    /// Hand ownership of a locally hosted server to this backend.
    pub fn attach_local(&self, server: DemoServer) {
        if let Some(mut previous) = self.local.lock().replace(server) {
            previous.stop();
        }
    }

    /// Whether this backend owns a locally hosted server.
    pub fn is_local(&self) -> bool {
        self.local.lock().is_some()
    }

    /// Mark the backend removed and release its local listener, if any.
    pub fn stop(&self) {
        *self.state.write() = HealthState::Removed;
        if let Some(mut server) = self.local.lock().take() {
            tracing::info!(backend = %self.addr, "Stopping local backend server");
            server.stop();
        }
    }
}
