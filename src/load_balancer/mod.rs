//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → pool.rs (load topology snapshot: backends + ring)
//!     → Apply the configured strategy:
//!         - round_robin.rs (rotate through backends)
//!         - consistent_hash.rs (ring lookup keyed by client address)
//!         - weighted.rs (rotation proportional to weight)
//!     → backend.rs (liveness check)
//!     → http::proxy (forward request, relay response)
//! ```
//!
//! # Design Decisions
//! - Strategies are stateless over the topology; cursors live in the strategy
//! - The `(backends, ring)` pair is swapped as one snapshot
//! - Liveness is per-backend, read fresh on every routing call

pub mod backend;
pub mod consistent_hash;
pub mod error;
pub mod pool;
pub mod ring;
pub mod round_robin;
pub mod weighted;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::load_balancer::backend::Backend;
use crate::load_balancer::error::UnknownStrategy;
use crate::load_balancer::pool::Topology;

/// A backend selection algorithm.
pub trait LoadBalancer: Send + Sync + fmt::Debug {
    /// Pick a backend from `topology`. `key` identifies the client for
    /// strategies with affinity; others ignore it.
    fn next_server(&self, topology: &Topology, key: &str) -> Option<Arc<Backend>>;
}

/// Strategy names accepted by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    RoundRobin,
    ConsistentHashing,
    WeightedRoundRobin,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::RoundRobin => "roundrobin",
            Strategy::ConsistentHashing => "consistentHashing",
            Strategy::WeightedRoundRobin => "weightedRoundRobin",
        }
    }
}

impl FromStr for Strategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "roundrobin" => Ok(Strategy::RoundRobin),
            "consistentHashing" => Ok(Strategy::ConsistentHashing),
            "weightedRoundRobin" => Ok(Strategy::WeightedRoundRobin),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
