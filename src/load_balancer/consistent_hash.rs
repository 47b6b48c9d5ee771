//! Consistent hashing strategy.
//!
//! Routes a client to the ring owner of its routing key, giving session
//! affinity without cookies. The ring returns a host identity which is
//! resolved back to the handle in the same snapshot.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::HashKey;
use crate::load_balancer::{backend::Backend, pool::Topology, LoadBalancer};

/// Ring lookup selector.
#[derive(Debug, Default)]
pub struct ConsistentHash;

impl ConsistentHash {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for ConsistentHash {
    fn next_server(&self, topology: &Topology, key: &str) -> Option<Arc<Backend>> {
        let identity = topology.ring().lookup(key)?;
        topology.find(identity)
    }
}

impl HashKey {
    /// Routing key for a client connecting from `addr`.
    pub fn routing_key(&self, addr: SocketAddr) -> String {
        match self {
            HashKey::ClientIp => addr.ip().to_string(),
            HashKey::RemoteAddr => addr.to_string(),
        }
    }
}
