//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{backend::Backend, pool::Topology, LoadBalancer};

/// Round-robin selector.
///
/// Every call takes a distinct cursor value, so N consecutive calls over N
/// backends visit each one exactly once. Liveness is not consulted here:
/// the pool rejects a dead pick instead of skipping it.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, topology: &Topology, _key: &str) -> Option<Arc<Backend>> {
        let backends = topology.backends();
        if backends.is_empty() {
            return None;
        }

        let cursor = self.counter.fetch_add(1, Ordering::Relaxed);
        backends.get(cursor % backends.len()).cloned()
    }
}
