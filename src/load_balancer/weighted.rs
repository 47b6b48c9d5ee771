//! Weighted round-robin strategy.
//!
//! Each backend occupies `weight` consecutive slots of the rotation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{backend::Backend, pool::Topology, LoadBalancer};

#[derive(Debug, Default)]
pub struct WeightedRoundRobin {
    counter: AtomicUsize,
}

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for WeightedRoundRobin {
    fn next_server(&self, topology: &Topology, _key: &str) -> Option<Arc<Backend>> {
        let backends = topology.backends();
        let total: usize = backends.iter().map(|b| b.weight() as usize).sum();
        if total == 0 {
            return None;
        }

        let mut slot = self.counter.fetch_add(1, Ordering::Relaxed) % total;
        for backend in backends {
            let weight = backend.weight() as usize;
            if slot < weight {
                return Some(backend.clone());
            }
            slot -= weight;
        }
        None
    }
}
