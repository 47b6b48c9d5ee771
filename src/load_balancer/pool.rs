//! Backend pool management.
//!
//! # Responsibilities
//! - Own the `(backends, ring)` topology and keep the two in 1:1
//!   correspondence by host identity
//! - Dispatch routing calls to the named strategy
//! - Proxy the request to the chosen backend through the pooled upstream
//! - Add and remove backends at runtime
//!
//! # Concurrency
//! Readers load an immutable `Topology` snapshot through `ArcSwap` and never
//! block. Writers serialize on `writer`, clone the current topology, apply
//! the ring and sequence change together and publish the result, so no
//! reader can observe one without the other.

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::{Request, Response};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::{HashKey, ProxyConfig, TimeoutConfig};
use crate::demo::DemoServer;
use crate::http::proxy::{RoutedTo, Upstream};
use crate::load_balancer::{
    backend::{Backend, BackendAddr},
    consistent_hash::ConsistentHash,
    error::{PoolError, ProxyError},
    ring::HashRing,
    round_robin::RoundRobin,
    weighted::WeightedRoundRobin,
    LoadBalancer, Strategy,
};
use crate::observability::metrics;

/// Backend sequence and hash ring, always mutated together.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    backends: Vec<Arc<Backend>>,
    ring: HashRing,
}

impl Topology {
    pub fn new(replicas: usize) -> Self {
        Self {
            backends: Vec::new(),
            ring: HashRing::new(replicas),
        }
    }

    /// Backends in registration order.
    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    pub fn ring(&self) -> &HashRing {
        &self.ring
    }

    pub fn find(&self, identity: &str) -> Option<Arc<Backend>> {
        self.backends
            .iter()
            .find(|b| b.identity() == identity)
            .cloned()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.backends.iter().any(|b| b.identity() == identity)
    }

    /// Ring first, then the sequence. Returns false on a duplicate identity.
    pub fn insert(&mut self, backend: Arc<Backend>) -> bool {
        if self.contains(backend.identity()) {
            return false;
        }
        self.ring.add(backend.identity());
        self.backends.push(backend);
        true
    }

    /// Ring first, then the sequence.
    pub fn remove(&mut self, identity: &str) -> Option<Arc<Backend>> {
        self.ring.remove(identity);
        let index = self.backends.iter().position(|b| b.identity() == identity)?;
        Some(self.backends.remove(index))
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

/// Pool construction options.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Ring positions per backend.
    pub replicas: usize,
    /// How the consistent hashing key is derived from the client address.
    pub hash_key: HashKey,
    /// Start a demo server for every backend added to the pool.
    pub host_locally: bool,
    pub timeouts: TimeoutConfig,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            replicas: 1,
            hash_key: HashKey::default(),
            host_locally: false,
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl PoolOptions {
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            replicas: config.ring.replicas,
            hash_key: config.hash_key,
            host_locally: config.spawn_local_backends,
            timeouts: config.timeouts.clone(),
        }
    }
}

/// Outcome of reconciling the pool against a server list.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub failed: Vec<String>,
}

/// The server pool.
#[derive(Debug)]
pub struct ServerPool {
    topology: ArcSwap<Topology>,
    /// Serializes topology writers. Readers never take it.
    writer: Mutex<()>,
    round_robin: RoundRobin,
    consistent_hash: ConsistentHash,
    weighted: WeightedRoundRobin,
    options: PoolOptions,
    upstream: Upstream,
}

impl ServerPool {
    /// Create an empty pool.
    pub fn new(options: PoolOptions) -> Self {
        Self {
            topology: ArcSwap::from_pointee(Topology::new(options.replicas)),
            writer: Mutex::new(()),
            round_robin: RoundRobin::new(),
            consistent_hash: ConsistentHash::new(),
            weighted: WeightedRoundRobin::new(),
            upstream: Upstream::new(&options.timeouts),
            options,
        }
    }

    /// Current topology snapshot.
    pub fn snapshot(&self) -> Arc<Topology> {
        self.topology.load_full()
    }

    /// All backends currently in the pool.
    pub fn backends(&self) -> Vec<Arc<Backend>> {
        self.topology.load().backends().to_vec()
    }

    pub fn len(&self) -> usize {
        self.topology.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.topology.load().is_empty()
    }

    /// Number of ring positions.
    pub fn ring_len(&self) -> usize {
        self.topology.load().ring().len()
    }

    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    pub fn select_round_robin(&self) -> Option<Arc<Backend>> {
        self.round_robin.next_server(&self.topology.load(), "")
    }

    pub fn select_by_hash(&self, key: &str) -> Option<Arc<Backend>> {
        self.consistent_hash.next_server(&self.topology.load(), key)
    }

    pub fn select_weighted(&self) -> Option<Arc<Backend>> {
        self.weighted.next_server(&self.topology.load(), "")
    }

    pub fn select(&self, strategy: Strategy, key: &str) -> Option<Arc<Backend>> {
        let balancer: &dyn LoadBalancer = match strategy {
            Strategy::RoundRobin => &self.round_robin,
            Strategy::ConsistentHashing => &self.consistent_hash,
            Strategy::WeightedRoundRobin => &self.weighted,
        };
        balancer.next_server(&self.topology.load(), key)
    }

    /// Route one inbound request.
    ///
    /// An unknown strategy fails before any backend is selected. A selected
    /// backend that is not alive fails without proxying.
    pub async fn route(
        &self,
        request: Request<Body>,
        strategy: &str,
        client: SocketAddr,
    ) -> Result<Response<Body>, ProxyError> {
        let strategy: Strategy = strategy.parse()?;
        let key = self.options.hash_key.routing_key(client);

        let backend = self.select(strategy, &key).ok_or(ProxyError::NoBackend)?;
        if !backend.is_alive() {
            return Err(ProxyError::BackendDown(backend.identity().to_string()));
        }

        tracing::debug!(
            strategy = %strategy,
            client = %client,
            backend = %backend.addr(),
            "Backend selected"
        );

        let mut response = self.upstream.forward(&backend, request).await?;
        response
            .extensions_mut()
            .insert(RoutedTo(backend.identity().to_string()));
        Ok(response)
    }

    /// Insert a live backend into ring and sequence as one step.
    pub fn register(&self, addr: BackendAddr, weight: u32) -> Result<Arc<Backend>, PoolError> {
        let _guard = self.writer.lock();
        let current = self.topology.load_full();
        if current.contains(addr.identity()) {
            return Err(PoolError::AlreadyRegistered(addr.identity().to_string()));
        }

        let backend = Arc::new(Backend::new(addr, weight));
        let mut next = Topology::clone(&current);
        next.insert(backend.clone());
        let size = next.len();
        self.topology.store(Arc::new(next));

        metrics::record_pool_size(size);
        Ok(backend)
    }

    /// Remove a backend from ring and sequence as one step.
    fn deregister(&self, identity: &str) -> Option<Arc<Backend>> {
        let _guard = self.writer.lock();
        let current = self.topology.load_full();
        if !current.contains(identity) {
            return None;
        }

        let mut next = Topology::clone(&current);
        let removed = next.remove(identity);
        let size = next.len();
        self.topology.store(Arc::new(next));

        metrics::record_pool_size(size);
        removed
    }

    /// Add a backend by address. The backend is ring-addressable before its
    /// local server (if any) is started.
    pub async fn add_backend(&self, raw: &str, weight: u32) -> Result<Arc<Backend>, PoolError> {
        let addr = BackendAddr::parse(raw)?;
        let backend = self.register(addr, weight)?;

        if self.options.host_locally {
            match DemoServer::spawn(backend.identity()).await {
                Ok(server) => backend.attach_local(server),
                Err(source) => {
                    self.deregister(backend.identity());
                    backend.stop();
                    return Err(PoolError::LocalBackend {
                        identity: backend.identity().to_string(),
                        source,
                    });
                }
            }
        }

        tracing::info!(
            backend = %backend.addr(),
            weight = backend.weight(),
            pool_size = self.len(),
            "Backend added"
        );
        Ok(backend)
    }

    /// Remove a backend by address and stop it.
    pub fn remove_backend(&self, raw: &str) -> Result<Arc<Backend>, PoolError> {
        let addr = BackendAddr::parse(raw)?;
        let backend = self
            .deregister(addr.identity())
            .ok_or_else(|| PoolError::NotFound(addr.identity().to_string()))?;
        backend.stop();
        metrics::record_backend_health(backend.identity(), false);

        tracing::info!(
            backend = %backend.addr(),
            pool_size = self.len(),
            "Backend removed"
        );
        Ok(backend)
    }

    /// Add the initial server list. `weights` is parallel to `servers`;
    /// missing entries default to 1.
    pub async fn populate(&self, servers: &[String], weights: &[u32]) -> Result<(), PoolError> {
        for (index, server) in servers.iter().enumerate() {
            let weight = weights.get(index).copied().unwrap_or(1);
            self.add_backend(server, weight).await?;
        }
        Ok(())
    }

    /// Bring pool membership in line with `servers`: missing addresses are
    /// added, extra backends removed. Weights of kept backends are unchanged.
    pub async fn reconcile(&self, servers: &[String], weights: &[u32]) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let mut desired = Vec::with_capacity(servers.len());
        for (index, server) in servers.iter().enumerate() {
            match BackendAddr::parse(server) {
                Ok(addr) => desired.push((addr, weights.get(index).copied().unwrap_or(1))),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping invalid server during reconcile");
                    report.failed.push(server.clone());
                }
            }
        }

        for backend in self.backends() {
            let wanted = desired
                .iter()
                .any(|(addr, _)| addr.identity() == backend.identity());
            if !wanted && self.remove_backend(&backend.addr().origin()).is_ok() {
                report.removed.push(backend.identity().to_string());
            }
        }

        let current = self.snapshot();
        for (addr, weight) in desired {
            if current.contains(addr.identity()) {
                continue;
            }
            match self.add_backend(&addr.origin(), weight).await {
                Ok(backend) => report.added.push(backend.identity().to_string()),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to add server during reconcile");
                    report.failed.push(addr.origin());
                }
            }
        }

        report
    }
}
