//! Consistent hash ring.
//!
//! Positions are 32-bit FNV-1a hashes. A key is owned by the first position
//! at or after its own hash, wrapping to the lowest position. Adding or
//! removing a node only moves the keys between that node's positions and
//! their predecessors.

use std::collections::{BTreeMap, HashMap};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a.
pub fn fnv1a32(data: &[u8]) -> u32 {
    data.iter()
        .fold(FNV_OFFSET_BASIS, |hash, byte| {
            (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
        })
}

/// Hash ring mapping routing keys to node identities.
#[derive(Debug, Clone)]
pub struct HashRing {
    /// Position -> owning identity. Iteration order is the ring order.
    positions: BTreeMap<u32, String>,
    /// Identity -> positions it owns.
    owners: HashMap<String, Vec<u32>>,
    /// Positions per identity.
    replicas: usize,
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(1)
    }
}

impl HashRing {
    /// Create an empty ring placing `replicas` positions per node.
    pub fn new(replicas: usize) -> Self {
        Self {
            positions: BTreeMap::new(),
            owners: HashMap::new(),
            replicas: replicas.max(1),
        }
    }

    /// Place a node on the ring. Returns false if it was already present.
    pub fn add(&mut self, identity: &str) -> bool {
        if self.owners.contains_key(identity) {
            return false;
        }

        let mut owned = Vec::with_capacity(self.replicas);
        for replica in 0..self.replicas {
            let position = self.free_position(identity, replica);
            self.positions.insert(position, identity.to_string());
            owned.push(position);
        }
        self.owners.insert(identity.to_string(), owned);
        true
    }

    /// Remove a node and all of its positions. Returns false if absent.
    pub fn remove(&mut self, identity: &str) -> bool {
        match self.owners.remove(identity) {
            Some(owned) => {
                for position in owned {
                    self.positions.remove(&position);
                }
                true
            }
            None => false,
        }
    }

    /// Identity owning `key`, or `None` for an empty ring.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        let hash = fnv1a32(key.as_bytes());
        self.positions
            .range(hash..)
            .next()
            .or_else(|| self.positions.iter().next())
            .map(|(_, identity)| identity.as_str())
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.owners.contains_key(identity)
    }

    /// Positions owned by `identity`, in placement order.
    pub fn positions(&self, identity: &str) -> &[u32] {
        self.owners.get(identity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of positions on the ring.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Number of distinct nodes on the ring.
    pub fn node_count(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Replica 0 sits at `hash(identity)`; further replicas at
    /// `hash("identity#i")`. A position taken by another node is salted
    /// with `~n` until a free one is found.
    fn free_position(&self, identity: &str, replica: usize) -> u32 {
        let base = if replica == 0 {
            identity.to_string()
        } else {
            format!("{}#{}", identity, replica)
        };

        let mut position = fnv1a32(base.as_bytes());
        let mut salt = 0u32;
        while self.positions.contains_key(&position) {
            salt += 1;
            tracing::debug!(identity, replica, salt, "Ring position collision, salting");
            position = fnv1a32(format!("{}~{}", base, salt).as_bytes());
        }
        position
    }
}
