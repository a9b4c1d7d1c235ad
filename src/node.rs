//! Cluster participant registry. Grounded on the original server's
//! `node.cc`: a registry keyed by lower-cased name, plus atomically
//! replaceable `local_node`/`leader_node` references. Raft-style leader
//! election itself is out of scope (§ Non-goals); this module only gives
//! the rest of the crate somewhere to read "who is the leader" from.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub addr: Ipv4Addr,
    pub http_port: u16,
    pub binary_port: u16,
    pub idx: usize,
    /// Epoch seconds of last contact; 0 means inactive.
    pub touched: u64,
}

impl Node {
    pub fn new(name: impl Into<String>, addr: Ipv4Addr, http_port: u16, binary_port: u16, idx: usize) -> Self {
        Node {
            name: name.into(),
            addr,
            http_port,
            binary_port,
            idx,
            touched: 0,
        }
    }

    pub fn lower_name(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn is_active(&self) -> bool {
        self.touched != 0
    }
}

impl Default for Node {
    fn default() -> Self {
        Node {
            name: String::new(),
            addr: Ipv4Addr::UNSPECIFIED,
            http_port: 0,
            binary_port: 0,
            idx: 0,
            touched: 0,
        }
    }
}

/// Registry of cluster participants, keyed by `lower(name)`, plus atomically
/// swappable `local_node`/`leader_node` pointers. A single `RwLock`-guarded
/// map stands in for the original's separate mutex + `atomic_shared_ptr`
/// pair; readers vastly outnumber writers here (node registry changes are
/// rare), so a `RwLock` serves the same purpose as the original's pairing of
/// a registry mutex with lock-free reads of the active pointers.
pub struct NodeRegistry {
    nodes: RwLock<HashMap<String, Arc<Node>>>,
    local_node: RwLock<Arc<Node>>,
    leader_node: RwLock<Arc<Node>>,
    total_nodes: AtomicU64,
    active_nodes: AtomicU64,
}

impl NodeRegistry {
    pub fn new() -> Self {
        NodeRegistry {
            nodes: RwLock::new(HashMap::new()),
            local_node: RwLock::new(Arc::new(Node::default())),
            leader_node: RwLock::new(Arc::new(Node::default())),
            total_nodes: AtomicU64::new(0),
            active_nodes: AtomicU64::new(0),
        }
    }

    pub fn upsert(&self, node: Node) -> Arc<Node> {
        let key = node.lower_name();
        let was_active = node.is_active();
        let node = Arc::new(node);

        let mut nodes = self.nodes.write().unwrap();
        let replaced_active = nodes
            .get(&key)
            .map(|existing| existing.is_active())
            .unwrap_or(false);
        if nodes.insert(key.clone(), node.clone()).is_none() {
            self.total_nodes.fetch_add(1, Ordering::Relaxed);
        }
        drop(nodes);

        match (replaced_active, was_active) {
            (false, true) => {
                self.active_nodes.fetch_add(1, Ordering::Relaxed);
            }
            (true, false) => {
                self.active_nodes.fetch_sub(1, Ordering::Relaxed);
            }
            _ => {}
        }

        self.update_atomic_refs(&key, &node);
        node
    }

    fn update_atomic_refs(&self, lower_name: &str, node: &Arc<Node>) {
        let mut local = self.local_node.write().unwrap();
        if local.lower_name() == lower_name {
            *local = node.clone();
        }
        drop(local);

        let mut leader = self.leader_node.write().unwrap();
        if leader.lower_name() == lower_name {
            *leader = node.clone();
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Node>> {
        self.nodes.read().unwrap().get(&name.to_lowercase()).cloned()
    }

    pub fn local_node(&self) -> Arc<Node> {
        self.local_node.read().unwrap().clone()
    }

    pub fn set_local_node(&self, node: Node) -> Arc<Node> {
        let node = self.upsert(node);
        *self.local_node.write().unwrap() = node.clone();
        node
    }

    pub fn leader_node(&self) -> Arc<Node> {
        self.leader_node.read().unwrap().clone()
    }

    pub fn set_leader_node(&self, node: Node) -> Arc<Node> {
        let node = self.upsert(node);
        *self.leader_node.write().unwrap() = node.clone();
        node
    }

    pub fn total_nodes(&self) -> u64 {
        self.total_nodes.load(Ordering::Relaxed)
    }

    pub fn active_nodes(&self) -> u64 {
        self.active_nodes.load(Ordering::Relaxed)
    }

    /// Every registered node, for the `_nodes` HTTP command (spec.md §4.5
    /// dispatch table).
    pub fn all(&self) -> Vec<Arc<Node>> {
        self.nodes.read().unwrap().values().cloned().collect()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        NodeRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_keyed_by_lowercase_name() {
        let registry = NodeRegistry::new();
        registry.upsert(Node::new("Node-A", Ipv4Addr::new(127, 0, 0, 1), 8880, 9999, 0));
        assert!(registry.get("node-a").is_some());
        assert!(registry.get("NODE-A").is_some());
    }

    #[test]
    fn setting_local_node_updates_registry_and_pointer() {
        let registry = NodeRegistry::new();
        let mut node = Node::new("local", Ipv4Addr::new(10, 0, 0, 1), 8880, 9999, 0);
        node.touched = 1;
        registry.set_local_node(node);

        assert_eq!(registry.local_node().name, "local");
        assert_eq!(registry.get("local").unwrap().name, "local");
        assert_eq!(registry.active_nodes(), 1);
    }

    #[test]
    fn updating_local_node_keeps_leader_pointer_in_sync() {
        let registry = NodeRegistry::new();
        let mut node = Node::new("leader", Ipv4Addr::new(10, 0, 0, 2), 8880, 9999, 1);
        node.touched = 1;
        registry.set_leader_node(node.clone());

        node.touched = 2;
        registry.upsert(node);

        assert_eq!(registry.leader_node().touched, 2);
    }
}
