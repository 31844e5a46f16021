//! Lookups routers need from the surrounding network.

use crate::crypto::PUBLIC_KEY_LEN;
use crate::node::SecureNode;
use crate::types::NodeId;
use std::collections::HashMap;
use std::sync::Arc;

/// Out-of-band source of peer public keys.
pub trait PeerDirectory: Send + Sync {
    fn public_key(&self, node_id: &NodeId) -> Option<[u8; PUBLIC_KEY_LEN]>;
}

/// Resolves a hop id to the node that handles packets for it.
pub trait HopResolver: Send + Sync {
    fn node(&self, node_id: &NodeId) -> Option<Arc<SecureNode>>;
}

/// In-memory map of simulated nodes.
#[derive(Debug, Clone, Default)]
pub struct NetworkMap {
    nodes: HashMap<NodeId, Arc<SecureNode>>,
}

impl NetworkMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: Arc<SecureNode>) {
        self.nodes.insert(node.node_id().clone(), node);
    }

    pub fn with_node(mut self, node: Arc<SecureNode>) -> Self {
        self.insert(node);
        self
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl PeerDirectory for NetworkMap {
    fn public_key(&self, node_id: &NodeId) -> Option<[u8; PUBLIC_KEY_LEN]> {
        self.nodes.get(node_id).map(|node| node.public_key())
    }
}

impl HopResolver for NetworkMap {
    fn node(&self, node_id: &NodeId) -> Option<Arc<SecureNode>> {
        self.nodes.get(node_id).cloned()
    }
}

impl PeerDirectory for HashMap<NodeId, [u8; PUBLIC_KEY_LEN]> {
    fn public_key(&self, node_id: &NodeId) -> Option<[u8; PUBLIC_KEY_LEN]> {
        self.get(node_id).copied()
    }
}
