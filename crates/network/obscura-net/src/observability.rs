//! Tracing bootstrap and status reporting.

use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing_subscriber::EnvFilter;

/// Installs a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive`. Safe to call more than once.
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Point-in-time view of a node's admission and session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub node_id: NodeId,
    pub reputation: BTreeMap<NodeId, u32>,
    pub pow_difficulty: u32,
    pub trusted_nodes: Vec<NodeId>,
    pub connected_peers: Vec<NodeId>,
}

fn join_ids(ids: &[NodeId]) -> String {
    if ids.is_empty() {
        return "none".to_string();
    }
    ids.iter().map(NodeId::as_str).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "node {}", self.node_id)?;
        writeln!(f, "  pow difficulty: {}", self.pow_difficulty)?;
        writeln!(f, "  connected peers: {}", join_ids(&self.connected_peers))?;
        writeln!(f, "  trusted nodes: {}", join_ids(&self.trusted_nodes))?;
        if self.reputation.is_empty() {
            write!(f, "  reputation: none recorded")
        } else {
            write!(f, "  reputation:")?;
            for (peer, score) in &self.reputation {
                write!(f, "\n    {}: {}", peer, score)?;
            }
            Ok(())
        }
    }
}
