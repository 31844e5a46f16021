//! Direct single-hop routing for small messages.

use crate::config::RoutingConfig;
use crate::error::{Result, RoutingError};
use crate::node::SecureNode;
use crate::packet::{Packet, RoutingMode};
use crate::types::NodeId;
use std::sync::Arc;
use tracing::debug;

const MODE: RoutingMode = RoutingMode::LowLatency;

/// Encrypts straight to the receiver with no intermediate hops.
#[derive(Debug, Clone)]
pub struct LowLatencyRouter {
    node: Arc<SecureNode>,
    max_bytes: usize,
}

impl LowLatencyRouter {
    pub fn new(node: Arc<SecureNode>, config: &RoutingConfig) -> Self {
        Self {
            node,
            max_bytes: config.low_latency_max_bytes,
        }
    }

    pub fn node(&self) -> &Arc<SecureNode> {
        &self.node
    }

    /// Seals `message` for `receiver_id` into one packet.
    pub fn send(&self, receiver_id: &NodeId, message: &[u8]) -> Result<Packet> {
        if message.len() > self.max_bytes {
            return Err(RoutingError::MessageTooLarge {
                size: message.len(),
                limit: self.max_bytes,
            }
            .into());
        }
        if !self.node.has_session(receiver_id) {
            return Err(RoutingError::PeerUnknown(receiver_id.clone()).into());
        }

        let sealed = self.node.encrypt_for(receiver_id, message, MODE.associated_data())?;
        let packet = Packet::sealed(self.node.node_id().clone(), receiver_id.clone(), MODE, sealed);
        debug!(packet = %packet.id, receiver = %receiver_id, "low-latency packet sealed");
        Ok(packet)
    }

    /// Opens a low-latency packet addressed to this node.
    pub fn receive(&self, packet: &Packet) -> Result<Vec<u8>> {
        packet.expect_mode(MODE)?;
        if &packet.receiver_id != self.node.node_id() {
            return Err(RoutingError::Malformed(format!(
                "packet {} is addressed to {}",
                packet.id, packet.receiver_id
            ))
            .into());
        }
        let sealed = packet.sealed_message()?;
        if sealed.associated_data != MODE.associated_data() {
            return Err(RoutingError::Malformed(format!(
                "packet {} sealed with foreign associated data",
                packet.id
            ))
            .into());
        }
        self.node.decrypt_from(&sealed.sender_id, &sealed)
    }
}
