//! Routing strategies and mode-based dispatch.

pub mod directory;
pub mod dtn;
pub mod low_latency;
pub mod onion;

pub use directory::{HopResolver, NetworkMap, PeerDirectory};
pub use dtn::{DtnFragment, DtnReassembly, DtnRouter};
pub use low_latency::LowLatencyRouter;
pub use onion::{OnionCell, OnionRouter, RelayOutcome};

use crate::config::ObscuraConfig;
use crate::error::{Result, RoutingError};
use crate::node::SecureNode;
use crate::packet::{Packet, RoutingMode};
use crate::types::NodeId;
use async_trait::async_trait;
use std::sync::Arc;

/// Outbound message for any strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub receiver_id: NodeId,
    /// Full onion route including the sender; ignored by the other modes
    pub route: Vec<NodeId>,
    pub message: Vec<u8>,
}

impl SendRequest {
    pub fn direct(receiver_id: impl Into<NodeId>, message: impl Into<Vec<u8>>) -> Self {
        Self {
            receiver_id: receiver_id.into(),
            route: Vec::new(),
            message: message.into(),
        }
    }

    /// An onion request along `route`, delivered to its last entry.
    pub fn routed(route: Vec<NodeId>, message: impl Into<Vec<u8>>) -> Result<Self> {
        let receiver_id = route
            .last()
            .cloned()
            .ok_or_else(|| RoutingError::InvalidPath("empty route".to_string()))?;
        Ok(Self {
            receiver_id,
            route,
            message: message.into(),
        })
    }
}

/// What a strategy produced from inbound packets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Message(Vec<u8>),
    Forward(Packet),
    Bulk(DtnReassembly),
}

impl Delivery {
    /// The delivered bytes, if this node was the final recipient.
    pub fn into_message(self) -> Option<Vec<u8>> {
        match self {
            Delivery::Message(message) => Some(message),
            Delivery::Bulk(reassembly) if reassembly.is_complete() => Some(reassembly.message),
            _ => None,
        }
    }
}

/// Common interface of all routing modes.
#[async_trait]
pub trait RoutingStrategy: Send + Sync {
    fn mode(&self) -> RoutingMode;

    async fn send(&self, request: SendRequest) -> Result<Vec<Packet>>;

    async fn receive(&self, packets: Vec<Packet>) -> Result<Delivery>;
}

fn single(packets: Vec<Packet>) -> Result<Packet> {
    let count = packets.len();
    let mut packets = packets.into_iter();
    match (packets.next(), packets.next()) {
        (Some(packet), None) => Ok(packet),
        _ => Err(RoutingError::Malformed(format!("expected exactly one packet, got {}", count)).into()),
    }
}

#[async_trait]
impl RoutingStrategy for LowLatencyRouter {
    fn mode(&self) -> RoutingMode {
        RoutingMode::LowLatency
    }

    async fn send(&self, request: SendRequest) -> Result<Vec<Packet>> {
        Ok(vec![LowLatencyRouter::send(self, &request.receiver_id, &request.message)?])
    }

    async fn receive(&self, packets: Vec<Packet>) -> Result<Delivery> {
        let packet = single(packets)?;
        Ok(Delivery::Message(LowLatencyRouter::receive(self, &packet)?))
    }
}

#[async_trait]
impl RoutingStrategy for OnionRouter {
    fn mode(&self) -> RoutingMode {
        RoutingMode::Onion
    }

    async fn send(&self, request: SendRequest) -> Result<Vec<Packet>> {
        let route = if request.route.is_empty() {
            vec![self.node().node_id().clone(), request.receiver_id]
        } else {
            request.route
        };
        Ok(vec![self.create_onion_message(&route, &request.message)?])
    }

    async fn receive(&self, packets: Vec<Packet>) -> Result<Delivery> {
        Ok(match self.relay(single(packets)?).await? {
            RelayOutcome::Forward(packet) => Delivery::Forward(packet),
            RelayOutcome::Deliver(message) => Delivery::Message(message),
        })
    }
}

#[async_trait]
impl RoutingStrategy for DtnRouter {
    fn mode(&self) -> RoutingMode {
        RoutingMode::Dtn
    }

    async fn send(&self, request: SendRequest) -> Result<Vec<Packet>> {
        self.send_bulk(&request.receiver_id, &request.message)
    }

    async fn receive(&self, packets: Vec<Packet>) -> Result<Delivery> {
        Ok(Delivery::Bulk(self.receive_bulk(&packets)?))
    }
}

/// Closed set of routing strategies, selected by mode tag.
#[derive(Debug, Clone)]
pub enum Router {
    LowLatency(LowLatencyRouter),
    Onion(OnionRouter),
    Dtn(DtnRouter),
}

impl Router {
    pub fn for_mode(
        mode: RoutingMode,
        node: Arc<SecureNode>,
        directory: Arc<dyn PeerDirectory>,
        config: &ObscuraConfig,
    ) -> Self {
        match mode {
            RoutingMode::LowLatency => Router::LowLatency(LowLatencyRouter::new(node, &config.routing)),
            RoutingMode::Onion => Router::Onion(OnionRouter::new(node, directory, &config.admission)),
            RoutingMode::Dtn => Router::Dtn(DtnRouter::new(node, &config.routing)),
        }
    }

    fn strategy(&self) -> &dyn RoutingStrategy {
        match self {
            Router::LowLatency(router) => router,
            Router::Onion(router) => router,
            Router::Dtn(router) => router,
        }
    }
}

#[async_trait]
impl RoutingStrategy for Router {
    fn mode(&self) -> RoutingMode {
        self.strategy().mode()
    }

    async fn send(&self, request: SendRequest) -> Result<Vec<Packet>> {
        self.strategy().send(request).await
    }

    async fn receive(&self, packets: Vec<Packet>) -> Result<Delivery> {
        self.strategy().receive(packets).await
    }
}
