//! Layered multi-hop routing.
//!
//! The originator wraps the message once per hop, innermost layer for the
//! final hop. Each layer decrypts to an [`OnionCell`] naming the next hop and
//! carrying the still-sealed remainder, so a relay learns only its neighbours.
//! Before peeling, a relay makes its upstream pay with an admission puzzle
//! unless that upstream is trusted.

use crate::admission::PuzzleSolver;
use crate::config::AdmissionConfig;
use crate::crypto::SealedMessage;
use crate::error::{AdmissionError, ObscuraError, Result, RoutingError};
use crate::node::SecureNode;
use crate::packet::{Packet, RoutingMode};
use crate::routing::directory::{HopResolver, PeerDirectory};
use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

const MODE: RoutingMode = RoutingMode::Onion;

/// Plaintext of one onion layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnionCell {
    /// `None` at the final hop
    pub next_hop: Option<NodeId>,
    /// Bincode of the next layer's sealed message, or the message itself
    pub body: Vec<u8>,
}

/// What a relay does with a packet after peeling its layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Forward(Packet),
    Deliver(Vec<u8>),
}

/// Checks a route: local node first, at least one hop, no hop repeated back to back.
pub fn validate_path(local: &NodeId, path: &[NodeId]) -> Result<()> {
    if path.len() < 2 {
        return Err(RoutingError::InvalidPath(format!(
            "route needs the origin and at least one hop, got {} entries",
            path.len()
        ))
        .into());
    }
    if &path[0] != local {
        return Err(RoutingError::InvalidPath(format!("route starts at {}, not {}", path[0], local)).into());
    }
    if let Some(pair) = path.windows(2).find(|pair| pair[0] == pair[1]) {
        return Err(RoutingError::InvalidPath(format!("{} appears twice in a row", pair[0])).into());
    }
    Ok(())
}

#[derive(Clone)]
pub struct OnionRouter {
    node: Arc<SecureNode>,
    directory: Arc<dyn PeerDirectory>,
    solver: PuzzleSolver,
}

impl std::fmt::Debug for OnionRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnionRouter")
            .field("node", self.node.node_id())
            .field("solve_timeout", &self.solver.timeout())
            .finish()
    }
}

impl OnionRouter {
    pub fn new(node: Arc<SecureNode>, directory: Arc<dyn PeerDirectory>, config: &AdmissionConfig) -> Self {
        Self {
            node,
            directory,
            solver: PuzzleSolver::from_config(config),
        }
    }

    pub fn node(&self) -> &Arc<SecureNode> {
        &self.node
    }

    /// The same router configuration acting as `node`.
    fn acting_as(&self, node: Arc<SecureNode>) -> Self {
        Self {
            node,
            directory: self.directory.clone(),
            solver: self.solver.clone(),
        }
    }

    fn ensure_session(&self, peer_id: &NodeId) -> Result<()> {
        if self.node.has_session(peer_id) {
            return Ok(());
        }
        let key = self
            .directory
            .public_key(peer_id)
            .ok_or_else(|| RoutingError::PeerUnknown(peer_id.clone()))?;
        self.node.establish_session(peer_id, &key)
    }

    /// Wraps `message` for `path` and returns the packet for the first hop.
    pub fn create_onion_message(&self, path: &[NodeId], message: &[u8]) -> Result<Packet> {
        validate_path(self.node.node_id(), path)?;

        let mut layer: Option<SealedMessage> = None;
        let mut next_hop: Option<NodeId> = None;
        for hop in path[1..].iter().rev() {
            self.ensure_session(hop)?;
            let body = match layer.take() {
                Some(inner) => bincode::serialize(&inner)?,
                None => message.to_vec(),
            };
            let cell = OnionCell {
                next_hop: next_hop.take(),
                body,
            };
            layer = Some(self.node.encrypt_for(hop, &bincode::serialize(&cell)?, MODE.associated_data())?);
            next_hop = Some(hop.clone());
        }

        let outer = layer.ok_or_else(|| RoutingError::InvalidPath("route has no hops".to_string()))?;
        let packet = Packet::sealed(self.node.node_id().clone(), path[1].clone(), MODE, outer);
        info!(packet = %packet.id, hops = path.len() - 1, "onion message built");
        Ok(packet)
    }

    /// Makes `upstream` pay for relaying unless it is trusted here or the
    /// route's origin vouches for this hop.
    async fn admit(&self, upstream: &NodeId, vouched: bool) -> Result<()> {
        if self.node.is_flagged(upstream) {
            warn!(node = %self.node.node_id(), upstream = %upstream, "flagged upstream refused");
            return Err(AdmissionError::SolutionRejected { node: upstream.clone() }.into());
        }
        if vouched {
            debug!(node = %self.node.node_id(), "hop trusted by origin, puzzle skipped");
            return Ok(());
        }
        if !self.node.requires_puzzle(upstream) {
            debug!(node = %self.node.node_id(), upstream = %upstream, "trusted upstream, puzzle skipped");
            return Ok(());
        }

        let puzzle = self.node.issue_puzzle();
        let solution = self.solver.solve(puzzle.clone()).await?;
        if !self.node.verify_solution(upstream, &puzzle, solution.nonce) {
            return Err(AdmissionError::SolutionRejected { node: upstream.clone() }.into());
        }
        debug!(
            node = %self.node.node_id(),
            upstream = %upstream,
            difficulty = puzzle.difficulty,
            attempts = solution.attempts,
            "relay admitted"
        );
        Ok(())
    }

    /// Handles one onion packet addressed to this node.
    pub async fn relay(&self, packet: Packet) -> Result<RelayOutcome> {
        self.relay_with(packet, false).await
    }

    async fn relay_with(&self, packet: Packet, vouched: bool) -> Result<RelayOutcome> {
        packet.expect_mode(MODE)?;
        if &packet.receiver_id != self.node.node_id() {
            return Err(RoutingError::Malformed(format!(
                "packet {} is addressed to {}",
                packet.id, packet.receiver_id
            ))
            .into());
        }
        let upstream = packet.sender_id.clone();
        self.admit(&upstream, vouched).await?;

        let sealed = packet.sealed_message()?;
        let origin = sealed.sender_id.clone();
        self.ensure_session(&origin)?;
        match self.open_layer(&origin, &sealed) {
            Ok(outcome) => {
                self.node.record_relay_success(&upstream);
                Ok(outcome)
            }
            Err(err) => {
                self.node.record_relay_failure(&upstream);
                Err(err)
            }
        }
    }

    fn open_layer(&self, origin: &NodeId, sealed: &SealedMessage) -> Result<RelayOutcome> {
        let cell = self.peel(origin, sealed)?;
        match cell.next_hop {
            None => Ok(RelayOutcome::Deliver(cell.body)),
            Some(next) => {
                let inner: SealedMessage = bincode::deserialize(&cell.body)?;
                let forward = Packet::sealed(self.node.node_id().clone(), next, MODE, inner);
                debug!(node = %self.node.node_id(), next = %forward.receiver_id, "onion layer peeled");
                Ok(RelayOutcome::Forward(forward))
            }
        }
    }

    fn peel(&self, origin: &NodeId, sealed: &SealedMessage) -> Result<OnionCell> {
        let plaintext = self.node.decrypt_from(origin, sealed)?;
        Ok(bincode::deserialize(&plaintext)?)
    }

    async fn hop(&self, hop: &NodeId, packet: Packet, resolver: &dyn HopResolver) -> Result<RelayOutcome> {
        let vouched = self.node.is_trusted(hop);
        if &packet.receiver_id != hop {
            return Err(RoutingError::Malformed(format!(
                "expected packet for {}, got one for {}",
                hop, packet.receiver_id
            ))
            .into());
        }
        let node = resolver
            .node(hop)
            .ok_or_else(|| RoutingError::PeerUnknown(hop.clone()))?;
        self.acting_as(node).relay_with(packet, vouched).await
    }

    /// Walks `packet` along `path`, letting each hop's node relay it, and
    /// returns what the final hop delivers. Hops in this node's trusted set
    /// relay without an admission puzzle.
    pub async fn process_packet(&self, packet: Packet, path: &[NodeId], resolver: &dyn HopResolver) -> Result<Vec<u8>> {
        let origin = path
            .first()
            .ok_or_else(|| RoutingError::InvalidPath("empty route".to_string()))?;
        validate_path(origin, path)?;

        let last = path.len() - 1;
        let mut current = packet;
        for (index, hop) in path.iter().enumerate().skip(1) {
            let outcome = self
                .hop(hop, current, resolver)
                .await
                .and_then(|outcome| {
                    let forwards = matches!(outcome, RelayOutcome::Forward(_));
                    if forwards && index == last {
                        Err(RoutingError::Malformed("onion continues past the end of the route".to_string()).into())
                    } else if !forwards && index != last {
                        Err(RoutingError::Malformed("onion delivered before the end of the route".to_string()).into())
                    } else {
                        Ok(outcome)
                    }
                })
                .map_err(|source| hop_failed(hop, source))?;

            match outcome {
                RelayOutcome::Forward(next) => current = next,
                RelayOutcome::Deliver(message) => {
                    info!(hops = last, bytes = message.len(), "onion message delivered");
                    return Ok(message);
                }
            }
        }
        Err(RoutingError::InvalidPath("route ended without delivery".to_string()).into())
    }
}

fn hop_failed(hop: &NodeId, source: ObscuraError) -> ObscuraError {
    warn!(hop = %hop, kind = source.observable_type(), "onion hop failed");
    RoutingError::HopFailed {
        hop: hop.clone(),
        source: Box::new(source),
    }
    .into()
}
