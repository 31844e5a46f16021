//! Delay-tolerant bulk transfer with decoy traffic.
//!
//! Messages are cut into fixed-size fragments, each sealed separately and
//! tagged with its position so the receiver can reorder them. Dummy packets
//! are mixed in and the whole batch is shuffled before it leaves the node.

use crate::config::{check_dummy_ratio, RoutingConfig, MAX_DUMMY_RATIO};
use crate::error::{Result, RoutingError};
use crate::node::SecureNode;
use crate::packet::{Packet, RoutingMode};
use crate::types::NodeId;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const MODE: RoutingMode = RoutingMode::Dtn;

/// Plaintext of one sealed bulk fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtnFragment {
    pub message_id: Uuid,
    pub index: u32,
    pub total: u32,
    pub data: Vec<u8>,
}

/// Result of reassembling a bulk batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtnReassembly {
    /// Fragments that arrived, concatenated in index order
    pub message: Vec<u8>,
    pub expected: usize,
    pub received: usize,
    /// Real packets that failed verification or decoding
    pub dropped: usize,
    pub missing: Vec<u32>,
}

impl DtnReassembly {
    pub fn is_complete(&self) -> bool {
        self.expected > 0 && self.received == self.expected
    }

    fn empty(dropped: usize) -> Self {
        Self {
            message: Vec::new(),
            expected: 0,
            received: 0,
            dropped,
            missing: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DtnRouter {
    node: Arc<SecureNode>,
    fragment_size: usize,
    dummy_ratio: f64,
    dummy_min_bytes: usize,
    dummy_max_bytes: usize,
}

impl DtnRouter {
    pub fn new(node: Arc<SecureNode>, config: &RoutingConfig) -> Self {
        Self {
            node,
            fragment_size: config.dtn_fragment_size.max(1),
            dummy_ratio: config.dtn_dummy_ratio,
            dummy_min_bytes: config.dummy_min_bytes,
            dummy_max_bytes: config.dummy_max_bytes.max(config.dummy_min_bytes),
        }
    }

    pub fn node(&self) -> &Arc<SecureNode> {
        &self.node
    }

    /// Fragments the message; an empty message still yields one empty fragment.
    pub fn fragment_message<'a>(&self, message: &'a [u8]) -> Vec<&'a [u8]> {
        if message.is_empty() {
            return vec![message];
        }
        message.chunks(self.fragment_size).collect()
    }

    /// Number of decoys mixed in with `real` fragments at `ratio`, which is
    /// clamped to `[0, MAX_DUMMY_RATIO]`.
    pub fn dummy_count(real: usize, ratio: f64) -> usize {
        let ratio = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, MAX_DUMMY_RATIO) };
        (real as f64 * ratio).ceil() as usize
    }

    pub fn send_bulk(&self, receiver_id: &NodeId, message: &[u8]) -> Result<Vec<Packet>> {
        self.send_bulk_with_ratio(receiver_id, message, self.dummy_ratio)
    }

    /// Seals every fragment for `receiver_id`, adds decoys and shuffles the batch.
    pub fn send_bulk_with_ratio(&self, receiver_id: &NodeId, message: &[u8], ratio: f64) -> Result<Vec<Packet>> {
        check_dummy_ratio(ratio)?;
        if !self.node.has_session(receiver_id) {
            return Err(RoutingError::PeerUnknown(receiver_id.clone()).into());
        }

        let message_id = Uuid::new_v4();
        let fragments = self.fragment_message(message);
        let total = u32::try_from(fragments.len())
            .map_err(|_| RoutingError::MessageTooLarge {
                size: message.len(),
                limit: self.fragment_size.saturating_mul(u32::MAX as usize),
            })?;
        let sender = self.node.node_id().clone();

        let mut packets = Vec::with_capacity(fragments.len());
        for (index, data) in fragments.iter().enumerate() {
            let fragment = DtnFragment {
                message_id,
                index: index as u32,
                total,
                data: data.to_vec(),
            };
            let sealed = self
                .node
                .encrypt_for(receiver_id, &bincode::serialize(&fragment)?, MODE.associated_data())?;
            packets.push(Packet::sealed(sender.clone(), receiver_id.clone(), MODE, sealed));
        }

        let dummies = Self::dummy_count(packets.len(), ratio);
        let mut rng = rand::thread_rng();
        for _ in 0..dummies {
            let mut filler = vec![0u8; rng.gen_range(self.dummy_min_bytes..=self.dummy_max_bytes)];
            rng.fill_bytes(&mut filler);
            packets.push(Packet::dummy(sender.clone(), receiver_id.clone(), MODE, filler));
        }
        packets.shuffle(&mut rng);

        info!(
            receiver = %receiver_id,
            %message_id,
            fragments = total,
            dummies,
            "bulk message queued"
        );
        Ok(packets)
    }

    fn open(&self, packet: &Packet) -> Result<DtnFragment> {
        let sealed = packet.sealed_message()?;
        let plaintext = self.node.decrypt_from(&sealed.sender_id, &sealed)?;
        Ok(bincode::deserialize(&plaintext)?)
    }

    /// Discards decoys, opens the real fragments and reorders them.
    ///
    /// Fragments that fail verification are counted and skipped, so a
    /// partially damaged batch still yields what survived.
    pub fn receive_bulk(&self, packets: &[Packet]) -> Result<DtnReassembly> {
        for packet in packets {
            packet.expect_mode(MODE)?;
        }

        let mut dropped = 0;
        let mut batches: BTreeMap<Uuid, BTreeMap<u32, DtnFragment>> = BTreeMap::new();
        for packet in packets.iter().filter(|p| !p.is_dummy) {
            match self.open(packet) {
                Ok(fragment) if fragment.index < fragment.total => {
                    let slots = batches.entry(fragment.message_id).or_default();
                    if slots.contains_key(&fragment.index) {
                        dropped += 1;
                    } else {
                        slots.insert(fragment.index, fragment);
                    }
                }
                Ok(fragment) => {
                    warn!(packet = %packet.id, index = fragment.index, total = fragment.total, "fragment index out of range");
                    dropped += 1;
                }
                Err(err) => {
                    warn!(packet = %packet.id, kind = err.observable_type(), error = %err, "fragment dropped");
                    dropped += 1;
                }
            }
        }

        if batches.len() > 1 {
            return Err(RoutingError::Malformed(format!("batch mixes {} bulk messages", batches.len())).into());
        }
        let Some((message_id, slots)) = batches.into_iter().next() else {
            return Ok(DtnReassembly::empty(dropped));
        };

        let expected = slots.values().map(|f| f.total).max().unwrap_or(0);
        let (consistent, inconsistent): (Vec<_>, Vec<_>) = slots.into_values().partition(|f| f.total == expected);
        dropped += inconsistent.len();

        let missing: Vec<u32> = (0..expected)
            .filter(|index| !consistent.iter().any(|f| f.index == *index))
            .collect();
        let received = consistent.len();
        let message = consistent.into_iter().flat_map(|f| f.data).collect::<Vec<u8>>();

        let reassembly = DtnReassembly {
            message,
            expected: expected as usize,
            received,
            dropped,
            missing,
        };
        if reassembly.is_complete() {
            debug!(%message_id, fragments = received, "bulk message reassembled");
        } else {
            warn!(%message_id, received, expected, dropped, "bulk message incomplete");
        }
        Ok(reassembly)
    }
}
