//! Packet envelopes carried between nodes.
//!
//! A [`Packet`] is the unit every routing strategy emits and consumes. Real
//! packets carry their ciphertext in `payload` and the rest of the sealed
//! record (origin, nonce, associated data, integrity digest) in `seal`, so a
//! receiver never has to guess the nonce or digest.

use crate::crypto::session::{SealedMessage, NONCE_LEN};
use crate::crypto::primitives::sha3_hex;
use crate::error::{Result, RoutingError};
use crate::types::NodeId;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Routing mode tag carried by every packet.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoutingMode {
    #[default]
    #[serde(rename = "low-latency")]
    LowLatency,
    #[serde(rename = "onion")]
    Onion,
    #[serde(rename = "dtn")]
    Dtn,
}

impl RoutingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingMode::LowLatency => "low-latency",
            RoutingMode::Onion => "onion",
            RoutingMode::Dtn => "dtn",
        }
    }

    /// Associated data bound into every AEAD seal produced under this mode.
    pub fn associated_data(&self) -> &'static [u8] {
        match self {
            RoutingMode::LowLatency => b"low-latency",
            RoutingMode::Onion => b"onion-route",
            RoutingMode::Dtn => b"dtn-mode",
        }
    }
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Crypto metadata travelling alongside a packet's ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealHeader {
    /// Node whose session key sealed the payload
    pub origin_id: NodeId,
    #[serde(with = "hex_nonce")]
    pub nonce: [u8; NONCE_LEN],
    #[serde(with = "b64")]
    pub associated_data: Vec<u8>,
    pub integrity_digest: String,
}

impl SealHeader {
    /// A header for decoy traffic: random nonce, digest matching the filler.
    pub fn decoy(origin_id: NodeId, mode: RoutingMode, filler: &[u8]) -> Self {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        Self {
            origin_id,
            nonce,
            associated_data: mode.associated_data().to_vec(),
            integrity_digest: sha3_hex(filler),
        }
    }
}

fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

fn now_epoch_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Network packet: identity, routing metadata and (encrypted or decoy) payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Packet {
    #[serde(default = "fresh_id")]
    pub id: String,
    #[serde(default = "now_epoch_secs")]
    pub created_at: i64,
    pub sender_id: NodeId,
    pub receiver_id: NodeId,
    #[serde(with = "b64")]
    pub payload: Vec<u8>,
    #[serde(default)]
    pub is_dummy: bool,
    #[serde(default)]
    pub mode: RoutingMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seal: Option<SealHeader>,
}

impl Packet {
    /// Creates an unsealed packet. Used for plain records and decoys.
    pub fn new(
        sender_id: NodeId,
        receiver_id: NodeId,
        payload: Vec<u8>,
        is_dummy: bool,
        mode: RoutingMode,
    ) -> Self {
        Self {
            id: fresh_id(),
            created_at: now_epoch_secs(),
            sender_id,
            receiver_id,
            payload,
            is_dummy,
            mode,
            seal: None,
        }
    }

    /// Wraps a sealed message: ciphertext becomes the payload, the rest the header.
    pub fn sealed(sender_id: NodeId, receiver_id: NodeId, mode: RoutingMode, message: SealedMessage) -> Self {
        let SealedMessage {
            sender_id: origin_id,
            nonce,
            associated_data,
            ciphertext,
            integrity_digest,
        } = message;
        let mut packet = Self::new(sender_id, receiver_id, ciphertext, false, mode);
        packet.seal = Some(SealHeader {
            origin_id,
            nonce,
            associated_data,
            integrity_digest,
        });
        packet
    }

    /// A decoy packet filled with `filler` and a plausible seal header.
    pub fn dummy(sender_id: NodeId, receiver_id: NodeId, mode: RoutingMode, filler: Vec<u8>) -> Self {
        let seal = SealHeader::decoy(sender_id.clone(), mode, &filler);
        let mut packet = Self::new(sender_id, receiver_id, filler, true, mode);
        packet.seal = Some(seal);
        packet
    }

    /// Rebuilds the sealed message this packet carries.
    pub fn sealed_message(&self) -> Result<SealedMessage> {
        let seal = self
            .seal
            .as_ref()
            .ok_or_else(|| RoutingError::MissingSeal(self.id.clone()))?;
        Ok(SealedMessage {
            sender_id: seal.origin_id.clone(),
            nonce: seal.nonce,
            associated_data: seal.associated_data.clone(),
            ciphertext: self.payload.clone(),
            integrity_digest: seal.integrity_digest.clone(),
        })
    }

    /// Rejects the packet unless it is tagged with `expected`.
    pub fn expect_mode(&self, expected: RoutingMode) -> Result<()> {
        if self.mode != expected {
            return Err(RoutingError::ModeMismatch {
                expected,
                found: self.mode,
            }
            .into());
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a packet record, filling in a fresh id and timestamp when absent.
    pub fn from_json(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }
}

mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

mod hex_nonce {
    use super::NONCE_LEN;
    use crate::error::SessionError;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(nonce: &[u8; NONCE_LEN], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(nonce))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; NONCE_LEN], D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(encoded).map_err(serde::de::Error::custom)?;
        let len = bytes.len();
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom(SessionError::InvalidNonce(len)))
    }
}
