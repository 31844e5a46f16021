//! Per-peer secure sessions.

use crate::crypto::primitives::{derive_session_key, digests_match, sha3_hex, IdentityKeypair, SessionKey};
use crate::error::{Result, SessionError};
use crate::types::NodeId;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::SystemTime;
use tracing::{debug, warn};

/// 96-bit AEAD nonce.
pub const NONCE_LEN: usize = 12;

/// Everything a receiver needs to open one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedMessage {
    /// Node that sealed the message (selects the receiver's session)
    pub sender_id: NodeId,
    pub nonce: [u8; NONCE_LEN],
    pub associated_data: Vec<u8>,
    pub ciphertext: Vec<u8>,
    /// Hex SHA3-256 of `ciphertext`
    pub integrity_digest: String,
}

/// Session state for one peer.
#[derive(Clone)]
pub struct SessionRecord {
    pub peer_public_key: [u8; 32],
    pub established_at: SystemTime,
    /// Number of times this peer has been (re-)keyed
    pub generation: u64,
    key: SessionKey,
    cipher: ChaCha20Poly1305,
}

impl SessionRecord {
    fn new(peer_public_key: [u8; 32], key: SessionKey, generation: u64) -> Self {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
        Self {
            peer_public_key,
            established_at: SystemTime::now(),
            generation,
            key,
            cipher,
        }
    }

    /// Fingerprint of the derived key, safe to compare or log.
    pub fn key_fingerprint(&self) -> String {
        sha3_hex(self.key.as_bytes())[..16].to_string()
    }
}

impl std::fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecord")
            .field("peer_public_key", &hex::encode(self.peer_public_key))
            .field("generation", &self.generation)
            .field("key_fingerprint", &self.key_fingerprint())
            .finish()
    }
}

/// Table of derived sessions, one record per peer.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<NodeId, SessionRecord>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs ECDH against `peer_public_key`, derives the session key and
    /// stores (or replaces) the record for `peer_id`.
    pub fn establish(&mut self, identity: &IdentityKeypair, peer_id: &NodeId, peer_public_key: &[u8]) -> Result<()> {
        let shared = identity.shared_secret(peer_public_key)?;
        let key = derive_session_key(&shared)?;
        let public: [u8; 32] = peer_public_key
            .try_into()
            .map_err(|_| SessionError::InvalidPublicKey(peer_public_key.len()))?;

        let generation = self.sessions.get(peer_id).map_or(0, |r| r.generation + 1);
        let record = SessionRecord::new(public, key, generation);
        debug!(peer = %peer_id, generation, fingerprint = %record.key_fingerprint(), "session key derived");
        self.sessions.insert(peer_id.clone(), record);
        Ok(())
    }

    pub fn contains(&self, peer_id: &NodeId) -> bool {
        self.sessions.contains_key(peer_id)
    }

    pub fn get(&self, peer_id: &NodeId) -> Option<&SessionRecord> {
        self.sessions.get(peer_id)
    }

    pub fn remove(&mut self, peer_id: &NodeId) -> Option<SessionRecord> {
        self.sessions.remove(peer_id)
    }

    /// Peer ids with a live session, sorted.
    pub fn peers(&self) -> Vec<NodeId> {
        let mut peers: Vec<NodeId> = self.sessions.keys().cloned().collect();
        peers.sort();
        peers
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Seals `plaintext` for `peer_id` under a fresh random nonce.
    pub fn encrypt_for(
        &self,
        local_id: &NodeId,
        peer_id: &NodeId,
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<SealedMessage> {
        let record = self
            .sessions
            .get(peer_id)
            .ok_or_else(|| SessionError::NotEstablished(peer_id.clone()))?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = record
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: associated_data,
                },
            )
            .map_err(|_| SessionError::EncryptionFailed(format!("AEAD seal for {} failed", peer_id)))?;
        let integrity_digest = sha3_hex(&ciphertext);

        debug!(peer = %peer_id, plaintext_len = plaintext.len(), ciphertext_len = ciphertext.len(), "sealed message");
        Ok(SealedMessage {
            sender_id: local_id.clone(),
            nonce,
            associated_data: associated_data.to_vec(),
            ciphertext,
            integrity_digest,
        })
    }

    /// Verifies the digest, then opens the AEAD seal.
    pub fn decrypt_from(&self, peer_id: &NodeId, message: &SealedMessage) -> Result<Vec<u8>> {
        let record = self
            .sessions
            .get(peer_id)
            .ok_or_else(|| SessionError::NotEstablished(peer_id.clone()))?;

        let actual = sha3_hex(&message.ciphertext);
        if !digests_match(&message.integrity_digest, &actual) {
            warn!(peer = %peer_id, "integrity digest mismatch, discarding message");
            return Err(SessionError::IntegrityViolation(peer_id.clone()).into());
        }

        let plaintext = record
            .cipher
            .decrypt(
                Nonce::from_slice(&message.nonce),
                Payload {
                    msg: &message.ciphertext,
                    aad: &message.associated_data,
                },
            )
            .map_err(|_| {
                warn!(peer = %peer_id, "AEAD authentication failed, discarding message");
                SessionError::DecryptionFailed(peer_id.clone())
            })?;

        debug!(peer = %peer_id, plaintext_len = plaintext.len(), "opened message");
        Ok(plaintext)
    }
}
