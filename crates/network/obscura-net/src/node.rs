//! A single overlay node: identity keys plus all of its mutable state.
//!
//! Sessions, puzzle difficulty, the trusted set and reputation scores live
//! behind one lock per node. Nodes never share this state; they interact only
//! by exchanging public keys and packets.

use crate::admission::{AdaptivePuzzle, Puzzle, ReputationTable};
use crate::config::AdmissionConfig;
use crate::crypto::{IdentityKeypair, SealedMessage, SessionTable, PUBLIC_KEY_LEN};
use crate::error::Result;
use crate::observability::NodeStatus;
use crate::types::NodeId;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct NodeState {
    sessions: SessionTable,
    puzzles: AdaptivePuzzle,
    reputation: ReputationTable,
}

/// Secure node with its own session table and admission-control state.
#[derive(Debug)]
pub struct SecureNode {
    node_id: NodeId,
    identity: IdentityKeypair,
    relay_challenge: String,
    state: Mutex<NodeState>,
}

impl SecureNode {
    /// Creates a node with a freshly generated identity keypair.
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self::with_config(node_id, &AdmissionConfig::default())
    }

    pub fn with_config(node_id: impl Into<NodeId>, config: &AdmissionConfig) -> Self {
        Self {
            node_id: node_id.into(),
            identity: IdentityKeypair::generate(),
            relay_challenge: config.relay_challenge.clone(),
            state: Mutex::new(NodeState {
                sessions: SessionTable::new(),
                puzzles: AdaptivePuzzle::new(config),
                reputation: ReputationTable::new(),
            }),
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Public key to hand to peers out of band.
    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.identity.public_bytes()
    }

    /// Derives and stores the session for `peer_id`, replacing any previous one.
    pub fn establish_session(&self, peer_id: &NodeId, peer_public_key: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        let rekey = state.sessions.contains(peer_id);
        state.sessions.establish(&self.identity, peer_id, peer_public_key)?;
        info!(node = %self.node_id, peer = %peer_id, rekey, "secure session established");
        Ok(())
    }

    pub fn has_session(&self, peer_id: &NodeId) -> bool {
        self.state.lock().sessions.contains(peer_id)
    }

    /// Drops the session for `peer_id`. Returns whether one existed.
    pub fn clear_session(&self, peer_id: &NodeId) -> bool {
        let removed = self.state.lock().sessions.remove(peer_id).is_some();
        if removed {
            debug!(node = %self.node_id, peer = %peer_id, "session cleared");
        }
        removed
    }

    pub fn connected_peers(&self) -> Vec<NodeId> {
        self.state.lock().sessions.peers()
    }

    pub fn encrypt_for(&self, peer_id: &NodeId, plaintext: &[u8], associated_data: &[u8]) -> Result<SealedMessage> {
        self.state
            .lock()
            .sessions
            .encrypt_for(&self.node_id, peer_id, plaintext, associated_data)
    }

    pub fn decrypt_from(&self, peer_id: &NodeId, message: &SealedMessage) -> Result<Vec<u8>> {
        self.state.lock().sessions.decrypt_from(peer_id, message)
    }

    pub fn current_difficulty(&self) -> u32 {
        self.state.lock().puzzles.current_difficulty()
    }

    pub fn adjust_difficulty(&self, under_attack: bool, congested: bool) {
        self.state.lock().puzzles.adjust_difficulty(under_attack, congested);
    }

    pub fn mark_trusted(&self, peer_id: NodeId) {
        self.state.lock().puzzles.mark_trusted(peer_id);
    }

    /// In the explicit trusted set (not reputation based).
    pub fn is_trusted(&self, peer_id: &NodeId) -> bool {
        self.state.lock().puzzles.is_trusted(peer_id)
    }

    pub fn is_flagged(&self, peer_id: &NodeId) -> bool {
        self.state.lock().reputation.is_flagged(peer_id)
    }

    pub fn reputation_of(&self, peer_id: &NodeId) -> u32 {
        self.state.lock().reputation.score_of(peer_id)
    }

    /// Whether `peer_id` must solve a puzzle before this node relays for it.
    pub fn requires_puzzle(&self, peer_id: &NodeId) -> bool {
        let state = self.state.lock();
        !(state.puzzles.is_trusted(peer_id) || state.reputation.is_trusted(peer_id))
    }

    /// Puzzle for a relay request, using the configured challenge text.
    pub fn issue_puzzle(&self) -> Puzzle {
        self.issue_puzzle_for(&self.relay_challenge)
    }

    pub fn issue_puzzle_for(&self, message: &str) -> Puzzle {
        let puzzle = self.state.lock().puzzles.generate_puzzle(message);
        debug!(node = %self.node_id, difficulty = puzzle.difficulty, "puzzle issued");
        puzzle
    }

    /// Checks `nonce` against `puzzle`. A wrong answer costs `peer_id`
    /// reputation; a right one earns nothing until the relay itself succeeds.
    pub fn verify_solution(&self, peer_id: &NodeId, puzzle: &Puzzle, nonce: u64) -> bool {
        let mut state = self.state.lock();
        let valid = state.puzzles.verify(puzzle, nonce);
        if !valid {
            warn!(node = %self.node_id, peer = %peer_id, "puzzle solution rejected");
            state.reputation.record_failure(peer_id);
        }
        valid
    }

    pub fn record_relay_success(&self, peer_id: &NodeId) {
        self.state.lock().reputation.record_success(peer_id);
    }

    pub fn record_relay_failure(&self, peer_id: &NodeId) {
        self.state.lock().reputation.record_failure(peer_id);
    }

    /// Read-only snapshot for observability.
    pub fn status(&self) -> NodeStatus {
        let state = self.state.lock();
        NodeStatus {
            node_id: self.node_id.clone(),
            reputation: state.reputation.snapshot(),
            pow_difficulty: state.puzzles.current_difficulty(),
            trusted_nodes: state.puzzles.trusted_nodes(),
            connected_peers: state.sessions.peers(),
        }
    }
}
