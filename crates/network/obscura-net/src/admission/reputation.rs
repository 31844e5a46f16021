//! Event-driven reputation scores for remote nodes.

use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

pub const DEFAULT_SCORE: u32 = 100;
pub const MAX_SCORE: u32 = 150;
pub const SUCCESS_REWARD: u32 = 2;
pub const FAILURE_PENALTY: u32 = 5;
/// Scores at or above this skip puzzles.
pub const TRUSTED_THRESHOLD: u32 = 120;
/// Scores at or below this are deprioritized.
pub const FLAGGED_THRESHOLD: u32 = 40;

/// Reputation of a single remote node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationTracker {
    pub node_id: NodeId,
    score: u32,
    /// Observability only; never consulted for decisions
    successful_relays: u64,
    failed_relays: u64,
}

impl ReputationTracker {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            score: DEFAULT_SCORE,
            successful_relays: 0,
            failed_relays: 0,
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn successful_relays(&self) -> u64 {
        self.successful_relays
    }

    pub fn failed_relays(&self) -> u64 {
        self.failed_relays
    }

    pub fn record_success(&mut self) {
        self.successful_relays += 1;
        self.score = (self.score + SUCCESS_REWARD).min(MAX_SCORE);
    }

    pub fn record_failure(&mut self) {
        let was_flagged = self.is_flagged();
        self.failed_relays += 1;
        self.score = self.score.saturating_sub(FAILURE_PENALTY);
        if !was_flagged && self.is_flagged() {
            warn!(node = %self.node_id, score = self.score, "node reputation flagged");
        }
    }

    pub fn is_trusted(&self) -> bool {
        self.score >= TRUSTED_THRESHOLD
    }

    pub fn is_flagged(&self) -> bool {
        self.score <= FLAGGED_THRESHOLD
    }

    pub fn reset(&mut self) {
        self.score = DEFAULT_SCORE;
        self.successful_relays = 0;
        self.failed_relays = 0;
    }
}

/// One tracker per remote node, created on first use.
#[derive(Debug, Clone, Default)]
pub struct ReputationTable {
    trackers: HashMap<NodeId, ReputationTracker>,
}

impl ReputationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node_id: &NodeId) -> Option<&ReputationTracker> {
        self.trackers.get(node_id)
    }

    pub fn tracker_mut(&mut self, node_id: &NodeId) -> &mut ReputationTracker {
        self.trackers
            .entry(node_id.clone())
            .or_insert_with(|| ReputationTracker::new(node_id.clone()))
    }

    /// Score for `node_id`; unseen nodes sit at the default.
    pub fn score_of(&self, node_id: &NodeId) -> u32 {
        self.trackers.get(node_id).map_or(DEFAULT_SCORE, ReputationTracker::score)
    }

    pub fn is_trusted(&self, node_id: &NodeId) -> bool {
        self.trackers.get(node_id).is_some_and(ReputationTracker::is_trusted)
    }

    pub fn is_flagged(&self, node_id: &NodeId) -> bool {
        self.trackers.get(node_id).is_some_and(ReputationTracker::is_flagged)
    }

    pub fn record_success(&mut self, node_id: &NodeId) {
        self.tracker_mut(node_id).record_success();
    }

    pub fn record_failure(&mut self, node_id: &NodeId) {
        self.tracker_mut(node_id).record_failure();
    }

    pub fn snapshot(&self) -> BTreeMap<NodeId, u32> {
        self.trackers
            .iter()
            .map(|(id, tracker)| (id.clone(), tracker.score()))
            .collect()
    }
}
