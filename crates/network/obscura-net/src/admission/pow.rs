//! Adaptive proof-of-work puzzles.
//!
//! A puzzle is solved by finding the smallest nonce such that
//! `sha3_256(message ++ seed ++ decimal(nonce))`, hex encoded, starts with at
//! least `difficulty` zero digits. Difficulty moves between the configured
//! bounds as the node reports attack or congestion conditions.

use crate::admission::solver::CancelFlag;
use crate::config::AdmissionConfig;
use crate::error::{AdmissionError, Result};
use crate::types::NodeId;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::debug;

/// How many attempts pass between checks of the cancel flag.
const CANCEL_CHECK_INTERVAL: u64 = 64;

/// A single admission challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Puzzle {
    pub message: String,
    pub seed: String,
    pub difficulty: u32,
}

/// A nonce satisfying a puzzle and what it cost to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Solution {
    pub nonce: u64,
    pub attempts: u64,
    pub elapsed: Duration,
}

impl Puzzle {
    /// Hasher already fed with `message ++ seed`.
    fn prefix_hasher(&self) -> Sha3_256 {
        let mut hasher = Sha3_256::new();
        hasher.update(self.message.as_bytes());
        hasher.update(self.seed.as_bytes());
        hasher
    }

    fn check(prefix: &Sha3_256, nonce: u64, difficulty: u32) -> bool {
        let digest = prefix.clone().chain_update(nonce.to_string().as_bytes()).finalize();
        leading_zero_digits(&digest) >= difficulty
    }

    /// Hex digest for a candidate nonce.
    pub fn digest_for(&self, nonce: u64) -> String {
        hex::encode(self.prefix_hasher().chain_update(nonce.to_string().as_bytes()).finalize())
    }

    /// Recomputes the hash for `nonce` and checks the leading-zero condition.
    pub fn verify(&self, nonce: u64) -> bool {
        Self::check(&self.prefix_hasher(), nonce, self.difficulty)
    }

    /// Brute-forces the first valid nonce. Unbounded: callers off the hot
    /// path should prefer [`Puzzle::solve_with_cancel`].
    pub fn solve(&self) -> Solution {
        let prefix = self.prefix_hasher();
        let started = Instant::now();
        let mut nonce = 0u64;
        while !Self::check(&prefix, nonce, self.difficulty) {
            nonce += 1;
        }
        Solution {
            nonce,
            attempts: nonce + 1,
            elapsed: started.elapsed(),
        }
    }

    /// Same search as [`Puzzle::solve`], abandoned once `cancel` is raised.
    pub fn solve_with_cancel(&self, cancel: &CancelFlag) -> Result<Solution> {
        let prefix = self.prefix_hasher();
        let started = Instant::now();
        let mut nonce = 0u64;
        loop {
            if nonce % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                debug!(difficulty = self.difficulty, attempts = nonce, "puzzle solve cancelled");
                return Err(AdmissionError::Cancelled.into());
            }
            if Self::check(&prefix, nonce, self.difficulty) {
                break;
            }
            nonce += 1;
        }
        let solution = Solution {
            nonce,
            attempts: nonce + 1,
            elapsed: started.elapsed(),
        };
        debug!(
            difficulty = self.difficulty,
            attempts = solution.attempts,
            elapsed_ms = solution.elapsed.as_millis() as u64,
            "puzzle solved"
        );
        Ok(solution)
    }
}

/// Number of leading zero hex digits in `digest`.
pub fn leading_zero_digits(digest: &[u8]) -> u32 {
    let mut count = 0;
    for byte in digest {
        if *byte == 0 {
            count += 2;
            continue;
        }
        if byte >> 4 == 0 {
            count += 1;
        }
        break;
    }
    count
}

/// Difficulty controller plus the set of nodes exempt from puzzles.
#[derive(Debug, Clone)]
pub struct AdaptivePuzzle {
    difficulty: u32,
    min_difficulty: u32,
    max_difficulty: u32,
    congested_cap: u32,
    attack_step: u32,
    congestion_step: u32,
    seed_length: usize,
    trusted: BTreeSet<NodeId>,
}

impl AdaptivePuzzle {
    pub fn new(config: &AdmissionConfig) -> Self {
        Self {
            difficulty: config.initial_difficulty,
            min_difficulty: config.min_difficulty,
            max_difficulty: config.max_difficulty,
            congested_cap: config.congested_cap,
            attack_step: config.attack_step,
            congestion_step: config.congestion_step,
            seed_length: config.seed_length,
            trusted: BTreeSet::new(),
        }
    }

    pub fn current_difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Attack outranks congestion; with neither, difficulty relaxes by one.
    pub fn adjust_difficulty(&mut self, under_attack: bool, congested: bool) {
        let previous = self.difficulty;
        self.difficulty = if under_attack {
            (self.difficulty + self.attack_step).min(self.max_difficulty)
        } else if congested {
            (self.difficulty + self.congestion_step).min(self.congested_cap)
        } else {
            self.difficulty.saturating_sub(1).max(self.min_difficulty)
        };
        debug!(previous, current = self.difficulty, under_attack, congested, "puzzle difficulty adjusted");
    }

    /// Fresh puzzle at the current difficulty with a random alphanumeric seed.
    pub fn generate_puzzle(&self, message: &str) -> Puzzle {
        let seed: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.seed_length)
            .map(|c| char::from(c).to_ascii_lowercase())
            .collect();
        Puzzle {
            message: message.to_string(),
            seed,
            difficulty: self.difficulty,
        }
    }

    pub fn solve(&self, puzzle: &Puzzle) -> Solution {
        puzzle.solve()
    }

    pub fn verify(&self, puzzle: &Puzzle, nonce: u64) -> bool {
        puzzle.verify(nonce)
    }

    pub fn is_trusted(&self, node_id: &NodeId) -> bool {
        self.trusted.contains(node_id)
    }

    pub fn mark_trusted(&mut self, node_id: NodeId) {
        self.trusted.insert(node_id);
    }

    pub fn trusted_nodes(&self) -> Vec<NodeId> {
        self.trusted.iter().cloned().collect()
    }
}
