//! Puzzle difficulty, reputation and relay admission under pressure.

use crate::test_utils::{create_network, fast_admission, route};
use obscura_net::{
    AdaptivePuzzle, AdmissionConfig, AdmissionError, NodeId, ObscuraError, OnionRouter, PuzzleSolver,
    ReputationTracker,
};
use proptest::prelude::*;
use std::time::Duration;

#[test]
fn test_attack_then_recovery_cycle() {
    let mut puzzles = AdaptivePuzzle::new(&AdmissionConfig::default());
    let mut observed = Vec::new();
    for _ in 0..4 {
        puzzles.adjust_difficulty(true, false);
        observed.push(puzzles.current_difficulty());
    }
    puzzles.adjust_difficulty(false, true);
    observed.push(puzzles.current_difficulty());
    for _ in 0..10 {
        puzzles.adjust_difficulty(false, false);
    }
    observed.push(puzzles.current_difficulty());

    assert_eq!(observed, vec![6, 8, 10, 10, 8, 2]);
}

#[tokio::test]
async fn test_solver_solves_issued_puzzle() {
    let (nodes, _) = create_network(&["relay"]);
    let puzzle = nodes[0].issue_puzzle();
    let solution = PuzzleSolver::new(Duration::from_secs(10)).solve(puzzle.clone()).await.unwrap();
    assert!(nodes[0].verify_solution(&NodeId::from("peer"), &puzzle, solution.nonce));
}

#[tokio::test]
async fn test_solve_timeout_blocks_relay() {
    let (nodes, directory) = create_network(&["A", "B"]);
    for _ in 0..10 {
        nodes[1].adjust_difficulty(true, false);
    }
    assert_eq!(nodes[1].current_difficulty(), 10);

    let config = AdmissionConfig {
        solve_timeout: Duration::from_millis(50),
        ..fast_admission()
    };
    let origin = OnionRouter::new(nodes[0].clone(), directory.clone(), &config);
    let path = route(&["A", "B"]);
    let packet = origin.create_onion_message(&path, b"x").unwrap();

    let err = origin.process_packet(packet, &path, directory.as_ref()).await.unwrap_err();
    assert_eq!(err.failed_hop(), Some(&NodeId::from("B")));
    assert!(err.to_string().contains("timed out"));
    assert!(!matches!(err, ObscuraError::Admission(AdmissionError::Cancelled)));
}

#[test]
fn test_misbehaving_peer_gets_flagged() {
    let mut tracker = ReputationTracker::new(NodeId::from("mallory"));
    for _ in 0..11 {
        tracker.record_failure();
    }
    assert!(!tracker.is_flagged());
    tracker.record_failure();
    assert!(tracker.is_flagged());
    assert_eq!(tracker.failed_relays(), 12);
}

proptest! {
    /// Property: difficulty never leaves its configured bounds
    #[test]
    fn prop_difficulty_stays_bounded(events in prop::collection::vec((any::<bool>(), any::<bool>()), 0..64)) {
        let mut puzzles = AdaptivePuzzle::new(&AdmissionConfig::default());
        for (attack, congested) in events {
            puzzles.adjust_difficulty(attack, congested);
            prop_assert!((2..=10).contains(&puzzles.current_difficulty()));
        }
    }

    /// Property: reputation stays within [0, 150] for any relay history
    #[test]
    fn prop_reputation_bounded(history in prop::collection::vec(any::<bool>(), 0..200)) {
        let mut tracker = ReputationTracker::new(NodeId::from("peer"));
        for success in history {
            if success { tracker.record_success() } else { tracker.record_failure() }
            prop_assert!(tracker.score() <= 150);
        }
    }
}
