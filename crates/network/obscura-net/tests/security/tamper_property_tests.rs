//! Property-based checks that any modification of a sealed packet is caught.

use crate::test_utils::{connect, create_network};
use obscura_net::{LowLatencyRouter, ObscuraError, RoutingConfig, SessionError};
use proptest::prelude::*;
use std::sync::Arc;

fn routers() -> (LowLatencyRouter, LowLatencyRouter) {
    let (nodes, _) = create_network(&["NodeA", "NodeB"]);
    connect(&nodes[0], &nodes[1]);
    let config = RoutingConfig::default();
    (
        LowLatencyRouter::new(Arc::clone(&nodes[0]), &config),
        LowLatencyRouter::new(Arc::clone(&nodes[1]), &config),
    )
}

prop_compose! {
    fn arb_message()(data in prop::collection::vec(any::<u8>(), 0..=512)) -> Vec<u8> {
        data
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: sealing then opening recovers the message
    #[test]
    fn prop_low_latency_reversible(message in arb_message()) {
        let (a, b) = routers();
        let packet = a.send(b.node().node_id(), &message).unwrap();
        prop_assert_eq!(b.receive(&packet).unwrap(), message);
    }

    /// Property: a flipped ciphertext bit never goes unnoticed
    #[test]
    fn prop_ciphertext_tampering_detected(
        message in arb_message(),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let (a, b) = routers();
        let mut packet = a.send(b.node().node_id(), &message).unwrap();
        let index = position.index(packet.payload.len());
        packet.payload[index] ^= 1 << bit;

        let err = b.receive(&packet).unwrap_err();
        prop_assert!(matches!(err, ObscuraError::Session(SessionError::IntegrityViolation(_))));
    }

    /// Property: a consistent digest does not save a forged nonce
    #[test]
    fn prop_nonce_tampering_detected(
        message in arb_message(),
        position in 0usize..12,
        bit in 0u8..8,
    ) {
        let (a, b) = routers();
        let mut packet = a.send(b.node().node_id(), &message).unwrap();
        if let Some(seal) = packet.seal.as_mut() {
            seal.nonce[position] ^= 1 << bit;
        }

        let err = b.receive(&packet).unwrap_err();
        prop_assert!(err.is_tampering());
        prop_assert!(matches!(err, ObscuraError::Session(SessionError::DecryptionFailed(_))));
    }

    /// Property: oversized messages are refused before anything is sealed
    #[test]
    fn prop_size_limit_enforced(extra in 1usize..256) {
        let (a, b) = routers();
        prop_assert!(a.send(b.node().node_id(), &vec![0u8; 512 + extra]).is_err());
    }
}
