//! Multi-hop onion delivery, admission along the route and hop failures.

use crate::test_utils::{create_network, fast_admission, init_test_logging, route};
use obscura_net::{
    AdmissionConfig, NetworkMap, NodeId, ObscuraError, OnionRouter, RelayOutcome, RoutingError, SessionError,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_three_hop_delivery() {
    init_test_logging();
    let (nodes, directory) = create_network(&["A", "B", "C", "D"]);
    let router = OnionRouter::new(nodes[0].clone(), directory.clone(), &fast_admission());
    let path = route(&["A", "B", "C", "D"]);

    let packet = router.create_onion_message(&path, b"through the onion").unwrap();
    let delivered = router.process_packet(packet, &path, directory.as_ref()).await.unwrap();
    assert_eq!(delivered, b"through the onion");

    // every relay credits its upstream once the layer opens
    assert_eq!(nodes[1].reputation_of(&NodeId::from("A")), 102);
    assert_eq!(nodes[2].reputation_of(&NodeId::from("B")), 102);
    assert_eq!(nodes[3].reputation_of(&NodeId::from("C")), 102);
}

#[tokio::test]
async fn test_trusted_upstream_skips_puzzle() {
    let (nodes, directory) = create_network(&["A", "B"]);
    nodes[1].mark_trusted(NodeId::from("A"));
    let router = OnionRouter::new(nodes[0].clone(), directory.clone(), &fast_admission());
    let path = route(&["A", "B"]);

    let packet = router.create_onion_message(&path, b"fast lane").unwrap();
    let delivered = router.process_packet(packet, &path, directory.as_ref()).await.unwrap();
    assert_eq!(delivered, b"fast lane");
    assert_eq!(nodes[1].reputation_of(&NodeId::from("A")), 102);
}

#[tokio::test]
async fn test_hop_trusted_by_origin_skips_puzzle() {
    let (nodes, directory) = create_network(&["A", "B", "C"]);
    for _ in 0..5 {
        nodes[1].adjust_difficulty(true, false);
    }
    assert_eq!(nodes[1].current_difficulty(), 10);
    nodes[0].mark_trusted(NodeId::from("B"));

    let config = AdmissionConfig {
        solve_timeout: Duration::from_millis(50),
        ..fast_admission()
    };
    let router = OnionRouter::new(nodes[0].clone(), directory.clone(), &config);
    let path = route(&["A", "B", "C"]);

    let packet = router.create_onion_message(&path, b"vouched").unwrap();
    let delivered = router.process_packet(packet, &path, directory.as_ref()).await.unwrap();
    assert_eq!(delivered, b"vouched");
}

#[tokio::test]
async fn test_solved_puzzle_alone_earns_no_reputation() {
    let (nodes, directory) = create_network(&["A", "B"]);
    let router = OnionRouter::new(nodes[0].clone(), directory.clone(), &fast_admission());
    let at_b = OnionRouter::new(nodes[1].clone(), directory, &fast_admission());
    let upstream = NodeId::from("A");

    for _ in 0..10 {
        let mut packet = router.create_onion_message(&route(&["A", "B"]), b"spam").unwrap();
        packet.payload[0] ^= 0x01;
        assert!(at_b.relay(packet).await.is_err());
    }
    assert_eq!(nodes[1].reputation_of(&upstream), 50);
    assert!(nodes[1].requires_puzzle(&upstream));
}

#[tokio::test]
async fn test_layers_reveal_only_the_next_hop() {
    let (nodes, directory) = create_network(&["A", "B", "C"]);
    let router = OnionRouter::new(nodes[0].clone(), directory.clone(), &fast_admission());
    let packet = router.create_onion_message(&route(&["A", "B", "C"]), b"inner").unwrap();

    let at_b = OnionRouter::new(nodes[1].clone(), directory.clone(), &fast_admission());
    let RelayOutcome::Forward(forwarded) = at_b.relay(packet).await.unwrap() else {
        panic!("B is not the last hop");
    };
    assert_eq!(forwarded.receiver_id, NodeId::from("C"));
    assert!(!forwarded.payload.windows(5).any(|w| w == b"inner"));

    let at_c = OnionRouter::new(nodes[2].clone(), directory, &fast_admission());
    assert_eq!(at_c.relay(forwarded).await.unwrap(), RelayOutcome::Deliver(b"inner".to_vec()));
}

#[tokio::test]
async fn test_tampering_is_attributed_to_the_hop() {
    let (nodes, directory) = create_network(&["A", "B", "C"]);
    let router = OnionRouter::new(nodes[0].clone(), directory.clone(), &fast_admission());
    let path = route(&["A", "B", "C"]);

    let mut packet = router.create_onion_message(&path, b"payload").unwrap();
    packet.payload[3] ^= 0xff;

    let err = router.process_packet(packet, &path, directory.as_ref()).await.unwrap_err();
    assert_eq!(err.failed_hop(), Some(&NodeId::from("B")));
    assert!(err.is_tampering());
    assert!(err.to_string().contains("Error during hop 'B'"));
    // B blames A for the garbage even though the puzzle was paid
    assert_eq!(nodes[1].reputation_of(&NodeId::from("A")), 95);
}

#[tokio::test]
async fn test_missing_relay_fails_at_that_hop() {
    let (nodes, directory) = create_network(&["A", "B", "C", "D"]);
    let router = OnionRouter::new(nodes[0].clone(), directory, &fast_admission());
    let path = route(&["A", "B", "C", "D"]);
    let packet = router.create_onion_message(&path, b"lost").unwrap();

    // C never comes online
    let partial = NetworkMap::new()
        .with_node(nodes[0].clone())
        .with_node(nodes[1].clone())
        .with_node(nodes[3].clone());
    let err = router.process_packet(packet, &path, &partial).await.unwrap_err();

    assert_eq!(err.failed_hop(), Some(&NodeId::from("C")));
    match err {
        ObscuraError::Routing(RoutingError::HopFailed { source, .. }) => {
            assert!(matches!(*source, ObscuraError::Routing(RoutingError::PeerUnknown(_))));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_hop_without_origin_key_cannot_peel() {
    let (nodes, directory) = create_network(&["A", "B"]);
    let router = OnionRouter::new(nodes[0].clone(), directory, &fast_admission());
    let packet = router.create_onion_message(&route(&["A", "B"]), b"x").unwrap();

    // B only knows keys from a directory that has never heard of A
    let blind = Arc::new(NetworkMap::new().with_node(nodes[1].clone()));
    let at_b = OnionRouter::new(nodes[1].clone(), blind, &fast_admission());
    let err = at_b.relay(packet).await.unwrap_err();
    assert!(matches!(err, ObscuraError::Routing(RoutingError::PeerUnknown(_))));
}

#[tokio::test]
async fn test_bad_routes_are_rejected_up_front() {
    let (nodes, directory) = create_network(&["A", "B"]);
    let router = OnionRouter::new(nodes[0].clone(), directory, &fast_admission());

    for bad in [route(&["A"]), route(&["B", "A"]), route(&["A", "B", "B"])] {
        let err = router.create_onion_message(&bad, b"x").unwrap_err();
        assert!(matches!(err, ObscuraError::Routing(RoutingError::InvalidPath(_))), "{bad:?}");
    }
}

#[tokio::test]
async fn test_forged_origin_fails_integrity() {
    let (nodes, directory) = create_network(&["A", "B", "C"]);
    let router = OnionRouter::new(nodes[0].clone(), directory.clone(), &fast_admission());
    let mut packet = router.create_onion_message(&route(&["A", "B"]), b"x").unwrap();
    if let Some(seal) = packet.seal.as_mut() {
        seal.integrity_digest = "00".repeat(32);
    }
    let at_b = OnionRouter::new(nodes[1].clone(), directory, &fast_admission());
    let err = at_b.relay(packet).await.unwrap_err();
    assert!(matches!(err, ObscuraError::Session(SessionError::IntegrityViolation(_))));
}
