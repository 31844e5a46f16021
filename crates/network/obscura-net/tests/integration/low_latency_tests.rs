//! Direct delivery between small groups of nodes.

use crate::test_utils::{connect, create_network, fast_config, init_test_logging};
use obscura_net::{
    Delivery, NodeId, ObscuraError, Packet, RoutingError, RoutingMode, Router, RoutingStrategy, SendRequest,
    SessionError,
};

#[tokio::test]
async fn test_three_node_low_latency_scenario() {
    init_test_logging();
    let (nodes, directory) = create_network(&["NodeA", "NodeB", "NodeC"]);
    let (a, b, c) = (&nodes[0], &nodes[1], &nodes[2]);
    connect(a, b);
    connect(a, c);
    connect(b, c);

    let config = fast_config();
    let sender = Router::for_mode(RoutingMode::LowLatency, a.clone(), directory.clone(), &config);
    let receiver = Router::for_mode(RoutingMode::LowLatency, b.clone(), directory.clone(), &config);

    let message = "Hello from Node A via Low-Latency Mode";
    let packets = sender.send(SendRequest::direct("NodeB", message)).await.unwrap();
    assert_eq!(packets.len(), 1);

    let delivery = receiver.receive(packets).await.unwrap();
    assert_eq!(delivery, Delivery::Message(message.as_bytes().to_vec()));

    let status = a.status();
    assert_eq!(status.connected_peers, vec![NodeId::from("NodeB"), NodeId::from("NodeC")]);
    assert_eq!(status.pow_difficulty, 2);
}

#[tokio::test]
async fn test_third_party_cannot_read() {
    let (nodes, directory) = create_network(&["NodeA", "NodeB", "NodeC"]);
    connect(&nodes[0], &nodes[1]);
    connect(&nodes[0], &nodes[2]);
    let config = fast_config();
    let sender = Router::for_mode(RoutingMode::LowLatency, nodes[0].clone(), directory.clone(), &config);
    let eavesdropper = Router::for_mode(RoutingMode::LowLatency, nodes[2].clone(), directory, &config);

    let mut packets = sender.send(SendRequest::direct("NodeB", "for B only")).await.unwrap();
    // C pretends the packet was addressed to it
    packets[0].receiver_id = NodeId::from("NodeC");
    let err = eavesdropper.receive(packets).await.unwrap_err();
    assert!(matches!(err, ObscuraError::Session(SessionError::DecryptionFailed(_))));
}

#[tokio::test]
async fn test_rekeyed_session_still_interoperates() {
    let (nodes, directory) = create_network(&["NodeA", "NodeB"]);
    connect(&nodes[0], &nodes[1]);
    connect(&nodes[0], &nodes[1]);
    let config = fast_config();
    let sender = Router::for_mode(RoutingMode::LowLatency, nodes[0].clone(), directory.clone(), &config);
    let receiver = Router::for_mode(RoutingMode::LowLatency, nodes[1].clone(), directory, &config);

    let packets = sender.send(SendRequest::direct("NodeB", "after rekey")).await.unwrap();
    let wire: Vec<String> = packets.iter().map(|p| p.to_json().unwrap()).collect();
    let restored: Vec<Packet> = wire.iter().map(|w| Packet::from_json(w).unwrap()).collect();
    assert_eq!(
        receiver.receive(restored).await.unwrap().into_message(),
        Some(b"after rekey".to_vec())
    );
}

#[tokio::test]
async fn test_cleared_session_blocks_sending() {
    let (nodes, directory) = create_network(&["NodeA", "NodeB"]);
    connect(&nodes[0], &nodes[1]);
    assert!(nodes[0].clear_session(nodes[1].node_id()));

    let sender = Router::for_mode(RoutingMode::LowLatency, nodes[0].clone(), directory, &fast_config());
    let err = sender.send(SendRequest::direct("NodeB", "hi")).await.unwrap_err();
    assert!(matches!(err, ObscuraError::Routing(RoutingError::PeerUnknown(_))));
}

#[tokio::test]
async fn test_receive_expects_exactly_one_packet() {
    let (nodes, directory) = create_network(&["NodeA"]);
    let receiver = Router::for_mode(RoutingMode::LowLatency, nodes[0].clone(), directory, &fast_config());
    let err = receiver.receive(Vec::new()).await.unwrap_err();
    assert!(matches!(err, ObscuraError::Routing(RoutingError::Malformed(_))));
}
