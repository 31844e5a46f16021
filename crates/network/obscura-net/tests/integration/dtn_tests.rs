//! Bulk delivery with decoy mixing.

use crate::test_utils::{connect, create_network, fast_config, generate_test_data};
use obscura_net::{Delivery, DtnRouter, ObscuraConfig, Packet, RoutingMode, Router, RoutingStrategy, SendRequest};

#[tokio::test]
async fn test_bulk_message_survives_mixing_and_transport() {
    let (nodes, directory) = create_network(&["NodeA", "NodeB"]);
    connect(&nodes[0], &nodes[1]);
    let config = fast_config();
    let sender = Router::for_mode(RoutingMode::Dtn, nodes[0].clone(), directory.clone(), &config);
    let receiver = Router::for_mode(RoutingMode::Dtn, nodes[1].clone(), directory, &config);

    let message = generate_test_data(5000);
    let packets = sender.send(SendRequest::direct("NodeB", message.clone())).await.unwrap();

    let real = packets.iter().filter(|p| !p.is_dummy).count();
    assert_eq!(real, 20);
    assert_eq!(packets.len() - real, DtnRouter::dummy_count(real, 0.3));

    let wire: Vec<String> = packets.iter().map(|p| p.to_json().unwrap()).collect();
    let restored: Vec<Packet> = wire.iter().map(|w| Packet::from_json(w).unwrap()).collect();

    match receiver.receive(restored).await.unwrap() {
        Delivery::Bulk(reassembly) => {
            assert!(reassembly.is_complete());
            assert_eq!(reassembly.message, message);
            assert!(reassembly.missing.is_empty());
        }
        other => panic!("unexpected delivery: {other:?}"),
    }
}

#[tokio::test]
async fn test_decoys_are_indistinguishable_on_the_wire_shape() {
    let (nodes, directory) = create_network(&["NodeA", "NodeB"]);
    connect(&nodes[0], &nodes[1]);
    let config = ObscuraConfig::default().with_dummy_ratio(1.0);
    let sender = Router::for_mode(RoutingMode::Dtn, nodes[0].clone(), directory, &config);

    let packets = sender.send(SendRequest::direct("NodeB", vec![1u8; 600])).await.unwrap();
    assert_eq!(packets.len(), 6);
    for packet in &packets {
        let json = packet.to_json().unwrap();
        assert!(json.contains("\"seal\""));
        assert!(json.contains("\"mode\":\"dtn\""));
    }
}

#[tokio::test]
async fn test_partial_batch_reports_missing_fragments() {
    let (nodes, directory) = create_network(&["NodeA", "NodeB"]);
    connect(&nodes[0], &nodes[1]);
    let config = ObscuraConfig::default().with_fragment_size(10).with_dummy_ratio(0.0);
    let sender = Router::for_mode(RoutingMode::Dtn, nodes[0].clone(), directory.clone(), &config);
    let receiver = Router::for_mode(RoutingMode::Dtn, nodes[1].clone(), directory, &config);

    let mut packets = sender.send(SendRequest::direct("NodeB", vec![7u8; 50])).await.unwrap();
    packets.truncate(3);

    let Delivery::Bulk(reassembly) = receiver.receive(packets).await.unwrap() else {
        panic!("dtn receive always yields a bulk delivery");
    };
    assert_eq!(reassembly.expected, 5);
    assert_eq!(reassembly.received, 3);
    assert_eq!(reassembly.missing.len(), 2);
    assert_eq!(reassembly.message, vec![7u8; 30]);
    assert_eq!(Delivery::Bulk(reassembly).into_message(), None);
}
