//! # Obscura Net
//!
//! Privacy-preserving overlay messaging between simulated nodes.
//!
//! Every node owns an X25519 identity and derives one ChaCha20-Poly1305
//! session per peer. Messages travel in [`Packet`] envelopes under one of
//! three routing modes:
//!
//! - **Low-latency**: a single sealed packet straight to the receiver
//! - **Onion**: layered encryption over a chosen route, peeled hop by hop
//! - **DTN**: fragmented bulk transfer mixed with decoy packets
//!
//! Relaying is gated by adaptive proof-of-work puzzles and per-peer
//! reputation, so unknown or misbehaving upstreams pay before a node spends
//! effort on their traffic.
//!
//! ## Example
//!
//! ```rust,no_run
//! use obscura_net::{NetworkMap, NodeId, ObscuraConfig, RoutingMode, Router, RoutingStrategy, SecureNode, SendRequest};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let a = Arc::new(SecureNode::new("NodeA"));
//!     let b = Arc::new(SecureNode::new("NodeB"));
//!     a.establish_session(b.node_id(), &b.public_key())?;
//!     b.establish_session(a.node_id(), &a.public_key())?;
//!
//!     let directory = Arc::new(NetworkMap::new().with_node(a.clone()).with_node(b.clone()));
//!     let config = ObscuraConfig::default();
//!     let sender = Router::for_mode(RoutingMode::LowLatency, a, directory.clone(), &config);
//!     let receiver = Router::for_mode(RoutingMode::LowLatency, b, directory, &config);
//!
//!     let packets = sender.send(SendRequest::direct(NodeId::from("NodeB"), "hello")).await?;
//!     let delivery = receiver.receive(packets).await?;
//!     println!("{:?}", delivery.into_message());
//!     Ok(())
//! }
//! ```

pub mod admission;
pub mod config;
pub mod crypto;
pub mod error;
pub mod node;
pub mod observability;
pub mod packet;
pub mod routing;
pub mod types;

// Re-exports for convenience
pub use admission::{AdaptivePuzzle, CancelFlag, Puzzle, PuzzleSolver, ReputationTracker, Solution};
pub use config::{AdmissionConfig, ObscuraConfig, RoutingConfig, MAX_DUMMY_RATIO};
pub use crypto::{IdentityKeypair, SealedMessage};
pub use error::{AdmissionError, ObscuraError, Result, RoutingError, SessionError};
pub use node::SecureNode;
pub use observability::{init_tracing, NodeStatus};
pub use packet::{Packet, RoutingMode, SealHeader};
pub use routing::{
    Delivery, DtnReassembly, DtnRouter, HopResolver, LowLatencyRouter, NetworkMap, OnionRouter, PeerDirectory,
    RelayOutcome, Router, RoutingStrategy, SendRequest,
};
pub use types::NodeId;
