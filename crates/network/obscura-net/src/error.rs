//! Error types for the overlay.

use crate::packet::RoutingMode;
use crate::types::NodeId;
use std::time::Duration;
use thiserror::Error;

/// Type alias for Results in this crate.
pub type Result<T> = std::result::Result<T, ObscuraError>;

/// Main error type for overlay operations.
#[derive(Error, Debug)]
pub enum ObscuraError {
    /// Secure session errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Puzzle and reputation gate errors
    #[error("Admission error: {0}")]
    Admission(#[from] AdmissionError),

    /// Routing strategy errors
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Encoding or decoding of wire records failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Secure-session errors.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No session established with {0}")]
    NotEstablished(NodeId),

    #[error("Integrity digest mismatch on message from {0}")]
    IntegrityViolation(NodeId),

    #[error("Authenticated decryption failed for message from {0}")]
    DecryptionFailed(NodeId),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Invalid public key length: expected 32 bytes, got {0}")]
    InvalidPublicKey(usize),

    #[error("Invalid nonce length: expected 12 bytes, got {0}")]
    InvalidNonce(usize),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),
}

/// Admission-control errors.
#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error("Puzzle solving was cancelled")]
    Cancelled,

    #[error("Puzzle solving timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Relay admission rejected for {node}")]
    SolutionRejected { node: NodeId },

    #[error("Puzzle worker failed: {0}")]
    Worker(String),
}

/// Routing-strategy errors.
#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("Message of {size} bytes exceeds the {limit} byte limit")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("Peer unknown: {0}")]
    PeerUnknown(NodeId),

    #[error("Packet mode mismatch: expected {expected}, found {found}")]
    ModeMismatch {
        expected: RoutingMode,
        found: RoutingMode,
    },

    #[error("Packet {0} carries no seal header")]
    MissingSeal(String),

    #[error("Invalid route: {0}")]
    InvalidPath(String),

    #[error("Error during hop '{hop}': {source}")]
    HopFailed {
        hop: NodeId,
        #[source]
        source: Box<ObscuraError>,
    },

    #[error("Malformed packet: {0}")]
    Malformed(String),
}

impl ObscuraError {
    /// True for failures that indicate tampered or corrupted ciphertext.
    pub fn is_tampering(&self) -> bool {
        match self {
            ObscuraError::Session(SessionError::IntegrityViolation(_))
            | ObscuraError::Session(SessionError::DecryptionFailed(_)) => true,
            ObscuraError::Routing(RoutingError::HopFailed { source, .. }) => source.is_tampering(),
            _ => false,
        }
    }

    /// Returns an observable error type that doesn't leak sensitive information.
    pub fn observable_type(&self) -> &'static str {
        match self {
            ObscuraError::Session(_) => "session",
            ObscuraError::Admission(_) => "admission",
            ObscuraError::Routing(RoutingError::HopFailed { .. }) => "hop",
            ObscuraError::Routing(_) => "routing",
            ObscuraError::Configuration(_) => "configuration",
            ObscuraError::Serialization(_) => "serialization",
        }
    }

    /// The hop that failed, if this error came out of onion processing.
    pub fn failed_hop(&self) -> Option<&NodeId> {
        match self {
            ObscuraError::Routing(RoutingError::HopFailed { hop, .. }) => Some(hop),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ObscuraError {
    fn from(err: serde_json::Error) -> Self {
        ObscuraError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<bincode::Error> for ObscuraError {
    fn from(err: bincode::Error) -> Self {
        ObscuraError::Serialization(format!("bincode error: {}", err))
    }
}

impl From<toml::de::Error> for ObscuraError {
    fn from(err: toml::de::Error) -> Self {
        ObscuraError::Configuration(format!("TOML error: {}", err))
    }
}
