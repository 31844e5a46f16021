//! Session cryptography: identity keys, key derivation and per-peer AEAD sessions.

pub mod primitives;
pub mod session;

pub use primitives::{IdentityKeypair, PUBLIC_KEY_LEN};
pub use session::{SealedMessage, SessionRecord, SessionTable, NONCE_LEN};
