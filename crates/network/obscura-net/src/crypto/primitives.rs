//! Audited building blocks: X25519, HKDF-SHA3-256, SHA3-256 and ChaCha20-Poly1305.

use crate::error::{Result, SessionError};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use sha3::{Digest, Sha3_256};
use subtle::ConstantTimeEq;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const PUBLIC_KEY_LEN: usize = 32;
pub const SESSION_KEY_LEN: usize = 32;

/// Context label that separates session keys from any other HKDF output.
pub const SESSION_KEY_INFO: &[u8] = b"ObscuraNet Session Key";

/// A node's long-lived X25519 keypair. The secret never leaves this struct.
pub struct IdentityKeypair {
    secret: StaticSecret,
    public: PublicKey,
}

impl IdentityKeypair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.public.to_bytes()
    }

    /// Raw Diffie-Hellman output against a peer's public key bytes.
    pub fn shared_secret(&self, peer_public: &[u8]) -> Result<SharedSecret> {
        let bytes: [u8; PUBLIC_KEY_LEN] = peer_public
            .try_into()
            .map_err(|_| SessionError::InvalidPublicKey(peer_public.len()))?;
        let shared = self.secret.diffie_hellman(&PublicKey::from(bytes));
        Ok(SharedSecret(shared.to_bytes()))
    }
}

impl std::fmt::Debug for IdentityKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityKeypair")
            .field("public", &hex::encode(self.public.as_bytes()))
            .finish_non_exhaustive()
    }
}

/// Raw ECDH output, wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// Uniform symmetric key derived for one peer session, wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_LEN]);

impl SessionKey {
    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_LEN] {
        &self.0
    }
}

/// Derives a 32-byte session key from a raw shared secret (empty salt).
pub fn derive_session_key(shared: &SharedSecret) -> Result<SessionKey> {
    let hk = Hkdf::<Sha3_256>::new(None, shared.as_bytes());
    let mut okm = [0u8; SESSION_KEY_LEN];
    hk.expand(SESSION_KEY_INFO, &mut okm)
        .map_err(|_| SessionError::KeyDerivation("HKDF-SHA3-256 expansion failed".to_string()))?;
    let key = SessionKey(okm);
    okm.zeroize();
    Ok(key)
}

/// Lowercase hex SHA3-256 digest.
pub fn sha3_hex(data: &[u8]) -> String {
    hex::encode(Sha3_256::digest(data))
}

/// Compares two digests without short-circuiting on the first difference.
pub fn digests_match(expected: &str, actual: &str) -> bool {
    expected.len() == actual.len() && bool::from(expected.as_bytes().ct_eq(actual.as_bytes()))
}
