//! Per-peer cryptographic identity
//!
//! Each peer holds an Ed25519 signing keypair used to bind its lines to
//! their parents. Identities are generated at bootstrap and die with the
//! peer; only verifying keys are shared, through the peer directory.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

/// A peer's Ed25519 signing identity.
pub struct PeerIdentity {
    signing_key: SigningKey,
}

impl PeerIdentity {
    /// Generate a fresh identity.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Sign arbitrary data.
    pub fn sign(&self, data: &[u8]) -> Signature {
        self.signing_key.sign(data)
    }

    /// Public verifying key (installed in the directory at bootstrap).
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Verify a signature against an arbitrary verifying key.
    pub fn verify_with_key(data: &[u8], signature: &Signature, key: &VerifyingKey) -> bool {
        key.verify(data, signature).is_ok()
    }
}
