//! Parent binding signatures
//!
//! Every line is signed by its originator over the pair of neighbours it
//! was created between. Re-homing a line between different neighbours, or
//! altering its content or id, invalidates the signature, so a forged or
//! replayed insert can only land where its originator actually put it.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use super::line::{Line, LineId};
use crate::identity::PeerIdentity;

fn absorb_line_id(hasher: &mut Sha256, id: &LineId) {
    hasher.update((id.depth() as u64).to_be_bytes());
    for branch in id.branches() {
        hasher.update(branch.digit.to_be_bytes());
        hasher.update(branch.peer.to_be_bytes());
    }
}

/// Digest of the `(left parent, line id, content, right parent)` binding.
/// Each component is length-prefixed so adjacent fields cannot be confused.
pub fn binding_digest(
    left: &LineId,
    line_id: &LineId,
    content: &str,
    right: &LineId,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    absorb_line_id(&mut hasher, left);
    absorb_line_id(&mut hasher, line_id);
    hasher.update((content.len() as u64).to_be_bytes());
    hasher.update(content.as_bytes());
    absorb_line_id(&mut hasher, right);
    hasher.finalize().into()
}

/// Sign the parent binding for a freshly allocated line.
pub fn sign_binding(
    identity: &PeerIdentity,
    left: &LineId,
    line_id: &LineId,
    content: &str,
    right: &LineId,
) -> Vec<u8> {
    let digest = binding_digest(left, line_id, content, right);
    identity.sign(&digest).to_bytes().to_vec()
}

/// Verify `line` against a candidate parent pair and its originator's key.
/// Wrong pair, altered content, malformed signature bytes, or a key that
/// does not match all yield `false`.
pub fn verify_binding(key: &VerifyingKey, left: &Line, line: &Line, right: &Line) -> bool {
    let Ok(signature) = Signature::from_slice(&line.signature) else {
        return false;
    };
    let digest = binding_digest(&left.id, &line.id, &line.content, &right.id);
    key.verify(&digest, &signature).is_ok()
}
