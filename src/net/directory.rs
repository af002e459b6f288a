//! Peer directory
//!
//! Written once at bootstrap, read-only afterwards: the transport that
//! reaches every mailbox and the verifying key of every peer. Broadcast
//! fan-out always excludes the originator.

use std::sync::Arc;

use ed25519_dalek::VerifyingKey;

use super::Transport;
use crate::crdt::PeerId;

pub struct PeerDirectory {
    transport: Arc<dyn Transport>,
    keys: Vec<VerifyingKey>,
}

impl PeerDirectory {
    pub fn new(transport: Arc<dyn Transport>, keys: Vec<VerifyingKey>) -> Self {
        debug_assert_eq!(transport.network_size(), keys.len());
        Self { transport, keys }
    }

    pub fn network_size(&self) -> usize {
        self.keys.len()
    }

    pub fn verifying_key(&self, peer: PeerId) -> Option<&VerifyingKey> {
        self.keys.get(peer)
    }

    pub fn keys(&self) -> &[VerifyingKey] {
        &self.keys
    }

    /// Fan a payload out to every peer except the originator. Failures are
    /// per-link: a terminated peer's share is dropped and logged, the rest
    /// still go out.
    pub async fn broadcast_from(&self, origin: PeerId, payload: Vec<u8>) {
        for peer in 0..self.network_size() {
            if peer == origin {
                continue;
            }
            if let Err(err) = self.transport.deliver(peer, payload.clone()).await {
                log::warn!("broadcast from peer {} to peer {} dropped: {}", origin, peer, err);
            }
        }
    }
}
