//! Transport abstraction
//!
//! Delivery of opaque broadcast payloads to peer mailboxes. The contract is
//! reliable delivery with FIFO ordering per sender; nothing is assumed
//! about ordering across senders. The channel transport used in-process
//! satisfies this via one tokio mpsc queue per peer.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::NetError;
use crate::crdt::PeerId;
use crate::peer::PeerMessage;

/// Reliable, per-sender-FIFO delivery of opaque payloads.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a broadcast payload to one peer. Delivery to a terminated
    /// peer fails; the caller logs and drops.
    async fn deliver(&self, to: PeerId, payload: Vec<u8>) -> Result<(), NetError>;

    /// Number of peers this transport can reach.
    fn network_size(&self) -> usize;
}

/// In-process transport over the peers' own mailboxes.
pub struct ChannelTransport {
    outboxes: Vec<mpsc::Sender<PeerMessage>>,
}

impl ChannelTransport {
    pub fn new(outboxes: Vec<mpsc::Sender<PeerMessage>>) -> Self {
        Self { outboxes }
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn deliver(&self, to: PeerId, payload: Vec<u8>) -> Result<(), NetError> {
        let outbox = self.outboxes.get(to).ok_or(NetError::Unreachable(to))?;
        outbox
            .send(PeerMessage::Remote(payload))
            .await
            .map_err(|_| NetError::Unreachable(to))
    }

    fn network_size(&self) -> usize {
        self.outboxes.len()
    }
}
