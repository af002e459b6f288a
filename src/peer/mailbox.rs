//! Peer mailbox messages and the handle used to reach them

use tokio::sync::{mpsc, oneshot};

use super::PeerError;
use crate::crdt::PeerId;

/// Everything a peer's mailbox can receive. Local edit commands come from
/// the supervisor through the handle; `Remote` carries opaque broadcast
/// bytes from the transport.
#[derive(Debug)]
pub enum PeerMessage {
    Insert { content: String, index: usize },
    Delete { index: usize },
    Remote(Vec<u8>),
    /// Log the alive projection for inspection.
    PrintContent,
    /// Reply with the alive projection.
    Snapshot { reply: oneshot::Sender<Vec<String>> },
    /// Acknowledge once every previously enqueued message is handled.
    Quiesce { reply: oneshot::Sender<()> },
    Shutdown,
}

/// Cheap, cloneable address of a running peer.
#[derive(Clone)]
pub struct PeerHandle {
    peer_id: PeerId,
    tx: mpsc::Sender<PeerMessage>,
}

impl PeerHandle {
    pub(crate) fn new(peer_id: PeerId, tx: mpsc::Sender<PeerMessage>) -> Self {
        Self { peer_id, tx }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    async fn send(&self, message: PeerMessage) -> Result<(), PeerError> {
        self.tx
            .send(message)
            .await
            .map_err(|_| PeerError::MailboxClosed(self.peer_id))
    }

    /// Enqueue a local insert at the given position.
    pub async fn insert(&self, content: impl Into<String>, index: usize) -> Result<(), PeerError> {
        self.send(PeerMessage::Insert {
            content: content.into(),
            index,
        })
        .await
    }

    /// Enqueue a local delete of the line at the given position.
    pub async fn delete(&self, index: usize) -> Result<(), PeerError> {
        self.send(PeerMessage::Delete { index }).await
    }

    /// Ask the peer to log its alive content.
    pub async fn print_content(&self) -> Result<(), PeerError> {
        self.send(PeerMessage::PrintContent).await
    }

    /// Fetch the peer's alive content.
    pub async fn snapshot(&self) -> Result<Vec<String>, PeerError> {
        let (reply, rx) = oneshot::channel();
        self.send(PeerMessage::Snapshot { reply }).await?;
        rx.await.map_err(|_| PeerError::ReplyDropped(self.peer_id))
    }

    /// Wait until the peer has drained everything enqueued before this
    /// call. Mailboxes are FIFO, so the ack doubles as a delivery barrier.
    pub async fn quiesce(&self) -> Result<(), PeerError> {
        let (reply, rx) = oneshot::channel();
        self.send(PeerMessage::Quiesce { reply }).await?;
        rx.await.map_err(|_| PeerError::ReplyDropped(self.peer_id))
    }

    /// Ask the peer to exit its message loop.
    pub async fn shutdown(&self) -> Result<(), PeerError> {
        self.send(PeerMessage::Shutdown).await
    }
}
