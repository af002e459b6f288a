//! The peer message loop
//!
//! A peer wraps its replica in a single-threaded mailbox loop: local edits
//! are applied and broadcast, remote payloads are decoded and handed to the
//! replica, anything unintelligible is logged and ignored. A failed local
//! edit broadcasts nothing.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::mailbox::{PeerHandle, PeerMessage};
use crate::crdt::Replica;
use crate::net::{self, Broadcast, PeerDirectory};

pub struct Peer {
    replica: Replica,
    directory: Arc<PeerDirectory>,
    mailbox: mpsc::Receiver<PeerMessage>,
}

impl Peer {
    /// Start a peer task over an already-wired mailbox. The sender half
    /// must be the one registered in the directory's transport.
    pub fn spawn(
        replica: Replica,
        directory: Arc<PeerDirectory>,
        mailbox: mpsc::Receiver<PeerMessage>,
        tx: mpsc::Sender<PeerMessage>,
    ) -> (PeerHandle, JoinHandle<()>) {
        let handle = PeerHandle::new(replica.peer_id(), tx);
        let peer = Self {
            replica,
            directory,
            mailbox,
        };
        let join = tokio::spawn(peer.run());
        (handle, join)
    }

    async fn run(mut self) {
        while let Some(message) = self.mailbox.recv().await {
            match message {
                PeerMessage::Insert { content, index } => {
                    self.handle_insert(content, index).await;
                }
                PeerMessage::Delete { index } => {
                    self.handle_delete(index).await;
                }
                PeerMessage::Remote(payload) => {
                    self.handle_remote(&payload);
                }
                PeerMessage::PrintContent => {
                    log::info!(
                        "peer {} content: {:?}",
                        self.replica.peer_id(),
                        self.replica.alive_content()
                    );
                }
                PeerMessage::Snapshot { reply } => {
                    let _ = reply.send(self.replica.alive_content());
                }
                PeerMessage::Quiesce { reply } => {
                    let _ = reply.send(());
                }
                PeerMessage::Shutdown => break,
            }
        }
    }

    async fn handle_insert(&mut self, content: String, index: usize) {
        match self.replica.local_insert(&content, index) {
            Ok((line, clock)) => {
                self.broadcast(&Broadcast::Insert { line, clock }).await;
            }
            Err(err) => {
                log::error!(
                    "peer {}: dropping local insert at {}: {}",
                    self.replica.peer_id(),
                    index,
                    err
                );
            }
        }
    }

    async fn handle_delete(&mut self, index: usize) {
        match self.replica.local_delete(index) {
            Ok((line_id, clock)) => {
                let origin = self.replica.peer_id();
                self.broadcast(&Broadcast::Delete {
                    line_id,
                    origin,
                    clock,
                })
                .await;
            }
            Err(err) => {
                log::error!(
                    "peer {}: dropping local delete at {}: {}",
                    self.replica.peer_id(),
                    index,
                    err
                );
            }
        }
    }

    fn handle_remote(&mut self, payload: &[u8]) {
        match net::decode(payload) {
            Ok(Broadcast::Insert { line, clock }) => {
                self.replica.apply_remote_insert(line, &clock);
            }
            Ok(Broadcast::Delete {
                line_id,
                origin,
                clock,
            }) => {
                self.replica.apply_remote_delete(&line_id, origin, &clock);
            }
            Err(err) => {
                log::warn!(
                    "peer {}: ignoring unintelligible broadcast: {}",
                    self.replica.peer_id(),
                    err
                );
            }
        }
    }

    async fn broadcast(&self, broadcast: &Broadcast) {
        match net::encode(broadcast) {
            Ok(payload) => {
                self.directory
                    .broadcast_from(self.replica.peer_id(), payload)
                    .await;
            }
            Err(err) => {
                log::error!(
                    "peer {}: broadcast not sent: {}",
                    self.replica.peer_id(),
                    err
                );
            }
        }
    }
}
