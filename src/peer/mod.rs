//! Asynchronous peer processes
//!
//! Each peer is a spawned task draining its own mailbox; handlers run to
//! completion before the next message is dequeued, so all document
//! mutations are linearizable within a peer. Peers interact only through
//! fire-and-forget messages.

mod mailbox;
mod process;

pub use mailbox::{PeerHandle, PeerMessage};
pub use process::Peer;

use thiserror::Error;

use crate::crdt::PeerId;

#[derive(Error, Debug)]
pub enum PeerError {
    #[error("peer {0} mailbox is closed")]
    MailboxClosed(PeerId),

    #[error("peer {0} dropped the reply channel")]
    ReplyDropped(PeerId),
}
