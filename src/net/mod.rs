//! Network layer: wire codec, transport abstraction, peer directory
//!
//! Broadcasts travel as opaque CBOR payloads over a reliable, per-sender
//! FIFO transport. The in-process channel transport backs the supervisor
//! and tests; other transports can conform to the same trait.

mod directory;
mod transport;
mod wire;

pub use directory::PeerDirectory;
pub use transport::{ChannelTransport, Transport};
pub use wire::{decode, encode, Broadcast};

use thiserror::Error;

use crate::crdt::PeerId;

#[derive(Error, Debug)]
pub enum NetError {
    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("no route to peer {0}")]
    Unreachable(PeerId),
}
