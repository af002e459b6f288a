//! Broadcast message format
//!
//! The two broadcast kinds every peer emits, CBOR-encoded for the wire.
//! Unknown or malformed payloads decode to an error the receiver logs and
//! ignores.

use serde::{Deserialize, Serialize};

use super::NetError;
use crate::crdt::{Line, LineId, PeerId, VectorClock};

/// A message fanned out to every other peer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Broadcast {
    /// A freshly created, signed line and the originator's clock.
    Insert { line: Line, clock: VectorClock },
    /// A tombstone notice for an existing line.
    Delete {
        line_id: LineId,
        origin: PeerId,
        clock: VectorClock,
    },
}

/// Serialize a broadcast to CBOR bytes.
pub fn encode(broadcast: &Broadcast) -> Result<Vec<u8>, NetError> {
    let mut buf = Vec::new();
    ciborium::into_writer(broadcast, &mut buf).map_err(|e| NetError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Deserialize a broadcast from CBOR bytes.
pub fn decode(bytes: &[u8]) -> Result<Broadcast, NetError> {
    ciborium::from_reader(bytes).map_err(|e| NetError::Decode(e.to_string()))
}
