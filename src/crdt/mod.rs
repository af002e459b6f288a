//! Replicated line-sequence engine
//!
//! The Byzantine-fault-tolerant sequence CRDT: dense line identifiers,
//! parent-binding signatures, vector clocks, the ordered document with
//! sliding-window validation, and the per-peer replica core that ties
//! them together.

mod clock;
mod document;
mod line;
mod replica;
mod signature;

pub use clock::{CausalOrder, PeerId, VectorClock};
pub use document::{Document, DocumentError, STASH_WINDOW_SLACK};
pub use line::{Branch, IdError, Line, LineId, LineStatus, MAX_ID_DEPTH};
pub use replica::{RemoteDeleteOutcome, RemoteInsertOutcome, Replica, ReplicaError};
pub use signature::{binding_digest, sign_binding, verify_binding};
