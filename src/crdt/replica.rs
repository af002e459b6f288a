//! Per-peer synchronous core
//!
//! A `Replica` owns one peer's document, clock, keys, and pending stash.
//! Local edits produce signed lines ready for broadcast; remote broadcasts
//! are validated against the document, applied, stashed until their causal
//! prerequisites arrive, or discarded as Byzantine. The async peer process
//! is a thin mailbox shell around this type.

use std::collections::HashMap;

use ed25519_dalek::VerifyingKey;
use thiserror::Error;

use super::clock::{PeerId, VectorClock};
use super::document::{Document, DocumentError};
use super::line::{IdError, Line, LineId};
use super::signature::sign_binding;
use crate::identity::PeerIdentity;

#[derive(Error, Debug)]
pub enum ReplicaError {
    #[error("identifier allocation failed: {0}")]
    Allocation(#[from] IdError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// What became of a remote insert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteInsertOutcome {
    /// Verified and spliced in at the given document index.
    Applied { index: usize },
    /// Not yet validatable; parked in the per-sender stash.
    Stashed,
    /// The line id is already present; replays are no-ops.
    Duplicate,
    /// Unvalidatable with the sender fully caught up, or an unknown signer.
    Rejected,
}

/// What became of a remote delete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteDeleteOutcome {
    Applied { index: usize },
    /// Already tombstoned; replays are no-ops.
    Duplicate,
    /// The target resolved to a sentinel or out-of-range index.
    Rejected,
}

/// A deferred remote insert together with the clock it was broadcast under.
#[derive(Clone, Debug)]
struct StashedLine {
    line: Line,
    clock: VectorClock,
}

/// One peer's replica of the shared document.
pub struct Replica {
    peer_id: PeerId,
    identity: PeerIdentity,
    clock: VectorClock,
    document: Document,
    /// Incoming lines deferred per sender until the local clock advances.
    pending: HashMap<PeerId, Vec<StashedLine>>,
    /// Verifying key of every peer in the network, indexed by peer id.
    keys: Vec<VerifyingKey>,
}

impl Replica {
    pub fn new(peer_id: PeerId, identity: PeerIdentity, keys: Vec<VerifyingKey>) -> Self {
        let network_size = keys.len();
        Self {
            peer_id,
            identity,
            clock: VectorClock::new(network_size),
            document: Document::new(),
            pending: HashMap::new(),
            keys,
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn clock(&self) -> &VectorClock {
        &self.clock
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn alive_content(&self) -> Vec<String> {
        self.document.alive_content()
    }

    /// Number of lines from `origin` waiting in the stash.
    pub fn stashed_count(&self, origin: PeerId) -> usize {
        self.pending.get(&origin).map_or(0, Vec::len)
    }

    /// Create, sign, and apply a local insert at the user-facing position
    /// (0 places the line immediately after the infimum). Returns the
    /// signed line and the clock to broadcast with it.
    pub fn local_insert(
        &mut self,
        content: &str,
        index: usize,
    ) -> Result<(Line, VectorClock), ReplicaError> {
        let index = index.min(self.document.len() - 2);
        let (id, signature) = {
            let (left, right) = self.document.parents_of_index(index);
            let id = LineId::allocate_between(&left.id, &right.id, self.peer_id)?;
            let signature = sign_binding(&self.identity, &left.id, &id, content, &right.id);
            (id, signature)
        };

        self.clock.tick(self.peer_id);
        let mut line = Line::new(id, content, self.peer_id, signature);
        line.observe_commit(self.peer_id);
        self.document.insert_line(index + 1, line.clone());
        Ok((line, self.clock.clone()))
    }

    /// Tombstone the line at the user-facing position. Returns the line id
    /// and the clock to broadcast with it.
    pub fn local_delete(&mut self, index: usize) -> Result<(LineId, VectorClock), ReplicaError> {
        let line_id = self.document.tombstone_at(index + 1)?.id.clone();
        self.clock.tick(self.peer_id);
        Ok((line_id, self.clock.clone()))
    }

    /// Apply an insert broadcast from another peer.
    pub fn apply_remote_insert(
        &mut self,
        line: Line,
        remote: &VectorClock,
    ) -> RemoteInsertOutcome {
        let origin = line.origin;
        if origin >= self.keys.len() {
            log::warn!(
                "peer {}: discarding line {} from unknown origin {}",
                self.peer_id,
                line.id,
                origin
            );
            return RemoteInsertOutcome::Rejected;
        }
        if self.document.contains(&line.id) {
            log::debug!("peer {}: duplicate line {} ignored", self.peer_id, line.id);
            return RemoteInsertOutcome::Duplicate;
        }

        let distance = self.clock.projection_distance(remote, origin);
        if let Some(index) = self.try_insert(&line, distance) {
            self.clock.merge(remote);
            self.replay_pending(origin);
            return RemoteInsertOutcome::Applied { index };
        }

        if distance == 0 {
            // The sender's stream is fully observed; no future broadcast
            // from it can make this line verifiable.
            log::warn!(
                "peer {}: rejecting Byzantine line {} from peer {}",
                self.peer_id,
                line.id,
                origin
            );
            return RemoteInsertOutcome::Rejected;
        }

        self.pending.entry(origin).or_default().push(StashedLine {
            line,
            clock: remote.clone(),
        });
        RemoteInsertOutcome::Stashed
    }

    /// Apply a delete broadcast from another peer.
    pub fn apply_remote_delete(
        &mut self,
        line_id: &LineId,
        origin: PeerId,
        remote: &VectorClock,
    ) -> RemoteDeleteOutcome {
        if let Some(line) = self.document.line_by_id(line_id) {
            if !line.is_alive() {
                self.clock.merge(remote);
                return RemoteDeleteOutcome::Duplicate;
            }
        }

        let index = self.document.index_of(line_id);
        match self.document.tombstone_at(index) {
            Ok(_) => {
                self.clock.merge(remote);
                self.replay_pending(origin);
                RemoteDeleteOutcome::Applied { index }
            }
            Err(err) => {
                log::warn!(
                    "peer {}: remote delete of {} from peer {} not applied: {}",
                    self.peer_id,
                    line_id,
                    origin,
                    err
                );
                RemoteDeleteOutcome::Rejected
            }
        }
    }

    /// Validate `line` against the document and splice it in on success.
    fn try_insert(&mut self, line: &Line, window: u64) -> Option<usize> {
        let key = &self.keys[line.origin];
        let index = self.document.locate_parents(line, window, key)?;
        let mut line = line.clone();
        line.observe_commit(self.peer_id);
        self.document.insert_line(index, line);
        Some(index)
    }

    /// Re-run stash validation for everything pending from `origin`. Runs
    /// to a fixed point because one applied line can unlock the next; only
    /// once no further progress is possible are fully-caught-up leftovers
    /// discarded as Byzantine.
    fn replay_pending(&mut self, origin: PeerId) {
        let Some(mut entries) = self.pending.remove(&origin) else {
            return;
        };

        loop {
            let mut progressed = false;
            let mut kept = Vec::with_capacity(entries.len());
            for entry in entries {
                if self.document.contains(&entry.line.id) {
                    continue;
                }
                let distance = self.clock.projection_distance(&entry.clock, origin);
                if self.try_insert(&entry.line, distance).is_some() {
                    self.clock.merge(&entry.clock);
                    progressed = true;
                } else {
                    kept.push(entry);
                }
            }
            entries = kept;
            if !progressed || entries.is_empty() {
                break;
            }
        }

        entries.retain(|entry| {
            let caught_up = self.clock.projection_distance(&entry.clock, origin) == 0;
            if caught_up {
                log::warn!(
                    "peer {}: discarding Byzantine stashed line {} from peer {}",
                    self.peer_id,
                    entry.line.id,
                    origin
                );
            }
            !caught_up
        });

        if !entries.is_empty() {
            self.pending.insert(origin, entries);
        }
    }
}
