//! Dense line identifiers and the Line record
//!
//! A `LineId` is a path of `(digit, peer)` branches compared
//! lexicographically, with a strict prefix sorting before any extension.
//! The space is dense: between any two distinct ids another id can always
//! be allocated, descending one level when a digit gap is full. Two peers
//! racing the same gap are told apart by the peer component of the final
//! branch, so concurrent allocations order deterministically.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::clock::PeerId;

/// Hard ceiling on identifier depth. Normal allocation descends at most one
/// level past the deeper of its two neighbours; hitting this limit means the
/// gap was corrupt and the edit must be dropped at the originator.
pub const MAX_ID_DEPTH: usize = 64;

/// Widest random step taken inside a digit gap. Small steps keep early ids
/// short; the peer component still separates concurrent allocations.
const ALLOC_BOUNDARY: u64 = 32;

#[derive(Error, Debug)]
pub enum IdError {
    #[error("allocation gap is inverted or empty")]
    InvertedGap,

    #[error("identifier depth limit ({0}) reached while splitting gap")]
    DepthExhausted(usize),
}

/// One level of a line identifier path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Branch {
    pub digit: u64,
    pub peer: u64,
}

/// A dense ordering key for one line of the document.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineId {
    path: Vec<Branch>,
}

impl LineId {
    /// The smallest possible id; owned by the infimum sentinel.
    pub fn infimum() -> Self {
        Self {
            path: vec![Branch { digit: 0, peer: 0 }],
        }
    }

    /// The largest possible id; owned by the supremum sentinel.
    pub fn supremum() -> Self {
        Self {
            path: vec![Branch {
                digit: u64::MAX,
                peer: u64::MAX,
            }],
        }
    }

    pub fn is_infimum(&self) -> bool {
        *self == Self::infimum()
    }

    pub fn is_supremum(&self) -> bool {
        *self == Self::supremum()
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn branches(&self) -> &[Branch] {
        &self.path
    }

    fn branch(&self, depth: usize) -> Option<Branch> {
        self.path.get(depth).copied()
    }

    /// Allocate an id strictly between `left` and `right` on behalf of
    /// `peer`. Walks the two paths level by level; the first level with a
    /// free digit between the bounds takes a bounded random step, otherwise
    /// the search adopts the lower branch and descends.
    pub fn allocate_between(left: &LineId, right: &LineId, peer: PeerId) -> Result<LineId, IdError> {
        if left >= right {
            return Err(IdError::InvertedGap);
        }

        let mut rng = rand::thread_rng();
        let mut path: Vec<Branch> = Vec::new();
        // Whether the prefix built so far still matches the corresponding
        // bound; once it diverges the bound on that side is open.
        let mut on_right = true;

        for depth in 0..MAX_ID_DEPTH {
            let lo = left.branch(depth).unwrap_or(Branch { digit: 0, peer: 0 });
            let hi_digit = if on_right {
                match right.branch(depth) {
                    Some(branch) => branch.digit,
                    None => u64::MAX,
                }
            } else {
                u64::MAX
            };

            let gap = hi_digit.saturating_sub(lo.digit);
            if gap > 1 {
                let step = rng.gen_range(1..=(gap - 1).min(ALLOC_BOUNDARY));
                path.push(Branch {
                    digit: lo.digit + step,
                    peer: peer as u64,
                });
                return Ok(LineId { path });
            }

            // No room at this level: adopt the lower branch and descend.
            on_right = on_right && right.branch(depth) == Some(lo);
            path.push(lo);
        }

        Err(IdError::DepthExhausted(MAX_ID_DEPTH))
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, branch) in self.path.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}p{}", branch.digit, branch.peer)?;
        }
        Ok(())
    }
}

/// Whether a line is part of the visible document or a position anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineStatus {
    Alive,
    Tombstone,
}

/// One line of the replicated document.
///
/// Immutable after creation except for tombstoning and the per-peer
/// commit-observation projection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Line {
    pub id: LineId,
    pub content: String,
    pub origin: PeerId,
    /// Opaque signature binding this line to the parents it was created
    /// between. Empty for sentinels, which are never transmitted.
    pub signature: Vec<u8>,
    pub status: LineStatus,
    /// When each peer first observed this line as committed.
    pub committed_at: BTreeMap<PeerId, DateTime<Utc>>,
}

impl Line {
    pub fn new(id: LineId, content: impl Into<String>, origin: PeerId, signature: Vec<u8>) -> Self {
        Self {
            id,
            content: content.into(),
            origin,
            signature,
            status: LineStatus::Alive,
            committed_at: BTreeMap::new(),
        }
    }

    /// The sentinel at index 0 of every document.
    pub fn infimum() -> Self {
        Self::new(LineId::infimum(), "", 0, Vec::new())
    }

    /// The sentinel at the last index of every document.
    pub fn supremum() -> Self {
        Self::new(LineId::supremum(), "", 0, Vec::new())
    }

    pub fn is_sentinel(&self) -> bool {
        self.id.is_infimum() || self.id.is_supremum()
    }

    pub fn is_alive(&self) -> bool {
        self.status == LineStatus::Alive
    }

    pub fn mark_tombstone(&mut self) {
        self.status = LineStatus::Tombstone;
    }

    /// Record the first moment `peer` saw this line committed. Later calls
    /// for the same peer keep the original timestamp.
    pub fn observe_commit(&mut self, peer: PeerId) {
        self.committed_at.entry(peer).or_insert_with(Utc::now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_ordering() {
        assert!(LineId::infimum() < LineId::supremum());
        assert!(LineId::infimum().is_infimum());
        assert!(LineId::supremum().is_supremum());
    }

    #[test]
    fn test_allocate_between_sentinels() {
        let inf = LineId::infimum();
        let sup = LineId::supremum();
        let id = LineId::allocate_between(&inf, &sup, 1).unwrap();
        assert!(inf < id);
        assert!(id < sup);
    }

    #[test]
    fn test_allocate_is_dense() {
        // Repeated allocation against the same left neighbour keeps finding
        // room; the space never runs out.
        let inf = LineId::infimum();
        let mut right = LineId::supremum();
        for _ in 0..200 {
            let id = LineId::allocate_between(&inf, &right, 0).unwrap();
            assert!(inf < id);
            assert!(id < right);
            right = id;
        }
    }

    #[test]
    fn test_allocate_between_adjacent_digits() {
        // Gap of exactly one digit forces a descent.
        let left = LineId {
            path: vec![Branch { digit: 4, peer: 0 }],
        };
        let right = LineId {
            path: vec![Branch { digit: 5, peer: 0 }],
        };
        let id = LineId::allocate_between(&left, &right, 2).unwrap();
        assert!(left < id);
        assert!(id < right);
        assert!(id.depth() > 1);
    }

    #[test]
    fn test_allocate_inverted_gap_rejected() {
        let inf = LineId::infimum();
        let sup = LineId::supremum();
        assert!(matches!(
            LineId::allocate_between(&sup, &inf, 0),
            Err(IdError::InvertedGap)
        ));
        assert!(matches!(
            LineId::allocate_between(&inf, &inf, 0),
            Err(IdError::InvertedGap)
        ));
    }

    #[test]
    fn test_concurrent_allocations_are_distinct() {
        // Two peers splitting the same gap always produce distinct ids with
        // a deterministic relative order, whatever digits they draw.
        let inf = LineId::infimum();
        let sup = LineId::supremum();
        for _ in 0..50 {
            let a = LineId::allocate_between(&inf, &sup, 1).unwrap();
            let b = LineId::allocate_between(&inf, &sup, 2).unwrap();
            assert_ne!(a, b);
        }
    }

    #[test]
    fn test_tombstone_and_commit_projection() {
        let mut line = Line::new(LineId::infimum(), "hello", 1, vec![1, 2, 3]);
        assert!(line.is_alive());

        line.observe_commit(0);
        let first = line.committed_at[&0];
        line.observe_commit(0);
        assert_eq!(line.committed_at[&0], first);

        line.mark_tombstone();
        assert!(!line.is_alive());
        assert_eq!(line.status, LineStatus::Tombstone);
    }
}
