//! The ordered line sequence
//!
//! A document is a vector of lines, strictly increasing by line id, always
//! bracketed by the infimum and supremum sentinels. Tombstoned lines stay in
//! the sequence as position anchors. Incoming remote lines are validated by
//! the sliding-window search before they may enter the sequence.

use std::collections::HashSet;

use ed25519_dalek::VerifyingKey;
use thiserror::Error;

use super::line::{Line, LineId};
use super::signature::verify_binding;

/// Extra widening allowed past the causally-unseen gap when searching for a
/// verifiable parent pair. Tolerates boundary clock drift between peers.
pub const STASH_WINDOW_SLACK: u64 = 2;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("cannot delete a sentinel line")]
    SentinelDelete,

    #[error("line index {0} is out of range")]
    IndexOutOfRange(usize),
}

/// An ordered, sentinel-bracketed sequence of lines.
#[derive(Clone, Debug)]
pub struct Document {
    lines: Vec<Line>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// A fresh document holding only the two sentinels.
    pub fn new() -> Self {
        Self {
            lines: vec![Line::infimum(), Line::supremum()],
        }
    }

    /// Total number of lines including sentinels and tombstones; always >= 2.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line_at(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn line_by_id(&self, id: &LineId) -> Option<&Line> {
        self.position_of(id).map(|i| &self.lines[i])
    }

    pub fn contains(&self, id: &LineId) -> bool {
        self.position_of(id).is_some()
    }

    fn position_of(&self, id: &LineId) -> Option<usize> {
        self.lines.iter().position(|line| line.id == *id)
    }

    /// Index of the line with `id`. A missing id falls back to index 1
    /// (just after the infimum) so callers can proceed defensively.
    pub fn index_of(&self, id: &LineId) -> usize {
        match self.position_of(id) {
            Some(index) => index,
            None => {
                log::warn!("line {} not found in document, falling back to index 1", id);
                1
            }
        }
    }

    /// The neighbour pair a new line at position `index` would be created
    /// between. Out-of-range positions clamp to the last gap.
    pub fn parents_of_index(&self, index: usize) -> (&Line, &Line) {
        let index = index.min(self.lines.len() - 2);
        (&self.lines[index], &self.lines[index + 1])
    }

    /// The smallest index whose line id is >= the incoming id; an incoming
    /// line belongs immediately before it. An id beyond the supremum cannot
    /// come from a correct peer; fall back to index 1 without mutating.
    pub fn new_index_for_incoming(&self, id: &LineId) -> usize {
        match self.lines.iter().position(|line| line.id >= *id) {
            Some(index) => index,
            None => {
                log::warn!("incoming line {} sorts past the supremum, falling back to index 1", id);
                1
            }
        }
    }

    /// Splice a line into the sequence. The index must come from
    /// `parents_of_index` or `new_index_for_incoming`.
    pub fn insert_line(&mut self, index: usize, line: Line) {
        debug_assert!(index > 0 && index < self.lines.len());
        self.lines.insert(index, line);
    }

    /// Tombstone the line at `index`. Sentinels are rejected; the line
    /// stays in the sequence as a position anchor.
    pub fn tombstone_at(&mut self, index: usize) -> Result<&Line, DocumentError> {
        let len = self.lines.len();
        let line = self
            .lines
            .get_mut(index)
            .ok_or(DocumentError::IndexOutOfRange(index))?;
        if index == 0 || index == len - 1 || line.is_sentinel() {
            return Err(DocumentError::SentinelDelete);
        }
        line.mark_tombstone();
        Ok(&self.lines[index])
    }

    /// The alive projection: content of every live line between sentinels.
    pub fn alive_content(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter(|line| !line.is_sentinel() && line.is_alive())
            .map(|line| line.content.clone())
            .collect()
    }

    /// Sliding-window validation for an incoming line.
    ///
    /// Tentatively splices the line at its id-order index `c`, then searches
    /// outward from the immediate neighbour pair `(c-1, c+1)` for a pair the
    /// signature verifies against, widening left first. The search widens at
    /// most `window + STASH_WINDOW_SLACK` steps beyond the immediate pair.
    /// Returns the splice index on success.
    pub fn locate_parents(
        &self,
        line: &Line,
        window: u64,
        key: &VerifyingKey,
    ) -> Option<usize> {
        let c = self.new_index_for_incoming(&line.id);
        let budget = window + STASH_WINDOW_SLACK;
        let mut visited = HashSet::new();
        self.widen(c, line, -1, 1, budget, key, &mut visited)
            .map(|_| c)
    }

    /// One node of the widening search: try the pair `(c+dl, c+dr)` in the
    /// tentative document, then the left extension, then the right.
    #[allow(clippy::too_many_arguments)]
    fn widen(
        &self,
        c: usize,
        line: &Line,
        dl: i64,
        dr: i64,
        budget: u64,
        key: &VerifyingKey,
        visited: &mut HashSet<(i64, i64)>,
    ) -> Option<(i64, i64)> {
        // Widening spent so far: how far the pair has grown past (-1, +1).
        if (dr - dl - 2) as u64 > budget || !visited.insert((dl, dr)) {
            return None;
        }
        let left = self.tentative(c, line, c as i64 + dl)?;
        let right = self.tentative(c, line, c as i64 + dr)?;
        if verify_binding(key, left, line, right) {
            return Some((dl, dr));
        }
        self.widen(c, line, dl - 1, dr, budget, key, visited)
            .or_else(|| self.widen(c, line, dl, dr + 1, budget, key, visited))
    }

    /// Index into the tentative document that has `line` spliced at `c`.
    fn tentative<'a>(&'a self, c: usize, line: &'a Line, index: i64) -> Option<&'a Line> {
        if index < 0 {
            return None;
        }
        let index = index as usize;
        match index.cmp(&c) {
            std::cmp::Ordering::Less => self.lines.get(index),
            std::cmp::Ordering::Equal => Some(line),
            std::cmp::Ordering::Greater => self.lines.get(index - 1),
        }
    }
}
