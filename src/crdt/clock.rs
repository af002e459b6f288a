//! Causal context tracking via vector clocks
//!
//! Each peer carries a fixed-size clock indexed by peer id (the network size
//! is known at bootstrap). A peer's own entry counts its broadcasts; every
//! incoming broadcast carries the sender's full clock, and the projection
//! distance between the two sizes the validation window for that sender.

use serde::{Deserialize, Serialize};

/// Unique identifier for a peer/replica; doubles as the clock index.
pub type PeerId = usize;

/// Causal relationship between two clocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CausalOrder {
    Before,
    After,
    Concurrent,
    Equal,
}

/// A fixed-size vector clock over the whole network.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorClock {
    entries: Vec<u64>,
}

impl VectorClock {
    /// Create a zeroed clock for a network of `size` peers.
    pub fn new(size: usize) -> Self {
        Self {
            entries: vec![0; size],
        }
    }

    /// Number of peers this clock covers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the entry for a peer (0 if the peer is out of range).
    pub fn get(&self, peer: PeerId) -> u64 {
        self.entries.get(peer).copied().unwrap_or(0)
    }

    /// Increment a peer's entry. Called once per local broadcast.
    pub fn tick(&mut self, peer: PeerId) {
        if let Some(entry) = self.entries.get_mut(peer) {
            *entry += 1;
        }
    }

    /// Merge another clock into this one (element-wise maximum).
    pub fn merge(&mut self, other: &VectorClock) {
        for (peer, seen) in other.entries.iter().enumerate() {
            if let Some(entry) = self.entries.get_mut(peer) {
                if *seen > *entry {
                    *entry = *seen;
                }
            }
        }
    }

    /// How many of `origin`'s broadcasts this clock has not yet observed,
    /// judging by the sender's own entry in `remote`.
    pub fn projection_distance(&self, remote: &VectorClock, origin: PeerId) -> u64 {
        remote.get(origin).saturating_sub(self.get(origin) + 1)
    }

    /// Compare two clocks causally.
    pub fn compare(&self, other: &VectorClock) -> CausalOrder {
        let len = self.entries.len().max(other.entries.len());
        let mut behind = false;
        let mut ahead = false;
        for peer in 0..len {
            let (ours, theirs) = (self.get(peer), other.get(peer));
            if ours < theirs {
                behind = true;
            } else if ours > theirs {
                ahead = true;
            }
        }
        match (behind, ahead) {
            (false, false) => CausalOrder::Equal,
            (true, false) => CausalOrder::Before,
            (false, true) => CausalOrder::After,
            (true, true) => CausalOrder::Concurrent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_and_get() {
        let mut vc = VectorClock::new(3);
        assert_eq!(vc.get(1), 0);

        vc.tick(1);
        vc.tick(1);
        assert_eq!(vc.get(1), 2);
        assert_eq!(vc.get(0), 0);

        // Out-of-range ticks are ignored
        vc.tick(7);
        assert_eq!(vc.get(7), 0);
    }

    #[test]
    fn test_merge_takes_maximum() {
        let mut a = VectorClock::new(3);
        a.tick(0);
        a.tick(0);

        let mut b = VectorClock::new(3);
        b.tick(0);
        b.tick(2);

        a.merge(&b);
        assert_eq!(a.get(0), 2);
        assert_eq!(a.get(1), 0);
        assert_eq!(a.get(2), 1);
    }

    #[test]
    fn test_compare() {
        let mut a = VectorClock::new(2);
        let mut b = VectorClock::new(2);
        assert_eq!(a.compare(&b), CausalOrder::Equal);

        a.tick(0);
        assert_eq!(a.compare(&b), CausalOrder::After);
        assert_eq!(b.compare(&a), CausalOrder::Before);

        b.tick(1);
        assert_eq!(a.compare(&b), CausalOrder::Concurrent);
    }

    #[test]
    fn test_entries_never_decrease() {
        // Entry-wise monotonicity across an interleaved run of ticks and
        // merges, including merges with stale and concurrent clocks.
        fn assert_advanced(vc: &VectorClock, previous: &mut VectorClock) {
            for peer in 0..vc.len() {
                assert!(vc.get(peer) >= previous.get(peer));
            }
            *previous = vc.clone();
        }

        let mut concurrent = VectorClock::new(3);
        concurrent.tick(1);
        concurrent.tick(1);
        concurrent.tick(2);

        let mut stale = VectorClock::new(3);
        stale.tick(0);

        let mut vc = VectorClock::new(3);
        let mut previous = vc.clone();

        vc.tick(0);
        assert_advanced(&vc, &mut previous);
        vc.tick(0);
        assert_advanced(&vc, &mut previous);
        vc.merge(&concurrent);
        assert_advanced(&vc, &mut previous);
        vc.tick(2);
        assert_advanced(&vc, &mut previous);
        vc.merge(&stale);
        assert_advanced(&vc, &mut previous);
        vc.tick(1);
        assert_advanced(&vc, &mut previous);

        // Final state reflects every observation
        assert_eq!(vc.get(0), 2);
        assert_eq!(vc.get(1), 3);
        assert_eq!(vc.get(2), 2);
    }

    #[test]
    fn test_projection_distance() {
        let mut local = VectorClock::new(2);
        let mut remote = VectorClock::new(2);

        // First broadcast from peer 1: nothing missing in between
        remote.tick(1);
        assert_eq!(local.projection_distance(&remote, 1), 0);

        // Two more broadcasts we never saw
        remote.tick(1);
        remote.tick(1);
        assert_eq!(local.projection_distance(&remote, 1), 2);

        // Catching up shrinks the distance; it never goes negative
        local.tick(1);
        local.tick(1);
        assert_eq!(local.projection_distance(&remote, 1), 0);
        local.tick(1);
        local.tick(1);
        assert_eq!(local.projection_distance(&remote, 1), 0);
    }
}
