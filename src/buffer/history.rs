use std::collections::HashMap;

use crate::storage::BlockId;

/// Number of accesses remembered per block.
pub const K: usize = 3;

/// Empty slot marker in a block's access sequence.
const EMPTY: i64 = -1;

/// Per-block access bookkeeping for the LRU-K replacement policy.
///
/// Every tracked block carries its last [`K`] access timestamps, oldest
/// first, drawn from one pool-wide counter, plus a backward distance: the
/// gap in access events between its oldest and newest remembered accesses.
/// A block seen fewer than `K` times has unknown long-term reuse and gets
/// an infinite distance, which makes it a preferred eviction victim. Every
/// access to one block ages the distance of all others, so a known gap
/// keeps widening while unrelated traffic flows past.
pub struct AccessHistory {
    accesses: HashMap<BlockId, [i64; K]>,
    backward_dist: HashMap<BlockId, f64>,
    time: i64,
}

impl AccessHistory {
    pub fn new() -> Self {
        AccessHistory { accesses: HashMap::new(), backward_dist: HashMap::new(), time: 1 }
    }

    /// Records one access of `blk`. Invoked exactly once per successful pin,
    /// after any eviction bookkeeping for the displaced block.
    pub fn record(&mut self, blk: &BlockId) {
        let now = self.time;
        let slots = self.accesses.entry(blk.clone()).or_insert([EMPTY; K]);
        let dist = if slots[0] == EMPTY {
            slots[0] = now;
            f64::INFINITY
        } else if slots[1] == EMPTY {
            slots[1] = now;
            f64::INFINITY
        } else {
            if slots[2] != EMPTY {
                slots[0] = slots[1];
                slots[1] = slots[2];
            }
            slots[2] = now;
            (slots[2] - slots[0]) as f64
        };
        self.backward_dist.insert(blk.clone(), dist);
        self.time += 1;

        // Every access ages all other tracked blocks; infinity absorbs the
        // increment, so under-K blocks stay maximally evictable.
        for (other, d) in self.backward_dist.iter_mut() {
            if other != blk {
                *d += 1.0;
            }
        }
        debug_assert_eq!(self.accesses.len(), self.backward_dist.len());
    }

    /// Drops a block's bookkeeping when it leaves the pool.
    pub fn forget(&mut self, blk: &BlockId) {
        self.accesses.remove(blk);
        self.backward_dist.remove(blk);
    }

    /// Backward distance of a tracked block; untracked blocks report
    /// infinity, the same score a first-time block would get.
    pub fn distance(&self, blk: &BlockId) -> f64 {
        self.backward_dist.get(blk).copied().unwrap_or(f64::INFINITY)
    }

    #[cfg(test)]
    fn slots(&self, blk: &BlockId) -> Option<[i64; K]> {
        self.accesses.get(blk).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blk(n: u64) -> BlockId {
        BlockId::new("t", n)
    }

    #[test]
    fn test_distance_stays_infinite_below_k_accesses() {
        let mut history = AccessHistory::new();
        history.record(&blk(1));
        assert_eq!(Some([1, EMPTY, EMPTY]), history.slots(&blk(1)));
        assert!(history.distance(&blk(1)).is_infinite());

        history.record(&blk(1));
        assert_eq!(Some([1, 2, EMPTY]), history.slots(&blk(1)));
        assert!(history.distance(&blk(1)).is_infinite());
    }

    #[test]
    fn test_third_access_fixes_distance() {
        let mut history = AccessHistory::new();
        history.record(&blk(1)); // t=1
        history.record(&blk(1)); // t=2
        history.record(&blk(1)); // t=3
        assert_eq!(Some([1, 2, 3]), history.slots(&blk(1)));
        assert_eq!(2.0, history.distance(&blk(1)));
    }

    #[test]
    fn test_fourth_access_slides_the_window() {
        let mut history = AccessHistory::new();
        for _ in 0..3 {
            history.record(&blk(1)); // t=1,2,3
        }
        history.record(&blk(2)); // t=4, ages b1 to 3.0
        assert_eq!(3.0, history.distance(&blk(1)));

        history.record(&blk(1)); // t=5, window now [2,3,5]
        assert_eq!(Some([2, 3, 5]), history.slots(&blk(1)));
        assert_eq!(3.0, history.distance(&blk(1)));
    }

    #[test]
    fn test_accesses_age_every_other_block() {
        let mut history = AccessHistory::new();
        for _ in 0..3 {
            history.record(&blk(1)); // t=1,2,3 -> dist 2.0
        }
        history.record(&blk(2)); // t=4
        history.record(&blk(2)); // t=5
        assert_eq!(4.0, history.distance(&blk(1)));
        // infinity absorbed both agings
        assert!(history.distance(&blk(2)).is_infinite());
    }

    #[test]
    fn test_forget_drops_both_entries() {
        let mut history = AccessHistory::new();
        history.record(&blk(1));
        history.forget(&blk(1));
        assert_eq!(None, history.slots(&blk(1)));
        assert!(history.distance(&blk(1)).is_infinite());

        // a re-read block starts over as if never seen
        history.record(&blk(1));
        assert_eq!(Some([2, EMPTY, EMPTY]), history.slots(&blk(1)));
    }
}
