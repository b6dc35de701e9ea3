use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::buffer::frame::Frame;
use crate::buffer::history::AccessHistory;
use crate::buffer::queue::RecencyQueue;
use crate::buffer::replacer;
use crate::error::{Error, Result};
use crate::storage::{BlockId, BlockStore, LogManager};

/// Default bound on how long a pin request may wait for a frame.
pub const MAX_WAIT: Duration = Duration::from_millis(10_000);

/// Index of a frame slot in the pool arena.
pub(crate) type FrameId = usize;

/// The resident set: a bounded arena of frames, the table mapping resident
/// blocks to their slots, the recency queue over those slots, and the
/// access history scoring them for replacement.
struct Pool {
    capacity: usize,
    /// Unpinned resident frames plus slots not yet holding a block.
    available: usize,
    store: Arc<dyn BlockStore>,
    wal: Arc<dyn LogManager>,
    /// Frame arena; slots are allocated lazily up to `capacity` and then
    /// reused forever through eviction.
    frames: Vec<Arc<Frame>>,
    /// Slots returned by failed block assignments, reusable ahead of the
    /// replacement policy.
    free: Vec<FrameId>,
    table: HashMap<BlockId, FrameId>,
    queue: RecencyQueue,
    history: AccessHistory,
}

impl Pool {
    fn new(store: Arc<dyn BlockStore>, wal: Arc<dyn LogManager>, capacity: usize) -> Self {
        assert!(capacity > 0, "pool capacity must be positive");
        Pool {
            capacity,
            available: capacity,
            store,
            wal,
            frames: Vec::with_capacity(capacity),
            free: Vec::new(),
            table: HashMap::new(),
            queue: RecencyQueue::new(capacity),
            history: AccessHistory::new(),
        }
    }

    /// One pin attempt. Returns None when the block is not resident and no
    /// frame can be freed for it, which tells the coordinator to wait.
    fn try_to_pin(&mut self, blk: &BlockId) -> Result<Option<Arc<Frame>>> {
        let slot = match self.table.get(blk) {
            Some(&slot) => {
                self.queue.move_to_back(slot);
                slot
            }
            None => match self.allocate(blk)? {
                Some(slot) => slot,
                None => return Ok(None),
            },
        };
        let frame = Arc::clone(&self.frames[slot]);
        {
            let mut data = frame.write()?;
            if !data.is_pinned() {
                self.available -= 1;
            }
            data.pin();
        }
        // Record the access last, after the pin took and after any eviction
        // bookkeeping, so a newly read block starts with infinite distance.
        self.history.record(blk);
        Ok(Some(frame))
    }

    /// Finds a slot for a non-resident block: a slot freed by a failed
    /// assignment, a fresh slot while the arena is below capacity, or the
    /// victim chosen by the replacement policy. Returns None when every
    /// resident frame is pinned.
    fn allocate(&mut self, blk: &BlockId) -> Result<Option<FrameId>> {
        let slot = if let Some(slot) = self.free.pop() {
            slot
        } else if self.frames.len() < self.capacity {
            let frame = Frame::new(Arc::clone(&self.store), Arc::clone(&self.wal));
            self.frames.push(Arc::new(frame));
            self.frames.len() - 1
        } else {
            match replacer::choose_victim(&self.frames, &self.queue, &self.history)? {
                Some(slot) => slot,
                None => return Ok(None),
            }
        };

        let frame = Arc::clone(&self.frames[slot]);
        let mut data = frame.write()?;
        if let Some(old) = data.block().cloned() {
            debug!("evicting block {} for {}", old, blk);
            self.table.remove(&old);
            self.queue.remove(slot);
            self.history.forget(&old);
        }
        if let Err(err) = data.assign_to_block(blk.clone()) {
            // The frame is mid-assignment; return it to the never-assigned
            // state so the pool does not lose the slot.
            data.reset();
            drop(data);
            self.free.push(slot);
            return Err(err);
        }
        drop(data);
        self.table.insert(blk.clone(), slot);
        self.queue.push_back(slot);
        Ok(Some(slot))
    }

    fn flush_all(&mut self, tx_num: i64) -> Result<()> {
        for &slot in self.table.values() {
            let mut data = self.frames[slot].write()?;
            if data.modifying_tx() == tx_num {
                data.flush()?;
            }
        }
        Ok(())
    }

    fn find_existing(&self, blk: &BlockId) -> Option<Arc<Frame>> {
        self.table.get(blk).map(|&slot| Arc::clone(&self.frames[slot]))
    }
}

/// Mediates between transactions and the block store: serves pin requests
/// from a bounded set of frames, waits when demand exceeds capacity, and
/// writes dirty frames out (log first) before their slots are reused.
///
/// A single pool-wide mutex guards every pool, frame-metadata, history and
/// queue mutation; the condition variable signals pin availability. I/O
/// runs with the mutex held, trading pool concurrency for a simple
/// log-before-data guarantee. Frame metadata mutation additionally takes
/// the frame latch under the pool mutex, so callers must not hold a frame
/// latch across manager calls.
pub struct BufferManager {
    pool: Mutex<Pool>,
    wakeup: Condvar,
    max_wait: Duration,
}

impl BufferManager {
    pub fn new(store: Arc<dyn BlockStore>, wal: Arc<dyn LogManager>, capacity: usize) -> Self {
        Self::with_max_wait(store, wal, capacity, MAX_WAIT)
    }

    /// Same as [`BufferManager::new`] with an explicit bound on how long a
    /// pin request may wait.
    pub fn with_max_wait(
        store: Arc<dyn BlockStore>,
        wal: Arc<dyn LogManager>,
        capacity: usize,
        max_wait: Duration,
    ) -> Self {
        BufferManager {
            pool: Mutex::new(Pool::new(store, wal, capacity)),
            wakeup: Condvar::new(),
            max_wait,
        }
    }

    /// Pins a frame to the given block, waiting for one to become available
    /// if the pool is overcommitted. Fails with [`Error::BufferAbort`] when
    /// no frame could be secured within the wait bound.
    pub fn pin(&self, blk: &BlockId) -> Result<Arc<Frame>> {
        let start = Instant::now();
        let mut pool = self.pool.lock()?;
        loop {
            if let Some(frame) = pool.try_to_pin(blk)? {
                return Ok(frame);
            }
            let elapsed = start.elapsed();
            if elapsed >= self.max_wait {
                warn!("pin of {} timed out after {:?}", blk, elapsed);
                return Err(Error::BufferAbort);
            }
            let (guard, _) = self.wakeup.wait_timeout(pool, self.max_wait - elapsed)?;
            pool = guard;
        }
    }

    /// Releases one pin on the frame. When the pin count reaches zero the
    /// frame becomes evictable and every waiter is woken to retry.
    pub fn unpin(&self, frame: &Arc<Frame>) -> Result<()> {
        let mut pool = self.pool.lock()?;
        let mut data = frame.write()?;
        data.unpin();
        if !data.is_pinned() {
            pool.available += 1;
            drop(data);
            self.wakeup.notify_all();
        }
        Ok(())
    }

    /// Flushes every resident frame dirtied by the given transaction. Order
    /// across frames is unspecified; within each frame the log is flushed
    /// before the block is written.
    pub fn flush_all(&self, tx_num: i64) -> Result<()> {
        let mut pool = self.pool.lock()?;
        pool.flush_all(tx_num)
    }

    /// Count of frames that could satisfy a pin of a non-resident block:
    /// unpinned resident frames plus slots not yet holding a block.
    pub fn available(&self) -> Result<usize> {
        let pool = self.pool.lock()?;
        Ok(pool.available)
    }

    /// The resident frame holding the block, if any. Primarily a
    /// diagnostic; the returned frame is not pinned.
    pub fn find_existing(&self, blk: &BlockId) -> Result<Option<Arc<Frame>>> {
        let pool = self.pool.lock()?;
        Ok(pool.find_existing(blk))
    }
}
