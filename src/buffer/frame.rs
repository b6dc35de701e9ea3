use std::ops::Deref;
use std::sync::{Arc, RwLock};

use log::debug;

use crate::error::{Error, Result};
use crate::storage::{BlockId, BlockStore, LogManager};

/// Sentinel meaning "no modifying transaction recorded".
pub const NO_TX: i64 = -1;
/// Sentinel meaning "no log dependency".
pub const NO_LSN: i64 = -1;

/// The state of one frame: the block it holds, its contents, and the
/// pin/dirty bookkeeping. All mutation happens while the coordinator holds
/// the pool mutex; the surrounding [`Frame`] lock only protects content
/// access by callers that already pinned the frame.
pub struct FrameData {
    store: Arc<dyn BlockStore>,
    wal: Arc<dyn LogManager>,
    block: Option<BlockId>,
    contents: Vec<u8>,
    pins: u32,
    dirty: bool,
    tx_num: i64,
    lsn: i64,
}

impl FrameData {
    fn new(store: Arc<dyn BlockStore>, wal: Arc<dyn LogManager>) -> Self {
        let contents = vec![0; store.block_size()];
        FrameData { store, wal, block: None, contents, pins: 0, dirty: false, tx_num: NO_TX, lsn: NO_LSN }
    }

    /// The block this frame holds, or None if the frame was never assigned.
    pub fn block(&self) -> Option<&BlockId> {
        self.block.as_ref()
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn contents_mut(&mut self) -> &mut [u8] {
        &mut self.contents
    }

    pub fn is_pinned(&self) -> bool {
        self.pins > 0
    }

    pub fn pins(&self) -> u32 {
        self.pins
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The transaction that last modified the frame, or [`NO_TX`].
    pub fn modifying_tx(&self) -> i64 {
        self.tx_num
    }

    /// Marks the frame as modified by the given transaction. A non-negative
    /// `lsn` raises the frame's log dependency; a negative one records the
    /// modification without one.
    pub fn set_modified(&mut self, tx_num: i64, lsn: i64) {
        assert!(self.block.is_some(), "set_modified on an unassigned frame");
        self.dirty = true;
        self.tx_num = tx_num;
        if lsn >= 0 {
            self.lsn = self.lsn.max(lsn);
        }
    }

    pub(crate) fn pin(&mut self) {
        self.pins += 1;
    }

    pub(crate) fn unpin(&mut self) {
        assert!(self.pins > 0, "unpin on a frame that is not pinned");
        self.pins -= 1;
    }

    /// Reads the given block into this frame, writing the previous contents
    /// out first if they are dirty. Caller guarantees the frame is unpinned.
    pub(crate) fn assign_to_block(&mut self, blk: BlockId) -> Result<()> {
        debug_assert!(!self.is_pinned(), "assigning a pinned frame");
        self.flush()?;
        self.store.read(&blk, &mut self.contents)?;
        self.block = Some(blk);
        self.pins = 0;
        Ok(())
    }

    /// Writes the frame to its block if it is dirty, flushing the log up to
    /// the frame's LSN first. The log-before-data order is the one WAL
    /// guarantee this layer offers.
    pub(crate) fn flush(&mut self) -> Result<()> {
        debug_assert_eq!(self.dirty, self.tx_num >= 0, "dirty flag out of sync with tx_num");
        if !self.dirty {
            return Ok(());
        }
        let blk = self
            .block
            .as_ref()
            .ok_or_else(|| Error::internal("dirty frame without an assigned block"))?;
        debug!("flushing block {} (tx {}, lsn {})", blk, self.tx_num, self.lsn);
        self.wal.flush(self.lsn)?;
        self.store.write(blk, &self.contents)?;
        self.tx_num = NO_TX;
        self.dirty = false;
        Ok(())
    }

    /// Returns the frame to the never-assigned state. Used when a block
    /// assignment fails mid-way so the slot can be handed out again.
    pub(crate) fn reset(&mut self) {
        self.block = None;
        self.contents.fill(0);
        self.pins = 0;
        self.dirty = false;
        self.tx_num = NO_TX;
        self.lsn = NO_LSN;
    }

    #[cfg(test)]
    pub(crate) fn lsn(&self) -> i64 {
        self.lsn
    }
}

/// Frame acts as the container of [`FrameData`] for providing concurrent
/// access protection. The pool hands out `Arc<Frame>`; a caller that pinned
/// the frame latches the contents through the lock.
pub struct Frame {
    inner: RwLock<FrameData>,
}

impl Frame {
    pub(crate) fn new(store: Arc<dyn BlockStore>, wal: Arc<dyn LogManager>) -> Self {
        Frame { inner: RwLock::new(FrameData::new(store, wal)) }
    }
}

impl Deref for Frame {
    type Target = RwLock<FrameData>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::Memory;
    use crate::storage::wal::NoopLog;

    fn frame() -> Frame {
        Frame::new(Arc::new(Memory::new(8)), Arc::new(NoopLog::new()))
    }

    #[test]
    fn test_new_frame_is_unassigned() -> Result<()> {
        let frame = frame();
        let data = frame.read()?;
        assert_eq!(None, data.block());
        assert!(!data.is_pinned());
        assert!(!data.is_dirty());
        assert_eq!(NO_TX, data.modifying_tx());
        assert_eq!(8, data.contents().len());
        Ok(())
    }

    #[test]
    fn test_set_modified_keeps_largest_lsn() -> Result<()> {
        let frame = frame();
        let mut data = frame.write()?;
        data.assign_to_block(BlockId::new("t", 0))?;
        data.set_modified(1, 5);
        assert_eq!(5, data.lsn());
        data.set_modified(1, 3);
        assert_eq!(5, data.lsn());
        // a negative lsn records the modification without a log dependency
        data.set_modified(1, -1);
        assert_eq!(5, data.lsn());
        assert!(data.is_dirty());
        assert_eq!(1, data.modifying_tx());
        Ok(())
    }

    #[test]
    #[should_panic(expected = "unassigned frame")]
    fn test_set_modified_unassigned_panics() {
        let frame = frame();
        frame.write().unwrap().set_modified(1, 1);
    }

    #[test]
    #[should_panic(expected = "not pinned")]
    fn test_unbalanced_unpin_panics() {
        let frame = frame();
        frame.write().unwrap().unpin();
    }

    #[test]
    fn test_assign_flushes_previous_block() -> Result<()> {
        let store = Arc::new(Memory::new(8));
        let frame = Frame::new(Arc::clone(&store) as Arc<dyn BlockStore>, Arc::new(NoopLog::new()));
        let mut data = frame.write()?;

        let old = BlockId::new("t", 0);
        data.assign_to_block(old.clone())?;
        data.contents_mut().copy_from_slice(b"oldblock");
        data.set_modified(3, 1);

        data.assign_to_block(BlockId::new("t", 1))?;
        assert!(!data.is_dirty());
        assert_eq!(NO_TX, data.modifying_tx());
        assert_eq!(Some(&BlockId::new("t", 1)), data.block());

        let mut buf = [0u8; 8];
        store.read(&old, &mut buf)?;
        assert_eq!(*b"oldblock", buf);
        Ok(())
    }

    #[test]
    fn test_flush_clean_frame_is_noop() -> Result<()> {
        let frame = frame();
        let mut data = frame.write()?;
        data.assign_to_block(BlockId::new("t", 0))?;
        data.flush()?;
        assert!(!data.is_dirty());
        Ok(())
    }
}
