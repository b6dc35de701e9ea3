use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use log::debug;

use crate::error::{Error, Result};
use crate::storage::{BlockId, BlockStore, LogManager};

/// File-backed write-ahead log. Records are packed back to front into the
/// tail block; the first four bytes of the block hold the boundary, the
/// offset of the most recently written record. Appends only touch the
/// in-memory tail image, [`LogManager::flush`] makes it durable.
pub struct Wal {
    inner: Mutex<WalInner>,
}

struct WalInner {
    store: Arc<dyn BlockStore>,
    file_name: String,
    /// In-memory image of the tail block.
    page: Vec<u8>,
    current: BlockId,
    latest_lsn: i64,
    last_saved_lsn: i64,
}

/// Bytes taken by the boundary word at the front of every log block.
const BOUNDARY_SIZE: usize = 4;

impl Wal {
    pub fn new(store: Arc<dyn BlockStore>, file_name: impl Into<String>) -> Result<Wal> {
        let file_name = file_name.into();
        let block_size = store.block_size();
        if block_size < 2 * BOUNDARY_SIZE {
            return Err(Error::value(format!("block size {} too small for a log", block_size)));
        }
        let mut page = vec![0; block_size];
        let len = store.length(&file_name)?;
        let current = if len == 0 {
            let blk = store.append(&file_name)?;
            set_boundary(&mut page, block_size);
            store.write(&blk, &page)?;
            blk
        } else {
            let blk = BlockId::new(file_name.clone(), len - 1);
            store.read(&blk, &mut page)?;
            blk
        };
        let inner = WalInner { store, file_name, page, current, latest_lsn: 0, last_saved_lsn: 0 };
        Ok(Wal { inner: Mutex::new(inner) })
    }
}

impl WalInner {
    fn write_page(&mut self) -> Result<()> {
        self.store.write(&self.current, &self.page)?;
        self.last_saved_lsn = self.latest_lsn;
        Ok(())
    }
}

impl LogManager for Wal {
    fn append(&self, record: &[u8]) -> Result<i64> {
        let mut inner = self.inner.lock()?;
        let block_size = inner.page.len();
        let needed = BOUNDARY_SIZE + record.len();
        if needed + BOUNDARY_SIZE > block_size {
            return Err(Error::value(format!(
                "log record of {} bytes does not fit a {}-byte block",
                record.len(),
                block_size
            )));
        }
        let mut boundary = get_boundary(&inner.page);
        if boundary < needed + BOUNDARY_SIZE {
            // The record does not fit; roll over to a fresh tail block.
            inner.write_page()?;
            inner.current = inner.store.append(&inner.file_name)?;
            debug!("log rolled over to block {}", inner.current);
            inner.page.fill(0);
            boundary = block_size;
        }
        let recpos = boundary - needed;
        let len = record.len() as u32;
        inner.page[recpos..recpos + BOUNDARY_SIZE].copy_from_slice(&len.to_le_bytes());
        inner.page[recpos + BOUNDARY_SIZE..recpos + needed].copy_from_slice(record);
        set_boundary(&mut inner.page, recpos);
        inner.latest_lsn += 1;
        Ok(inner.latest_lsn)
    }

    fn flush(&self, lsn: i64) -> Result<()> {
        if lsn < 0 {
            return Ok(());
        }
        let mut inner = self.inner.lock()?;
        if lsn >= inner.last_saved_lsn {
            inner.write_page()?;
        }
        Ok(())
    }
}

fn get_boundary(page: &[u8]) -> usize {
    let word: [u8; BOUNDARY_SIZE] = page[..BOUNDARY_SIZE].try_into().expect("boundary word");
    u32::from_le_bytes(word) as usize
}

fn set_boundary(page: &mut [u8], boundary: usize) {
    page[..BOUNDARY_SIZE].copy_from_slice(&(boundary as u32).to_le_bytes());
}

/// Log manager for fixtures that need ordering but no durability.
pub struct NoopLog {
    next_lsn: AtomicI64,
}

impl NoopLog {
    pub fn new() -> NoopLog {
        NoopLog { next_lsn: AtomicI64::new(1) }
    }
}

impl Default for NoopLog {
    fn default() -> Self {
        NoopLog::new()
    }
}

impl LogManager for NoopLog {
    fn append(&self, _record: &[u8]) -> Result<i64> {
        Ok(self.next_lsn.fetch_add(1, Ordering::SeqCst))
    }

    fn flush(&self, _lsn: i64) -> Result<()> {
        Ok(())
    }
}
