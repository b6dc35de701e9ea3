use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod file;
pub mod memory;
pub mod wal;

/// Identifies one fixed-size block of a named file. Blocks are the unit
/// of transfer between the store and the buffer pool.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BlockId {
    file_name: String,
    number: u64,
}

impl BlockId {
    pub fn new(file_name: impl Into<String>, number: u64) -> Self {
        BlockId { file_name: file_name.into(), number }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn number(&self) -> u64 {
        self.number
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file_name, self.number)
    }
}

/// A block-oriented store of fixed-size blocks addressed by [`BlockId`].
/// Reads and writes are synchronous; implementations are internally
/// thread-safe so they can be shared across frames.
///
/// The trait is designed as trait-object compatible so the buffer pool can
/// hold it behind `Arc<dyn BlockStore>` and swap implementations in tests.
pub trait BlockStore: Send + Sync {
    /// Size in bytes of every block in the store.
    fn block_size(&self) -> usize;

    /// Reads the block into `buf`, which must be exactly `block_size` bytes.
    /// Blocks that were never written read as zeroes.
    fn read(&self, blk: &BlockId, buf: &mut [u8]) -> Result<()>;

    /// Writes `buf`, which must be exactly `block_size` bytes, to the block,
    /// growing the backing file as needed.
    fn write(&self, blk: &BlockId, buf: &[u8]) -> Result<()>;

    /// Allocates a zeroed block at the end of the file and returns its id.
    fn append(&self, file_name: &str) -> Result<BlockId>;

    /// Number of blocks currently in the file.
    fn length(&self, file_name: &str) -> Result<u64>;
}

/// The write-ahead log face consumed by the buffer pool. The buffer pool
/// only ever asks the log to become durable up to an LSN; appending records
/// is the concern of the transaction layer above.
pub trait LogManager: Send + Sync {
    /// Appends a record and returns its LSN. LSNs increase monotonically.
    fn append(&self, record: &[u8]) -> Result<i64>;

    /// Makes every record with sequence number `<= lsn` durable. Negative
    /// `lsn` is a no-op. Idempotent.
    fn flush(&self, lsn: i64) -> Result<()>;
}
