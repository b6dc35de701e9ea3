use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::storage::{BlockId, BlockStore};

/// In-memory block store, the volatile twin of [`super::file::FileStore`].
/// Blocks that were never written read as zeroes, matching the file-backed
/// behavior for fresh blocks.
pub struct Memory {
    block_size: usize,
    blocks: Mutex<HashMap<BlockId, Vec<u8>>>,
}

impl Memory {
    pub fn new(block_size: usize) -> Memory {
        Memory { block_size, blocks: Mutex::new(HashMap::new()) }
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len != self.block_size {
            return Err(Error::value(format!(
                "buffer is {} bytes, block size is {}",
                len, self.block_size
            )));
        }
        Ok(())
    }
}

impl BlockStore for Memory {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read(&self, blk: &BlockId, buf: &mut [u8]) -> Result<()> {
        self.check_len(buf.len())?;
        let blocks = self.blocks.lock()?;
        match blocks.get(blk) {
            Some(data) => buf.copy_from_slice(data),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write(&self, blk: &BlockId, buf: &[u8]) -> Result<()> {
        self.check_len(buf.len())?;
        let mut blocks = self.blocks.lock()?;
        blocks.insert(blk.clone(), buf.to_vec());
        Ok(())
    }

    fn append(&self, file_name: &str) -> Result<BlockId> {
        let mut blocks = self.blocks.lock()?;
        let number = blocks
            .keys()
            .filter(|b| b.file_name() == file_name)
            .map(|b| b.number() + 1)
            .max()
            .unwrap_or(0);
        let blk = BlockId::new(file_name, number);
        blocks.insert(blk.clone(), vec![0; self.block_size]);
        Ok(blk)
    }

    fn length(&self, file_name: &str) -> Result<u64> {
        let blocks = self.blocks.lock()?;
        let len = blocks
            .keys()
            .filter(|b| b.file_name() == file_name)
            .map(|b| b.number() + 1)
            .max()
            .unwrap_or(0);
        Ok(len)
    }
}
