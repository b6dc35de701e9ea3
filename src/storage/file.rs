use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::storage::{BlockId, BlockStore};

/// File-backed block store. Every named file is a sequence of
/// `block_size`-byte blocks; block `n` lives at byte offset
/// `n * block_size`. Writes are synced to the medium before returning, so
/// a completed [`BlockStore::write`] is durable.
///
/// One handle table behind a mutex serializes access, which keeps the store
/// safe to share across frames without any caller-side coordination.
pub struct FileStore {
    dir: PathBuf,
    block_size: usize,
    files: Mutex<HashMap<String, File>>,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>, block_size: usize) -> Result<FileStore> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(FileStore { dir, block_size, files: Mutex::new(HashMap::new()) })
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

    fn open<'a>(&self, files: &'a mut HashMap<String, File>, name: &str) -> Result<&'a mut File> {
        let file = match files.entry(name.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .open(self.dir.join(name))?;
                entry.insert(file)
            }
        };
        Ok(file)
    }

    fn offset(&self, blk: &BlockId) -> u64 {
        blk.number() * self.block_size as u64
    }
}

impl BlockStore for FileStore {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read(&self, blk: &BlockId, buf: &mut [u8]) -> Result<()> {
        self.check_len(buf.len())?;
        let mut files = self.files.lock()?;
        let file = self.open(&mut files, blk.file_name())?;
        file.seek(SeekFrom::Start(self.offset(blk)))?;
        // Blocks at or past the end of the file read as zeroes.
        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf[filled..].fill(0);
        Ok(())
    }

    fn write(&self, blk: &BlockId, buf: &[u8]) -> Result<()> {
        self.check_len(buf.len())?;
        let mut files = self.files.lock()?;
        let file = self.open(&mut files, blk.file_name())?;
        file.seek(SeekFrom::Start(self.offset(blk)))?;
        file.write_all(buf)?;
        file.sync_all()?;
        Ok(())
    }

    fn append(&self, file_name: &str) -> Result<BlockId> {
        let mut files = self.files.lock()?;
        let file = self.open(&mut files, file_name)?;
        let number = file.metadata()?.len() / self.block_size as u64;
        let blk = BlockId::new(file_name, number);
        file.seek(SeekFrom::Start(number * self.block_size as u64))?;
        file.write_all(&vec![0; self.block_size])?;
        file.sync_all()?;
        Ok(blk)
    }

    fn length(&self, file_name: &str) -> Result<u64> {
        let mut files = self.files.lock()?;
        let file = self.open(&mut files, file_name)?;
        Ok(file.metadata()?.len() / self.block_size as u64)
    }
}
