use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, PartialEq, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct Config {
    pub log_level: LogLevel,
    /// Size in bytes of every disk block and of every frame.
    pub block_size: usize,
    /// Maximum number of frames the pool may hold.
    pub pool_capacity: usize,
    /// Upper bound in milliseconds on how long a pin request may wait
    /// for a frame before it aborts.
    pub max_wait_ms: u64,
    /// Directory holding the data and log files.
    pub data_dir: String,
}

impl Config {
    pub fn new(file: &str) -> Result<Config> {
        let mut cfg = config::Config::builder()
            .set_default("log_level", "debug")?
            .set_default("block_size", 400_i64)?
            .set_default("pool_capacity", 8_i64)?
            .set_default("max_wait_ms", 10_000_i64)?
            .set_default("data_dir", "data")?;
        if !file.is_empty() {
            cfg = cfg.add_source(config::File::with_name(file))
        }
        cfg = cfg.add_source(config::Environment::with_prefix("BLOCKBUF"));
        Ok(cfg.build()?.try_deserialize()?)
    }
}
