pub mod frame;
pub mod history;
pub mod pool;
pub mod queue;
mod replacer;

pub use frame::{Frame, FrameData};
pub use pool::BufferManager;
