//! Consumer-side pipeline: per-partition buffering and batch processing.

pub mod batch_processor;
pub mod buffer;

pub use batch_processor::OffsetTracker;
pub use buffer::ConsumerBuffer;
