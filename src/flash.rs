pub mod bulk;
pub mod locator;

pub use bulk::{read_range, BulkReader, Chunk, ReadOutcome};
pub use locator::FlashLocator;
