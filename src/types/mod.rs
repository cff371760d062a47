mod frame;
mod geometry;
mod metadata;
mod sample;

pub use frame::{ChecksumOrder, Frame};
pub use geometry::{is_erased, FlashGeometry};
pub use metadata::{LoggingConfig, LoggingStatus, SessionMetadata};
pub use sample::Sample;
