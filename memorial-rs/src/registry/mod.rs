/// Media registry for a profile
///
/// Ordered photo and video collections, each item carrying the byte size
/// recorded at upload time. The registry never touches the usage ledger;
/// the media workflow pairs the two.

pub mod manager;
pub mod types;

pub use manager::MediaRegistry;
pub use types::{MediaItem, MediaKind};
