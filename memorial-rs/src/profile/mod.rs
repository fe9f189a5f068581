/// Memorial profile: biography, the ordered media collections and the
/// combined public timeline

pub mod service;
pub mod timeline;

pub use service::{ProfileService, ProfileView};
pub use timeline::{merge_timeline, TimelineEntry};
