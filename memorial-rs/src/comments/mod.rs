/// Guestbook comments shown on the memorial timeline
///
/// Reads are public; creating, editing and deleting require the admin role.

pub mod manager;
pub mod types;

pub use manager::CommentManager;
pub use types::{Comment, CreateCommentRequest, UpdateCommentRequest};
