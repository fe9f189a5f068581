//! Security module
//!
//! - [`auth`]: administrator accounts with Argon2 password hashes
//! - [`identity`]: the caller identity and role checked by every mutation

pub mod auth;
pub mod identity;

pub use auth::{Authenticator, UserRecord};
pub use identity::{Identity, Role};
