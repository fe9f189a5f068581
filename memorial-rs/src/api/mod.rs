//! REST API module for memorial-rs
//!
//! Public read endpoints for the memorial page, JWT-protected endpoints for
//! editing it, and a Server-Sent Events feed of storage usage.

pub mod auth;
pub mod comments;
pub mod handlers;
pub mod media;
pub mod server;
pub mod usage;

pub use server::ApiServer;
