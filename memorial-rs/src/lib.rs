//! memorial-rs: backend for a memorial page with a bounded media budget
//!
//! A single profile holds a biography, ordered photo and video collections
//! and a guestbook. Media binaries live on an external host; this crate
//! keeps the metadata and an authoritative running total of stored bytes
//! that gates every upload against a fixed storage quota.
//!
//! # Example
//!
//! ```no_run
//! use memorial_rs::api::ApiServer;
//! use memorial_rs::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     let server = ApiServer::from_config(&config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`quota`]: admission rule, per-file caps and text bounds
//! - [`ledger`]: authoritative usage total and its reconciliation
//! - [`registry`]: photo and video metadata collections
//! - [`observer`]: live usage snapshots for presentation layers
//! - [`media`]: upload/delete workflow tying the above together
//! - [`transport`]: external media host clients
//! - [`store`]: profile document persistence
//! - [`profile`], [`comments`]: biography and guestbook
//! - [`security`]: accounts and caller identity
//! - [`api`]: HTTP surface

pub mod api;
pub mod comments;
pub mod config;
pub mod error;
pub mod ledger;
pub mod media;
pub mod observer;
pub mod profile;
pub mod quota;
pub mod registry;
pub mod security;
pub mod store;
pub mod transport;

pub use error::{MemorialError, Result};
