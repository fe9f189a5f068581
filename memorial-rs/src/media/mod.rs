/// Media workflow
///
/// Pairs the media host transport with the registry and the usage ledger:
/// admission first, then the remote call, then the registry change, then
/// the ledger update. A failed remote call leaves everything untouched.

pub mod service;

pub use service::{decode_data_uri, DeleteOutcome, MediaService, PurgeSummary};
