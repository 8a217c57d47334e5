//! Wallet loading
//!
//! Secrets arrive as base58 strings or JSON byte arrays, either inline from
//! configuration or one-per-line from a flat file. A file entry that fails
//! to decode is dropped with a warning; only an empty valid subset is fatal.

pub mod lists;
pub mod loader;

pub use lists::load_token_list;
pub use loader::{keypair_from_str, keypairs_from_file};
