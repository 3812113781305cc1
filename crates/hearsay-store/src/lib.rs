//! Rumor storage for the Hearsay engine.
//!
//! Each rumor is stored as one [`hearsay_types::RumorRecord`] aggregate
//! (rumor, variant tree, spread map, spread history). The store guarantees:
//!
//! - Writes to the same rumor are serialized; writes to different rumors
//!   are not.
//! - A write either commits completely or leaves the record untouched.
//! - No committed record ever holds a spread whose variant it does not own.
//! - Every committed write bumps the record's version, which callers can
//!   use for optimistic concurrency.
//!
//! # Modules
//!
//! - [`memory`] -- The [`RumorStore`] and its entity index.
//! - [`snapshot`] -- JSON snapshot save and load.
//! - [`error`] -- [`StoreError`].

pub mod error;
pub mod memory;
pub mod snapshot;

pub use error::StoreError;
pub use memory::RumorStore;
pub use snapshot::SNAPSHOT_FORMAT_VERSION;
