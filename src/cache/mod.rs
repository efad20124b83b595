//! Offline record caching.
//!
//! This module provides the structured record store and the layer that
//! decides per fetch whether to use the network or the store:
//! - Keeps one snapshot of every record ever fetched under a fixed key
//! - Serves the snapshot when connectivity is absent or too slow
//! - Writes successful network reads through to the snapshot

mod layer;
mod storage;
mod traits;

pub use layer::CacheLayer;
#[cfg(test)]
pub use storage::MemoryStorage;
pub use storage::{RecordStore, SqliteStorage};
pub use traits::{CacheResult, Cacheable};
