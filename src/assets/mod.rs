//! Intercepting asset cache.
//!
//! Serves static application assets and previously seen responses from a
//! versioned cache generation, falling back to the network on a miss:
//! - `install` populates the current generation from a fixed manifest
//! - `activate` deletes every other generation of this application
//! - `intercept` answers requests, storing successful network responses

mod fetcher;
mod request;
mod response;
mod storage;
mod worker;

pub use fetcher::HttpFetcher;
pub use storage::SqliteGenerations;
pub use worker::{AssetWorker, Lifecycle};
