//! Cache layer that decides between the network and the offline record store.

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::storage::RecordStore;
use super::traits::{CacheResult, Cacheable};
use crate::connectivity::Connectivity;
use crate::error::{Error, Result};

/// Cache layer that manages the offline snapshot and network fetching.
///
/// Every logical fetch first asks the connectivity source. With no network
/// or a slow one, the snapshot stored under `key` answers. Otherwise the
/// fetcher runs and its result is written through to the store.
pub struct CacheLayer<S: RecordStore, C: Connectivity> {
  storage: Arc<S>,
  connectivity: Arc<C>,
  /// Store key holding the full record snapshot
  key: String,
  /// Downlink (Mbps) below which the store is used instead of the network
  min_downlink_mbps: f64,
}

impl<S: RecordStore, C: Connectivity> CacheLayer<S, C> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S, connectivity: C, key: impl Into<String>) -> Self {
    Self {
      storage: Arc::new(storage),
      connectivity: Arc::new(connectivity),
      key: key.into(),
      min_downlink_mbps: 0.5,
    }
  }

  pub fn with_min_downlink(mut self, mbps: f64) -> Self {
    self.min_downlink_mbps = mbps;
    self
  }

  async fn is_low_connectivity(&self) -> bool {
    let status = self.connectivity.status().await;
    let low = status.is_low(self.min_downlink_mbps);
    if low {
      debug!(
        online = status.online,
        downlink = ?status.downlink_mbps,
        "Low connectivity, using offline store"
      );
    }
    low
  }

  /// Read the snapshot, treating an uninitialised store as empty.
  pub fn snapshot<T: Cacheable>(&self) -> Result<Vec<T>> {
    Ok(self.storage.get::<Vec<T>>(&self.key)?.unwrap_or_default())
  }

  /// Fetch the full collection.
  ///
  /// A network failure is returned as-is; there is no fallback to the
  /// snapshot on this path.
  pub async fn fetch_all<T, F, Fut>(&self, fetcher: F) -> Result<CacheResult<Vec<T>>>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    if self.is_low_connectivity().await {
      info!(key = %self.key, "Loading from offline store");
      return Ok(CacheResult::offline(self.snapshot()?));
    }

    let data = fetcher().await?;
    if let Err(e) = self.storage.set(&self.key, &data) {
      warn!(key = %self.key, error = %e, "Failed to write snapshot");
    }
    Ok(CacheResult::from_network(data))
  }

  /// Fetch a single record by id.
  pub async fn fetch_one<T, F, Fut>(&self, id: u64, fetcher: F) -> Result<CacheResult<T>>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    if self.is_low_connectivity().await {
      info!(key = %self.key, id, "Loading record from offline store");
      let record = self
        .snapshot::<T>()?
        .into_iter()
        .find(|r| r.id() == id)
        .ok_or(Error::NotFound { id })?;
      return Ok(CacheResult::offline(record));
    }

    let data = fetcher().await?;
    if let Err(e) = self.write_through_one(&data) {
      warn!(key = %self.key, id, error = %e, "Failed to write record");
    }
    Ok(CacheResult::from_network(data))
  }

  /// Append `record` to the snapshot unless a record with its id is
  /// already there.
  ///
  /// An existing copy is left untouched even if `record` differs, so a
  /// refreshed record keeps its older offline copy.
  pub fn write_through_one<T: Cacheable>(&self, record: &T) -> Result<()> {
    match self.storage.get::<Vec<T>>(&self.key) {
      Ok(Some(mut existing)) => {
        if existing.iter().any(|r| r.id() == record.id()) {
          debug!(id = record.id(), "Record already in offline store, keeping stored copy");
          return Ok(());
        }
        existing.push(record.clone());
        self.storage.set(&self.key, &existing)
      }
      Ok(None) => self.storage.set(&self.key, &vec![record.clone()]),
      Err(e) => {
        debug!(error = %e, "Offline snapshot unreadable, starting a new one");
        self.storage.set(&self.key, &vec![record.clone()])
      }
    }
  }
}

impl<S: RecordStore, C: Connectivity> Clone for CacheLayer<S, C> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      connectivity: Arc::clone(&self.connectivity),
      key: self.key.clone(),
      min_downlink_mbps: self.min_downlink_mbps,
    }
  }
}
