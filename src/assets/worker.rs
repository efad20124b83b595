//! Asset worker: installs, activates and serves one cache generation.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info, warn};

use super::fetcher::Fetch;
use super::request::{normalize_key, prepare_request, resolve};
use super::response::CachedResponse;
use super::storage::GenerationStorage;
use crate::config::AssetConfig;
use crate::error::{Error, Result};

/// Where a worker is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
  /// Created, manifest not (fully) stored yet
  Installing,
  /// Manifest stored, older generations may still exist
  Installed,
  /// Serving requests; older generations deleted
  Active,
  /// Replaced by a newer version
  Superseded,
}

/// Intercepting cache for one generation of static assets.
pub struct AssetWorker<S: GenerationStorage, F: Fetch> {
  storage: Arc<S>,
  fetcher: F,
  config: AssetConfig,
  state: Lifecycle,
}

impl<S: GenerationStorage, F: Fetch> AssetWorker<S, F> {
  pub fn new(storage: Arc<S>, fetcher: F, config: AssetConfig) -> Self {
    Self {
      storage,
      fetcher,
      config,
      state: Lifecycle::Installing,
    }
  }

  /// Resume a worker whose generation was installed by an earlier run.
  ///
  /// The worker counts as installed only if every manifest entry is stored.
  pub fn resume(storage: Arc<S>, fetcher: F, config: AssetConfig) -> Result<Self> {
    let mut worker = Self::new(storage, fetcher, config);
    let name = worker.generation();
    if worker.storage.exists(&name)? {
      let stored = worker.storage.keys(&name)?;
      let mut complete = true;
      for path in &worker.config.manifest {
        let key = normalize_key(&resolve(path, &worker.config)?, &worker.config)?;
        complete &= stored.contains(&key);
      }
      if complete {
        worker.state = Lifecycle::Installed;
      }
    }
    Ok(worker)
  }

  pub fn state(&self) -> Lifecycle {
    self.state
  }

  pub fn config(&self) -> &AssetConfig {
    &self.config
  }

  /// Name of the generation this worker owns.
  pub fn generation(&self) -> String {
    self.config.generation_name()
  }

  /// All generation names currently in storage.
  pub fn generations(&self) -> Result<Vec<String>> {
    self.storage.names()
  }

  /// Keys stored in this worker's generation.
  pub fn keys(&self) -> Result<Vec<String>> {
    self.storage.keys(&self.generation())
  }

  /// Create the generation and populate it with the whole manifest.
  ///
  /// Either every manifest entry is stored or none is: a single failed or
  /// non-success fetch fails the install, which can then be retried.
  pub async fn install(&mut self) -> Result<usize> {
    self.state = Lifecycle::Installing;
    let name = self.generation();
    self.storage.open(&name)?;

    let entries = try_join_all(
      self
        .config
        .manifest
        .iter()
        .map(|path| self.fetch_manifest_entry(path)),
    )
    .await
    .inspect_err(|e| warn!(generation = %name, error = %e, "Install failed"))?;

    self.storage.put_all(&name, &entries)?;
    self.state = Lifecycle::Installed;
    info!(generation = %name, entries = entries.len(), "Installed asset cache");

    Ok(entries.len())
  }

  async fn fetch_manifest_entry(&self, path: &str) -> Result<(String, CachedResponse)> {
    let wrap = |source: Error| Error::ManifestFetch {
      path: path.to_string(),
      source: Box::new(source),
    };

    let url = resolve(path, &self.config).map_err(wrap)?;
    let key = normalize_key(&url, &self.config).map_err(wrap)?;
    let request = prepare_request(url, &self.config);

    let response = self.fetcher.fetch(&request).await.map_err(wrap)?;
    if !response.is_success() {
      return Err(wrap(Error::Status {
        url: response.url,
        status: response.status,
      }));
    }

    Ok((key, response))
  }

  /// Delete every generation of this application except the current one.
  ///
  /// Returns the names that were deleted.
  pub async fn activate(&mut self) -> Result<Vec<String>> {
    if !matches!(self.state, Lifecycle::Installed | Lifecycle::Active) {
      return Err(Error::NotInstalled(self.generation()));
    }

    let current = self.generation();
    let prefix = self.config.prefix();
    let mut deleted = Vec::new();

    for name in self.storage.names()? {
      if name.starts_with(&prefix) && name != current {
        self.storage.delete(&name)?;
        info!(generation = %name, "Deleted stale asset cache");
        deleted.push(name);
      }
    }

    self.state = Lifecycle::Active;
    info!(generation = %current, "Activated asset cache");
    Ok(deleted)
  }

  /// Mark this worker as replaced; it stops serving requests.
  #[allow(dead_code)]
  pub fn supersede(&mut self) {
    self.state = Lifecycle::Superseded;
  }

  /// Answer an outgoing request from the cache, or from the network on a miss.
  ///
  /// Hits are returned verbatim with no freshness check. Successful network
  /// responses are stored under the normalized key; other statuses are
  /// passed through uncached.
  pub async fn intercept(&self, url: &str) -> Result<CachedResponse> {
    if self.state != Lifecycle::Active {
      return Err(Error::NotInstalled(self.generation()));
    }

    let name = self.generation();
    let url = resolve(url, &self.config)?;
    let key = normalize_key(&url, &self.config)?;
    let request = prepare_request(url, &self.config);

    if let Some(hit) = self.storage.lookup(&name, &key)? {
      debug!(%key, "Asset cache hit");
      return Ok(hit);
    }

    debug!(%key, url = %request.url, "Asset cache miss");
    let response = self
      .fetcher
      .fetch(&request)
      .await
      .inspect_err(|e| warn!(url = %request.url, error = %e, "Fetch failed"))?;

    if response.is_success() {
      match self.storage.put(&name, &key, &response) {
        Ok(true) => {}
        Ok(false) => debug!(generation = %name, %key, "Generation deleted, response not stored"),
        Err(e) => warn!(%key, error = %e, "Failed to store response"),
      }
    } else {
      debug!(%key, status = response.status, "Not caching unsuccessful response");
    }

    Ok(response)
  }
}
