//! Error types shared by the record store, the data access layer and the
//! asset cache.

use std::time::Duration;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The request was rejected before a response arrived.
  #[error("request to {url} failed: {reason}")]
  Network { url: String, reason: String },

  /// The server answered with a non-success status.
  #[error("request to {url} returned HTTP {status}")]
  Status { url: String, status: u16 },

  #[error("request to {url} timed out after {after:?}")]
  Timeout { url: String, after: Duration },

  /// No record with this id exists in the offline snapshot.
  #[error("restaurant {id} not found in offline store")]
  NotFound { id: u64 },

  #[error("no restaurant id in URL {url}")]
  MissingId { url: String },

  /// One manifest entry could not be fetched during install.
  #[error("failed to cache manifest entry {path}: {source}")]
  ManifestFetch {
    path: String,
    #[source]
    source: Box<Error>,
  },

  #[error("asset cache generation {0} is not installed")]
  NotInstalled(String),

  #[error("storage error: {0}")]
  Storage(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("invalid URL: {0}")]
  InvalidUrl(#[from] url::ParseError),
}

impl Error {
  /// Whether the failure came from the network rather than local state.
  pub fn is_network(&self) -> bool {
    matches!(
      self,
      Error::Network { .. } | Error::Status { .. } | Error::Timeout { .. }
    )
  }

  /// Build a network error from a reqwest failure, keeping timeouts distinct.
  pub fn from_reqwest(url: &str, timeout: Duration, err: reqwest::Error) -> Self {
    if err.is_timeout() {
      Error::Timeout {
        url: url.to_string(),
        after: timeout,
      }
    } else {
      Error::Network {
        url: url.to_string(),
        reason: err.to_string(),
      }
    }
  }
}

impl From<rusqlite::Error> for Error {
  fn from(err: rusqlite::Error) -> Self {
    Error::Storage(err.to_string())
  }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
  fn from(err: std::sync::PoisonError<T>) -> Self {
    Error::Storage(format!("Lock poisoned: {}", err))
  }
}
