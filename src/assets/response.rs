use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A response as stored in a cache generation.
///
/// Stored and returned verbatim; a stored response is only ever replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
  /// URL the response was fetched from
  pub url: String,
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
  pub stored_at: DateTime<Utc>,
}

impl CachedResponse {
  pub fn new(url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      url: url.into(),
      status,
      headers: Vec::new(),
      body: body.into(),
      stored_at: Utc::now(),
    }
  }

  #[cfg(test)]
  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Case-insensitive header lookup.
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  /// SHA256 of the body, hex encoded.
  pub fn digest(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(&self.body);
    hex::encode(hasher.finalize())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_success_range() {
    assert!(CachedResponse::new("a", 200, "").is_success());
    assert!(CachedResponse::new("a", 204, "").is_success());
    assert!(!CachedResponse::new("a", 304, "").is_success());
    assert!(!CachedResponse::new("a", 404, "").is_success());
  }

  #[test]
  fn test_header_lookup_ignores_case() {
    let response =
      CachedResponse::new("a", 200, "<html>").with_header("Content-Type", "text/html");
    assert_eq!(response.header("content-type"), Some("text/html"));
    assert_eq!(response.header("etag"), None);
  }

  #[test]
  fn test_digest_tracks_body() {
    let a = CachedResponse::new("a", 200, "same");
    let b = CachedResponse::new("b", 404, "same");
    let c = CachedResponse::new("a", 200, "other");
    assert_eq!(a.digest(), b.digest());
    assert_ne!(a.digest(), c.digest());
    assert_eq!(a.digest().len(), 64);
  }
}
