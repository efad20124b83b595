//! Outgoing requests seen by the asset cache and their cache keys.

use url::Url;

use crate::config::AssetConfig;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
  /// Default mode, whatever the caller asked for
  NoCors,
  /// Forced cross-origin mode for known mapping hosts
  Cors,
}

/// A request intercepted on its way to the network.
#[derive(Debug, Clone)]
pub struct AssetRequest {
  /// The URL as issued, never rewritten
  pub url: Url,
  pub mode: RequestMode,
  pub headers: Vec<(String, String)>,
}

impl AssetRequest {
  pub fn get(url: Url) -> Self {
    Self {
      url,
      mode: RequestMode::NoCors,
      headers: Vec::new(),
    }
  }
}

/// Resolve `url` against the configured origin; absolute URLs pass through.
pub fn resolve(url: &str, config: &AssetConfig) -> Result<Url> {
  Ok(Url::parse(&config.origin)?.join(url)?)
}

/// Cache key for a request URL.
///
/// Every detail page (`restaurant.html?id=N`) shares the key of the bare
/// detail page, and the origin root maps to the index document. All other
/// URLs key on their full string form.
pub fn normalize_key(url: &Url, config: &AssetConfig) -> Result<String> {
  let origin = Url::parse(&config.origin)?;

  if url.origin() == origin.origin() {
    let detail = origin.join(&config.detail_page)?;
    if url.path() == detail.path() && url.query_pairs().any(|(k, _)| k == "id") {
      return Ok(detail.to_string());
    }

    if url.path() == "/" {
      return Ok(origin.join(&config.index_page)?.to_string());
    }
  }

  Ok(url.to_string())
}

/// Build the request for `url`, forcing CORS mode for mapping hosts.
///
/// The permissive origin header is best-effort; the upstream is free to
/// ignore it.
pub fn prepare_request(url: Url, config: &AssetConfig) -> AssetRequest {
  let mut request = AssetRequest::get(url);

  let is_cors_host = request
    .url
    .host_str()
    .is_some_and(|h| config.cors_hosts.iter().any(|c| c.eq_ignore_ascii_case(h)));

  if is_cors_host {
    request.mode = RequestMode::Cors;
    request
      .headers
      .push(("Access-Control-Allow-Origin".to_string(), "*".to_string()));
  }

  request
}
