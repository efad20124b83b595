use std::future::Future;
use std::time::Duration;

use tracing::debug;

use super::request::{AssetRequest, RequestMode};
use super::response::CachedResponse;
use crate::error::{Error, Result};

/// The real network behind the asset cache.
///
/// Implementations return any HTTP response the server sends; only
/// transport failures are errors.
pub trait Fetch: Send + Sync {
  fn fetch(&self, request: &AssetRequest) -> impl Future<Output = Result<CachedResponse>> + Send;
}

/// reqwest-backed fetcher with an overall request timeout.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
  timeout: Duration,
  /// Sent as `Origin` on CORS-mode requests
  origin: String,
}

impl HttpFetcher {
  pub fn new(timeout: Duration, origin: impl Into<String>) -> Result<Self> {
    let origin = origin.into();
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| Error::from_reqwest(&origin, timeout, e))?;

    Ok(Self {
      client,
      timeout,
      origin,
    })
  }
}

impl Fetch for HttpFetcher {
  async fn fetch(&self, request: &AssetRequest) -> Result<CachedResponse> {
    let url = request.url.as_str();
    let mut builder = self.client.get(request.url.clone());
    for (name, value) in &request.headers {
      builder = builder.header(name.as_str(), value.as_str());
    }
    if request.mode == RequestMode::Cors {
      builder = builder.header("Origin", self.origin.trim_end_matches('/'));
    }

    let response = builder
      .send()
      .await
      .map_err(|e| Error::from_reqwest(url, self.timeout, e))?;

    let status = response.status().as_u16();
    let headers: Vec<(String, String)> = response
      .headers()
      .iter()
      .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
      .collect();
    let body = response
      .bytes()
      .await
      .map_err(|e| Error::from_reqwest(url, self.timeout, e))?;

    debug!(url, status, bytes = body.len(), "Fetched from network");

    let mut cached = CachedResponse::new(url, status, body.to_vec());
    cached.headers = headers;
    Ok(cached)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;
  use url::Url;

  #[tokio::test]
  async fn test_fetch_keeps_status_and_headers() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      let (mut socket, _) = listener.accept().await.unwrap();
      let mut buf = [0u8; 1024];
      let _ = socket.read(&mut buf).await;
      socket
        .write_all(
          b"HTTP/1.1 404 Not Found\r\nContent-Type: text/plain\r\nContent-Length: 4\r\nConnection: close\r\n\r\nnope",
        )
        .await
        .unwrap();
    });

    let fetcher = HttpFetcher::new(Duration::from_secs(2), "http://localhost:8000/").unwrap();
    let url = Url::parse(&format!("http://{}/missing.css", addr)).unwrap();
    let response = fetcher.fetch(&AssetRequest::get(url)).await.unwrap();

    assert_eq!(response.status, 404);
    assert_eq!(response.header("content-type"), Some("text/plain"));
    assert_eq!(response.body, b"nope");
  }

  #[tokio::test]
  async fn test_hung_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      let (_socket, _) = listener.accept().await.unwrap();
      tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let fetcher = HttpFetcher::new(Duration::from_millis(200), "http://localhost:8000/").unwrap();
    let url = Url::parse(&format!("http://{}/app.js", addr)).unwrap();
    let err = fetcher.fetch(&AssetRequest::get(url)).await.unwrap_err();

    assert!(matches!(err, Error::Timeout { .. }));
  }
}
