use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::restaurants::types::Restaurant;

/// Network side of the restaurant data.
pub trait RestaurantApi: Clone + Send + Sync {
  /// `GET {base}restaurants`
  fn fetch_all(&self) -> impl Future<Output = Result<Vec<Restaurant>>> + Send;

  /// `GET {base}restaurants/{id}`
  fn fetch_one(&self, id: u64) -> impl Future<Output = Result<Restaurant>> + Send;
}

/// Restaurant API client wrapper
#[derive(Clone)]
pub struct RestaurantClient {
  client: reqwest::Client,
  base: Url,
  timeout: Duration,
}

impl RestaurantClient {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let base = Url::parse(&config.url)?;
    let timeout = config.timeout();

    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| Error::from_reqwest(base.as_str(), timeout, e))?;

    Ok(Self {
      client,
      base,
      timeout,
    })
  }

  pub fn base(&self) -> &Url {
    &self.base
  }

  async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
    let url = self.base.join(path)?;
    debug!(%url, "GET");

    let response = self
      .client
      .get(url.clone())
      .send()
      .await
      .map_err(|e| Error::from_reqwest(url.as_str(), self.timeout, e))?;

    let status = response.status();
    if !status.is_success() {
      return Err(Error::Status {
        url: url.to_string(),
        status: status.as_u16(),
      });
    }

    let body = response
      .bytes()
      .await
      .map_err(|e| Error::from_reqwest(url.as_str(), self.timeout, e))?;

    Ok(serde_json::from_slice(&body)?)
  }
}

impl RestaurantApi for RestaurantClient {
  async fn fetch_all(&self) -> Result<Vec<Restaurant>> {
    self.get_json("restaurants").await
  }

  async fn fetch_one(&self, id: u64) -> Result<Restaurant> {
    self.get_json(&format!("restaurants/{}", id)).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;

  /// Serve a single canned HTTP response on a local port.
  async fn serve_once(status: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
      let (mut socket, _) = listener.accept().await.unwrap();
      let mut buf = [0u8; 1024];
      let _ = socket.read(&mut buf).await;
      let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
      );
      socket.write_all(response.as_bytes()).await.unwrap();
    });

    format!("http://{}/", addr)
  }

  fn client(url: String) -> RestaurantClient {
    RestaurantClient::new(&ApiConfig {
      url,
      timeout_secs: 2,
    })
    .unwrap()
  }

  #[tokio::test]
  async fn test_fetch_all_parses_array() {
    let url = serve_once(
      "200 OK",
      r#"[{"id":1,"name":"A","neighborhood":"Queens","cuisine_type":"Pizza"}]"#,
    )
    .await;

    let restaurants = client(url).fetch_all().await.unwrap();
    assert_eq!(restaurants.len(), 1);
    assert_eq!(restaurants[0].neighborhood.as_deref(), Some("Queens"));
  }

  #[tokio::test]
  async fn test_non_success_status_is_error() {
    let url = serve_once("404 Not Found", "{}").await;

    let err = client(url).fetch_one(99).await.unwrap_err();
    assert!(matches!(err, Error::Status { status: 404, .. }));
  }

  #[tokio::test]
  async fn test_refused_connection_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = client(format!("http://127.0.0.1:{}/", port))
      .fetch_all()
      .await
      .unwrap_err();
    assert!(err.is_network());
  }
}
