//! Connectivity reporting used to choose between network and offline store.

use std::future::Future;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

use crate::config::{ConnectivityConfig, ConnectivityMode};

/// What the runtime knows about the current connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkStatus {
  pub online: bool,
  /// Measured downlink in Mbps, if the runtime reports one
  pub downlink_mbps: Option<f64>,
}

impl NetworkStatus {
  pub fn online() -> Self {
    Self {
      online: true,
      downlink_mbps: None,
    }
  }

  pub fn offline() -> Self {
    Self {
      online: false,
      downlink_mbps: None,
    }
  }

  pub fn with_downlink(mut self, mbps: f64) -> Self {
    self.downlink_mbps = Some(mbps);
    self
  }

  /// No connection, or a measured downlink below `min_downlink_mbps`.
  /// An unknown downlink never counts as low.
  pub fn is_low(&self, min_downlink_mbps: f64) -> bool {
    !self.online || self.downlink_mbps.is_some_and(|d| d < min_downlink_mbps)
  }
}

/// Source of connectivity reports.
pub trait Connectivity: Send + Sync {
  fn status(&self) -> impl Future<Output = NetworkStatus> + Send;
}

/// Always reports the same status.
#[derive(Debug, Clone, Copy)]
pub struct FixedConnectivity(pub NetworkStatus);

impl Connectivity for FixedConnectivity {
  async fn status(&self) -> NetworkStatus {
    self.0
  }
}

/// Reports online when a TCP connection to the API host succeeds in time.
#[derive(Debug, Clone)]
pub struct ProbeConnectivity {
  addr: String,
  timeout: Duration,
  downlink_mbps: Option<f64>,
}

impl ProbeConnectivity {
  pub fn new(api_url: &Url, timeout: Duration, downlink_mbps: Option<f64>) -> Self {
    let host = api_url.host_str().unwrap_or("localhost");
    let port = api_url.port_or_known_default().unwrap_or(80);
    Self {
      addr: format!("{}:{}", host, port),
      timeout,
      downlink_mbps,
    }
  }
}

impl Connectivity for ProbeConnectivity {
  async fn status(&self) -> NetworkStatus {
    let online = matches!(
      tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await,
      Ok(Ok(_))
    );
    debug!(addr = %self.addr, online, "Connectivity probe");
    NetworkStatus {
      online,
      downlink_mbps: self.downlink_mbps,
    }
  }
}

/// Connectivity selected from configuration.
#[derive(Debug, Clone)]
pub enum RuntimeConnectivity {
  Fixed(FixedConnectivity),
  Probe(ProbeConnectivity),
}

impl RuntimeConnectivity {
  pub fn from_config(config: &ConnectivityConfig, api_url: &Url) -> Self {
    let with_downlink = |status: NetworkStatus| match config.downlink_mbps {
      Some(mbps) => status.with_downlink(mbps),
      None => status,
    };

    match config.mode {
      ConnectivityMode::Online => {
        Self::Fixed(FixedConnectivity(with_downlink(NetworkStatus::online())))
      }
      ConnectivityMode::Offline => Self::Fixed(FixedConnectivity(NetworkStatus::offline())),
      ConnectivityMode::Auto => Self::Probe(ProbeConnectivity::new(
        api_url,
        Duration::from_millis(config.probe_timeout_ms),
        config.downlink_mbps,
      )),
    }
  }
}

impl Connectivity for RuntimeConnectivity {
  async fn status(&self) -> NetworkStatus {
    match self {
      Self::Fixed(c) => c.status().await,
      Self::Probe(c) => c.status().await,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_offline_is_low() {
    assert!(NetworkStatus::offline().is_low(0.5));
  }

  #[test]
  fn test_slow_downlink_is_low() {
    assert!(NetworkStatus::online().with_downlink(0.3).is_low(0.5));
    assert!(!NetworkStatus::online().with_downlink(0.5).is_low(0.5));
    assert!(!NetworkStatus::online().with_downlink(10.0).is_low(0.5));
  }

  #[test]
  fn test_unknown_downlink_is_not_low() {
    assert!(!NetworkStatus::online().is_low(0.5));
  }

  #[tokio::test]
  async fn test_forced_modes() {
    let url = Url::parse("http://localhost:1337/").unwrap();
    let config = ConnectivityConfig {
      mode: ConnectivityMode::Offline,
      ..ConnectivityConfig::default()
    };
    let status = RuntimeConnectivity::from_config(&config, &url).status().await;
    assert!(!status.online);

    let config = ConnectivityConfig {
      mode: ConnectivityMode::Online,
      downlink_mbps: Some(0.2),
      ..ConnectivityConfig::default()
    };
    let status = RuntimeConnectivity::from_config(&config, &url).status().await;
    assert!(status.online);
    assert!(status.is_low(0.5));
  }

  #[tokio::test]
  async fn test_probe_reports_offline_for_closed_port() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let url = Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
    let probe = ProbeConnectivity::new(&url, Duration::from_millis(200), None);
    assert!(!probe.status().await.online);
  }

  #[tokio::test]
  async fn test_probe_reports_online_for_listening_port() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let url = Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
    let probe = ProbeConnectivity::new(&url, Duration::from_millis(500), Some(2.0));
    let status = probe.status().await;
    assert!(status.online);
    assert_eq!(status.downlink_mbps, Some(2.0));
  }
}
