use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub connectivity: ConnectivityConfig,
  #[serde(default)]
  pub store: StoreConfig,
  #[serde(default)]
  pub assets: AssetConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the restaurant API, with trailing slash
  #[serde(default = "default_api_url")]
  pub url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: default_api_url(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityMode {
  /// Probe the API host before each logical fetch
  #[default]
  Auto,
  /// Always report a working connection
  Online,
  /// Always report no connection
  Offline,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectivityConfig {
  #[serde(default)]
  pub mode: ConnectivityMode,
  /// Below this measured downlink the offline store is used
  #[serde(default = "default_min_downlink")]
  pub min_downlink_mbps: f64,
  /// Measured downlink to report, if known
  pub downlink_mbps: Option<f64>,
  #[serde(default = "default_probe_timeout_ms")]
  pub probe_timeout_ms: u64,
}

impl Default for ConnectivityConfig {
  fn default() -> Self {
    Self {
      mode: ConnectivityMode::default(),
      min_downlink_mbps: default_min_downlink(),
      downlink_mbps: None,
      probe_timeout_ms: default_probe_timeout_ms(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
  /// Record store database (default: $XDG_DATA_HOME/rdir/records.db)
  pub path: Option<PathBuf>,
}

/// Settings for the intercepting asset cache.
///
/// Passed to the worker at construction so several versions can coexist in
/// one process (e.g. an installing v4 next to an active v3).
#[derive(Debug, Clone, Deserialize)]
pub struct AssetConfig {
  /// Origin the manifest paths are resolved against
  #[serde(default = "default_origin")]
  pub origin: String,
  /// Application name, used as the generation naming prefix
  #[serde(default = "default_app")]
  pub app: String,
  /// Bumped on every deploy that changes the manifest
  #[serde(default = "default_version")]
  pub version: u32,
  #[serde(default = "default_manifest")]
  pub manifest: Vec<String>,
  #[serde(default = "default_index_page")]
  pub index_page: String,
  #[serde(default = "default_detail_page")]
  pub detail_page: String,
  /// Cross-origin hosts whose requests are forced into CORS mode
  #[serde(default = "default_cors_hosts")]
  pub cors_hosts: Vec<String>,
  /// Generation database (default: $XDG_DATA_HOME/rdir/assets.db)
  pub path: Option<PathBuf>,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for AssetConfig {
  fn default() -> Self {
    Self {
      origin: default_origin(),
      app: default_app(),
      version: default_version(),
      manifest: default_manifest(),
      index_page: default_index_page(),
      detail_page: default_detail_page(),
      cors_hosts: default_cors_hosts(),
      path: None,
      timeout_secs: default_timeout_secs(),
    }
  }
}

impl AssetConfig {
  /// Prefix shared by every generation this application owns.
  pub fn prefix(&self) -> String {
    format!("{}-", self.app)
  }

  /// Name of the current generation, e.g. `restaurant-static-v3`.
  pub fn generation_name(&self) -> String {
    format!("{}static-v{}", self.prefix(), self.version)
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

fn default_api_url() -> String {
  "http://localhost:1337/".to_string()
}

fn default_timeout_secs() -> u64 {
  10
}

fn default_min_downlink() -> f64 {
  0.5
}

fn default_probe_timeout_ms() -> u64 {
  750
}

fn default_origin() -> String {
  "http://localhost:8000/".to_string()
}

fn default_app() -> String {
  "restaurant".to_string()
}

fn default_version() -> u32 {
  3
}

fn default_manifest() -> Vec<String> {
  [
    "index.html",
    "restaurant.html",
    "js/main.js",
    "js/dbhelper.js",
    "js/restaurant_info.js",
    "data/restaurants.json",
    "css/styles.css",
  ]
  .into_iter()
  .map(String::from)
  .collect()
}

fn default_index_page() -> String {
  "index.html".to_string()
}

fn default_detail_page() -> String {
  "restaurant.html".to_string()
}

fn default_cors_hosts() -> Vec<String> {
  vec!["maps.googleapis.com".to_string()]
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./rdir.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/rdir/config.yaml
  ///
  /// Falls back to built-in defaults when no file exists.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("rdir.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("rdir").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Directory for the record store, asset generations and logs.
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("rdir"))
  }

  pub fn store_path(&self) -> Result<PathBuf> {
    match &self.store.path {
      Some(p) => Ok(p.clone()),
      None => Ok(Self::data_dir()?.join("records.db")),
    }
  }

  pub fn assets_path(&self) -> Result<PathBuf> {
    match &self.assets.path {
      Some(p) => Ok(p.clone()),
      None => Ok(Self::data_dir()?.join("assets.db")),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_file_uses_defaults() {
    let config = Config::parse("{}").unwrap();
    assert_eq!(config.api.url, "http://localhost:1337/");
    assert_eq!(config.connectivity.min_downlink_mbps, 0.5);
    assert_eq!(config.connectivity.mode, ConnectivityMode::Auto);
    assert_eq!(config.assets.manifest.len(), 7);
    assert_eq!(config.assets.generation_name(), "restaurant-static-v3");
  }

  #[test]
  fn test_partial_sections() {
    let yaml = r#"
connectivity:
  mode: offline
assets:
  version: 4
  manifest: ["index.html", "app.js"]
"#;
    let config = Config::parse(yaml).unwrap();
    assert_eq!(config.connectivity.mode, ConnectivityMode::Offline);
    assert_eq!(config.assets.manifest, vec!["index.html", "app.js"]);
    assert_eq!(config.assets.generation_name(), "restaurant-static-v4");
    assert_eq!(config.assets.detail_page, "restaurant.html");
  }

  #[test]
  fn test_prefix_follows_app_name() {
    let config = AssetConfig {
      app: "diner".into(),
      version: 1,
      ..AssetConfig::default()
    };
    assert_eq!(config.prefix(), "diner-");
    assert_eq!(config.generation_name(), "diner-static-v1");
  }

  #[test]
  fn test_explicit_missing_path_is_error() {
    let result = Config::load(Some(Path::new("/nonexistent/rdir.yaml")));
    assert!(result.is_err());
  }
}
