use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::TtlPolicy;

pub const DEFAULT_API_URL: &str = "https://api.openf1.org/v1";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub database: DatabaseConfig,
  #[serde(default)]
  pub sync: SyncConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  pub base_url: String,
  /// Per-request timeout. Expiry counts as a retryable failure.
  pub timeout_secs: u64,
  pub max_attempts: u32,
  /// First backoff wait; each further wait doubles it
  pub retry_base_delay_secs: f64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_API_URL.to_string(),
      timeout_secs: 30,
      max_attempts: 3,
      retry_base_delay_secs: 1.0,
    }
  }
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }

  pub fn retry_base_delay(&self) -> Duration {
    Duration::try_from_secs_f64(self.retry_base_delay_secs).unwrap_or(Duration::ZERO)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Backend connection string: `sqlite://<path>`, `sqlite::memory:`, `memory://` or `none`.
  /// Defaults to a SQLite file in the user data directory.
  pub url: Option<String>,
  pub live_ttl_secs: u64,
  pub historical_ttl_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      url: None,
      live_ttl_secs: 5,
      historical_ttl_secs: 3600,
    }
  }
}

impl CacheConfig {
  pub fn ttl_policy(&self) -> TtlPolicy {
    TtlPolicy {
      live: Duration::from_secs(self.live_ttl_secs),
      historical: Duration::from_secs(self.historical_ttl_secs),
    }
  }

  /// Connection string to open, falling back to `<data dir>/pitwall/cache.db`.
  pub fn resolved_url(&self) -> String {
    match &self.url {
      Some(url) => url.clone(),
      None => match default_data_dir() {
        Some(dir) => format!("sqlite://{}", dir.join("cache.db").display()),
        None => "memory://".to_string(),
      },
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
  pub path: Option<PathBuf>,
}

impl DatabaseConfig {
  pub fn resolved_path(&self) -> Result<PathBuf> {
    if let Some(p) = &self.path {
      return Ok(p.clone());
    }
    default_data_dir()
      .map(|dir| dir.join("pitwall.db"))
      .ok_or_else(|| eyre!("Could not determine data directory"))
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
  /// Seasons pulled by `initial` when the local session table is empty
  pub initial_years: Vec<i32>,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      initial_years: vec![2023, 2024, 2025],
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// Default filter directive when RUST_LOG is unset
  pub level: String,
  /// Write daily-rotated log files here instead of stderr
  pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      directory: None,
    }
  }
}

fn default_data_dir() -> Option<PathBuf> {
  dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .map(|dir| dir.join("pitwall"))
}

impl Config {
  /// Load configuration from file, then apply environment overrides.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./pitwall.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/pitwall/config.yaml
  ///
  /// Built-in defaults are used when no file is found.
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

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    Ok(config.with_env_overrides(|name| std::env::var(name).ok()))
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("pitwall.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("pitwall").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    // An empty document deserializes to unit, not to an all-default struct
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Apply OPENF1_API_URL and PITWALL_CACHE_URL.
  fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
    if let Some(url) = lookup("OPENF1_API_URL").filter(|v| !v.is_empty()) {
      self.api.base_url = url;
    }
    if let Some(url) = lookup("PITWALL_CACHE_URL").filter(|v| !v.is_empty()) {
      self.cache.url = Some(url);
    }
    self
  }
}
