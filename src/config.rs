use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::pokeapi::client::{DEFAULT_BASE_URL, DEFAULT_REQUEST_DELAY};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Fixed wait before every request, in milliseconds
  #[serde(default = "default_request_delay_ms")]
  pub request_delay_ms: u64,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      request_delay_ms: default_request_delay_ms(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Keep fetched payloads in a SQLite file between runs
  #[serde(default)]
  pub persist: bool,
  /// Persisted payloads older than this are fetched again
  #[serde(default = "default_max_age_hours")]
  pub max_age_hours: u32,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      persist: false,
      max_age_hours: default_max_age_hours(),
    }
  }
}

fn default_base_url() -> String {
  DEFAULT_BASE_URL.to_string()
}

fn default_request_delay_ms() -> u64 {
  DEFAULT_REQUEST_DELAY.as_millis() as u64
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_max_age_hours() -> u32 {
  24
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./pokedex.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/pokedex/config.yaml
  ///
  /// With no file at all, defaults are used. `POKEDEX_BASE_URL` overrides
  /// the configured base URL either way.
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

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    if let Ok(url) = std::env::var("POKEDEX_BASE_URL") {
      config.api.base_url = url;
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("pokedex.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("pokedex").join("config.yaml");
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
    // An empty file deserializes to unit, not to an empty mapping
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Maximum age of persisted payloads.
  pub fn max_age(&self) -> chrono::Duration {
    chrono::Duration::hours(i64::from(self.cache.max_age_hours))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.api.base_url, "https://pokeapi.co/api/v2");
    assert_eq!(config.api.request_delay_ms, 1000);
    assert!(!config.cache.persist);
    assert_eq!(config.max_age(), chrono::Duration::hours(24));
  }

  #[test]
  fn test_partial_file_keeps_defaults() {
    let config = Config::parse("cache:\n  persist: true\n").unwrap();
    assert!(config.cache.persist);
    assert_eq!(config.cache.max_age_hours, 24);
    assert_eq!(config.api.timeout_secs, 30);
  }

  #[test]
  fn test_empty_file() {
    let config = Config::parse("\n").unwrap();
    assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
  }

  #[test]
  fn test_load_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pokedex.yaml");
    std::fs::write(
      &path,
      "api:\n  request_delay_ms: 0\n  timeout_secs: 5\ncache:\n  max_age_hours: 1\n",
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.api.request_delay_ms, 0);
    assert_eq!(config.api.timeout_secs, 5);
    assert_eq!(config.max_age(), chrono::Duration::hours(1));
  }

  #[test]
  fn test_missing_explicit_path_is_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Config::load(Some(&dir.path().join("missing.yaml"))).is_err());
  }
}
