use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::db::Database;

const DEFAULT_PLAYLIST_URL: &str = "https://devbytes.udacity.com/devbytes.json";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub playlist: PlaylistConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistConfig {
  /// Endpoint returning `{ "videos": [...] }`
  #[serde(default = "default_playlist_url")]
  pub url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for PlaylistConfig {
  fn default() -> Self {
    Self {
      url: default_playlist_url(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

fn default_playlist_url() -> String {
  DEFAULT_PLAYLIST_URL.to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  /// Database file (defaults to $XDG_DATA_HOME/devbytes/videos.db)
  pub path: Option<PathBuf>,
}

impl CacheConfig {
  pub fn resolve_path(&self) -> Result<PathBuf> {
    self
      .path
      .clone()
      .or_else(Database::default_path)
      .ok_or_else(|| eyre!("Could not determine data directory"))
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
  /// Default filter when RUST_LOG is unset
  #[serde(default = "default_log_level")]
  pub level: String,
  /// Write daily-rotated log files here as well as to stderr
  pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      dir: None,
    }
  }
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./devbytes.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/devbytes/config.yaml
  ///
  /// Built-in defaults apply when no file is found.
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
    // Check current directory
    let local = PathBuf::from("devbytes.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("devbytes").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file deserializes to null
    let config: Config = if contents.trim().is_empty() {
      Config::default()
    } else {
      serde_yaml::from_str(contents)?
    };
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    let url = url::Url::parse(&self.playlist.url)
      .map_err(|e| eyre!("playlist.url '{}' is not a valid URL: {}", self.playlist.url, e))?;

    if !matches!(url.scheme(), "http" | "https") {
      return Err(eyre!(
        "playlist.url must use http or https, got '{}'",
        url.scheme()
      ));
    }

    if self.playlist.timeout_secs == 0 {
      return Err(eyre!("playlist.timeout_secs must be at least 1"));
    }

    Ok(())
  }
}
