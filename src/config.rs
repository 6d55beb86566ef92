use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "code-reviewer";
const BACKEND_URL_ENV: &str = "CODE_REVIEWER_BACKEND_URL";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub backend: BackendConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub jobs: JobsConfig,
  #[serde(default)]
  pub submissions: SubmissionsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
  /// Base URL of the backend, e.g. "https://reviewer.example.com"
  pub url: String,
}

impl Default for BackendConfig {
  fn default() -> Self {
    Self {
      url: "http://localhost:5000".to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// When false nothing is persisted and every load hits the network
  pub enabled: bool,
  /// Seconds before a cached listing is refetched
  pub expiry_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      expiry_secs: 300,
    }
  }
}

impl CacheConfig {
  pub fn expiry(&self) -> Duration {
    i64::try_from(self.expiry_secs)
      .ok()
      .and_then(Duration::try_seconds)
      .unwrap_or(Duration::MAX)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
  pub page_size: usize,
}

impl Default for JobsConfig {
  fn default() -> Self {
    Self { page_size: 8 }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubmissionsConfig {
  /// Rows from the bottom of the list at which the next page is requested
  pub scroll_threshold: u32,
}

impl Default for SubmissionsConfig {
  fn default() -> Self {
    Self {
      scroll_threshold: 3,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./code-reviewer.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/code-reviewer/config.yaml
  ///
  /// Without a file the defaults are used. `CODE_REVIEWER_BACKEND_URL`
  /// overrides the backend url either way.
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

    if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
      config.backend.url = url;
    }

    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("code-reviewer.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join(APP_DIR).join("config.yaml");
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

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    if self.jobs.page_size == 0 {
      return Err(eyre!("jobs.page_size must be at least 1"));
    }
    Ok(())
  }
}

/// Directory for the persisted store and log files.
pub fn data_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join(APP_DIR))
}
