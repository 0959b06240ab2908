//! Settings loaded from `~/.linkbird/config.json`.
//!
//! Every field has a serde default so a partial file is valid. The Supabase
//! project URL and anon key may also come from `LINKBIRD_SUPABASE_URL` and
//! `LINKBIRD_SUPABASE_ANON_KEY`, which win over the file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::DashboardError;
use crate::queries::PAGE_SIZE;

pub const CONFIG_ENV: &str = "LINKBIRD_CONFIG";
pub const SUPABASE_URL_ENV: &str = "LINKBIRD_SUPABASE_URL";
pub const ANON_KEY_ENV: &str = "LINKBIRD_SUPABASE_ANON_KEY";

fn default_page_size() -> usize {
    PAGE_SIZE
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub supabase_url: String,
    #[serde(default)]
    pub anon_key: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Remember UI state (filters, sidebar) between runs.
    #[serde(default)]
    pub persist_ui_state: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            anon_key: String::new(),
            page_size: default_page_size(),
            request_timeout_secs: default_timeout_secs(),
            persist_ui_state: false,
        }
    }
}

impl Config {
    /// Overlay connection settings from a variable lookup. Blank values are
    /// ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_blank = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_blank(SUPABASE_URL_ENV) {
            self.supabase_url = url;
        }
        if let Some(key) = non_blank(ANON_KEY_ENV) {
            self.anon_key = key;
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.trim().is_empty() && !self.anon_key.trim().is_empty()
    }

    /// Check the settings needed to reach the hosted service.
    pub fn validate(&self) -> Result<(), DashboardError> {
        if self.supabase_url.trim().is_empty() {
            return Err(DashboardError::Configuration(format!(
                "supabaseUrl is not set. Add it to {} or set {}",
                describe_config_path(),
                SUPABASE_URL_ENV
            )));
        }
        let url = Url::parse(&self.supabase_url).map_err(|e| {
            DashboardError::Configuration(format!("supabaseUrl is not a valid URL: {}", e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DashboardError::Configuration(format!(
                "supabaseUrl must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.anon_key.trim().is_empty() {
            return Err(DashboardError::Configuration(format!(
                "anonKey is not set. Add it to {} or set {}",
                describe_config_path(),
                ANON_KEY_ENV
            )));
        }
        if self.page_size == 0 {
            return Err(DashboardError::Configuration(
                "pageSize must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// State directory (`~/.linkbird`).
pub fn state_dir() -> Result<PathBuf, DashboardError> {
    let home = dirs::home_dir()
        .ok_or_else(|| DashboardError::Configuration("Could not find home directory".into()))?;
    Ok(home.join(".linkbird"))
}

/// Config file path: `LINKBIRD_CONFIG` if set, else `~/.linkbird/config.json`.
pub fn config_path() -> Result<PathBuf, DashboardError> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    Ok(state_dir()?.join("config.json"))
}

fn describe_config_path() -> String {
    config_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "~/.linkbird/config.json".to_string())
}

/// Where the UI snapshot lives when `persistUiState` is on.
pub fn ui_snapshot_path() -> Result<PathBuf, DashboardError> {
    Ok(state_dir()?.join("ui_state.json"))
}

/// Read a config file. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, DashboardError> {
    if !path.exists() {
        log::debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        DashboardError::Configuration(format!("Failed to parse {}: {}", path.display(), e))
    })
}

/// Load the config file and apply environment overrides.
pub fn load_config() -> Result<Config, DashboardError> {
    let mut config = load_config_from(&config_path()?)?;
    config.apply_overrides(|name| std::env::var(name).ok());
    Ok(config)
}

pub fn save_config(path: &Path, config: &Config) -> Result<(), DashboardError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_string_pretty(config)?)?;
    Ok(())
}
