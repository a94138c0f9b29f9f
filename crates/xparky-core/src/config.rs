//! Application configuration.
//!
//! Two layers: [`Settings`] comes from the environment (secrets, ids, port)
//! and [`Config`] is the JSON file at `~/.config/xparky/config.json` holding
//! the presentation and scoring knobs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::points::PointTable;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "xparky";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Port the dashboard listens on unless XPARKY_PORT says otherwise
pub const DEFAULT_PORT: u16 = 8501;

/// Variables that must be present for the dashboard to start
pub const REQUIRED_VARS: [&str; 2] = ["GOOGLE_SHEETS_CREDENTIALS", "SPREADSHEET_ID"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration variables: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: String, value: String },
}

// ============================================================================
// Environment settings
// ============================================================================

#[derive(Clone, Default)]
pub struct Settings {
    /// Inline service account JSON or a path to the key file
    pub credentials: String,
    pub spreadsheet_id: String,
    pub classroom_folder_id: Option<String>,
    pub eval_forms_folder_id: Option<String>,
    pub certificates_folder_id: Option<String>,
    pub admin_token: Option<String>,
    pub port: u16,
    pub config_path: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("credentials", &"<redacted>")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("classroom_folder_id", &self.classroom_folder_id)
            .field("eval_forms_folder_id", &self.eval_forms_folder_id)
            .field("certificates_folder_id", &self.certificates_folder_id)
            .field("admin_token", &self.admin_token.as_ref().map(|_| "<redacted>"))
            .field("port", &self.port)
            .field("config_path", &self.config_path)
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let missing: Vec<String> = REQUIRED_VARS
            .iter()
            .filter(|name| get(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let port = match get("XPARKY_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "XPARKY_PORT".to_string(),
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            credentials: get("GOOGLE_SHEETS_CREDENTIALS").unwrap_or_default(),
            spreadsheet_id: get("SPREADSHEET_ID").unwrap_or_default(),
            classroom_folder_id: get("CLASSROOM_FOLDER_ID"),
            eval_forms_folder_id: get("EVAL_FORMS_FOLDER_ID"),
            certificates_folder_id: get("CERTIFICATES_FOLDER_ID"),
            admin_token: get("XPARKY_ADMIN_TOKEN"),
            port,
            config_path: get("XPARKY_CONFIG").map(PathBuf::from),
            data_dir: get("XPARKY_DATA_DIR").map(PathBuf::from),
        })
    }

    /// Where submissions and cache snapshots live
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.join("cache"));
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn config_path(&self) -> Result<PathBuf> {
        match self.config_path {
            Some(ref path) => Ok(path.clone()),
            None => Config::default_path(),
        }
    }
}

// ============================================================================
// Config file
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub primary_color: String,
    pub background_color: String,
    pub secondary_background_color: String,
    pub text_color: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            primary_color: "#4284f2".to_string(),
            background_color: "#ffffff".to_string(),
            secondary_background_color: "#f0f2f6".to_string(),
            text_color: "#262730".to_string(),
        }
    }
}

/// Where the cadet roster lives inside the database spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    pub sheet_name: String,
    /// Only rows whose `Position` equals this are cadets; `None` keeps every row
    pub position: Option<String>,
    /// Optional sheet of staff-recorded issuances used to cross-check submissions
    pub issuance_sheet: Option<String>,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            sheet_name: "Data".to_string(),
            position: Some("Data and ML Cadet".to_string()),
            issuance_sheet: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub theme: ThemeConfig,
    pub points: PointTable,
    pub roster: RosterConfig,
    /// XP at which the progress bar is full
    pub progress_max: u32,
    pub cache_ttl_minutes: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: ThemeConfig::default(),
            points: PointTable::default(),
            roster: RosterConfig::default(),
            progress_max: 3000,
            cache_ttl_minutes: crate::cache::CACHE_STALE_MINUTES,
        }
    }
}

impl Config {
    /// Load from the default location, or defaults when no file exists
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}
