use crate::{ClassifierConfig, RateButtons, RecorderError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[cfg(target_os = "windows")]
const SETTINGS_NAME: &str = "phantom_scroll_settings.json";

#[cfg(not(target_os = "windows"))]
const SETTINGS_NAME: &str = ".phantom_scroll_settings.json";

/// User settings persisted between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub near_click_ms: u64,
    pub combat_cps: f64,
    pub coords_enabled: bool,
    pub log_button_events: bool,
    /// Directory of the most recent log file
    pub last_log_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        let classifier = ClassifierConfig::default();
        Self {
            near_click_ms: classifier.near_click_ms,
            combat_cps: classifier.combat_cps,
            coords_enabled: classifier.coords_enabled,
            log_button_events: classifier.log_button_events,
            last_log_dir: None,
        }
    }
}

impl Settings {
    /// Default location: `%APPDATA%` on Windows, the home directory elsewhere
    pub fn default_path() -> PathBuf {
        let base = if cfg!(target_os = "windows") {
            std::env::var_os("APPDATA").or_else(|| std::env::var_os("USERPROFILE"))
        } else {
            std::env::var_os("HOME")
        };

        base.map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(SETTINGS_NAME)
    }

    /// Load settings, falling back to defaults if the file is missing or unreadable
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No settings file at {:?}, using defaults", path);
            return Self::default();
        }

        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring settings file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let settings: Settings = serde_json::from_str(&json)?;
        Ok(settings)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json).map_err(|e| {
            RecorderError::SettingsError(format!("cannot write {}: {}", path.as_ref().display(), e))
        })?;
        info!("Settings saved to {:?}", path.as_ref());
        Ok(())
    }

    /// Directory new log files go into
    pub fn log_dir(&self) -> PathBuf {
        self.last_log_dir
            .clone()
            .filter(|dir| dir.is_dir())
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Remember the directory of `log_path` for the next launch
    pub fn remember_log_path(&mut self, log_path: &Path) {
        self.last_log_dir = log_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf);
    }

    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            near_click_ms: self.near_click_ms,
            combat_cps: self.combat_cps,
            coords_enabled: self.coords_enabled,
            log_button_events: self.log_button_events,
            rate_buttons: RateButtons::Primary,
            ..ClassifierConfig::default()
        }
        .validated()
    }
}
