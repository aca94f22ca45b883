//! User preferences persisted as JSON between sessions.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{AppError, FormatChoice};

const APP_DIR_NAME: &str = "media-grabber";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    #[serde(rename = "Tiếng Việt")]
    Vietnamese,
    #[serde(rename = "日本語")]
    Japanese,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::English, Language::Vietnamese, Language::Japanese];
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Language::English => "English",
            Language::Vietnamese => "Tiếng Việt",
            Language::Japanese => "日本語",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub download_folder: PathBuf,
    pub format_choice: FormatChoice,
    pub language: Language,
    /// yt-dlp executable; `None` means look it up on `PATH`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_path: Option<PathBuf>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            download_folder: default_download_folder(),
            format_choice: FormatChoice::Best,
            language: Language::English,
            engine_path: None,
        }
    }
}

fn default_download_folder() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("Downloads"))
        .unwrap_or_else(|| PathBuf::from("Downloads"))
}

/// Reads and writes [`Preferences`] at a fixed path.
#[derive(Debug, Clone)]
pub struct PreferencesStore {
    path: PathBuf,
}

impl PreferencesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/media-grabber/config.json`, or `config.json` in the
    /// current directory when the platform has no config dir.
    pub fn default_location() -> Self {
        let path = dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Never fails: a missing or malformed file yields the defaults.
    pub fn load(&self) -> Preferences {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No preferences yet, using defaults");
                return Preferences::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), "Failed to read preferences: {}. Using defaults.", e);
                return Preferences::default();
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!(path = %self.path.display(), "Error decoding preferences: {}. Using defaults.", e);
                Preferences::default()
            }
        }
    }

    pub fn save(&self, prefs: &Preferences) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(prefs).map_err(|e| {
            AppError::Config(format!(
                "failed to encode preferences for {}: {}",
                self.path.display(),
                e
            ))
        })?;
        std::fs::write(&self.path, format!("{}\n", json))?;
        Ok(())
    }
}
