//! Persistent application settings (last used library root)
//!
//! Stored as JSON under the user config directory. Keys this crate does not
//! know about are preserved so the presentation layer can keep its own state
//! in the same file.

use crate::error::Result;
use crate::utils::utc_timestamp;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_root_updated_at: Option<String>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Settings {
    /// Default settings file: `<config dir>/booth_library/settings.json`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("booth_library")
            .join("settings.json")
    }

    /// Load settings from disk, or start empty when missing or unreadable
    pub fn load_from(path: &Path) -> Self {
        let mut settings = match std::fs::read_to_string(path) {
            Ok(content) => {
                // Tolerate a UTF-8 byte order mark written by some editors
                let content = content.trim_start_matches('\u{feff}');
                match serde_json::from_str::<Settings>(content) {
                    Ok(settings) => settings,
                    Err(e) => {
                        log::warn!("Failed to parse settings file, starting fresh: {}", e);
                        Settings::default()
                    }
                }
            }
            Err(_) => Settings::default(),
        };
        settings.path = Some(path.to_path_buf());
        settings
    }

    /// Save settings back to the file they were loaded from
    pub fn save(&self) -> Result<()> {
        let path = self.path.clone().unwrap_or_else(Self::default_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        log::debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Last used library root, only if it still exists on disk
    pub fn last_root(&self) -> Option<PathBuf> {
        let raw = self.last_root.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        let path = PathBuf::from(raw);
        path.exists().then_some(path)
    }

    /// Remember a library root. Nonexistent paths are not stored.
    ///
    /// Returns whether the root was recorded.
    pub fn set_last_root(&mut self, root: &Path) -> bool {
        let Ok(resolved) = root.canonicalize() else {
            log::warn!("Not remembering missing library root {}", root.display());
            return false;
        };
        self.last_root = Some(resolved.to_string_lossy().to_string());
        self.last_root_updated_at = Some(utc_timestamp());
        true
    }
}
