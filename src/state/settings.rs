// SPDX-License-Identifier: MPL-2.0

use crate::config::{APP_ID, DEFAULT_API_BASE, DEFAULT_PAGE_SIZE, DEFAULT_SHELL_URL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Persistent application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_api_base")]
    pub api_base_url: String,
    /// Where the application shell is served from
    #[serde(default = "default_shell_url")]
    pub shell_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Overrides the platform data directory when set
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_shell_url() -> String {
    DEFAULT_SHELL_URL.to_string()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base(),
            shell_url: default_shell_url(),
            page_size: default_page_size(),
            data_dir: None,
        }
    }
}

impl AppSettings {
    /// Get the settings file path (~/.config/io.github.storyline.Storyline/settings.json)
    fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push(APP_ID);
            p.push("settings.json");
            p
        })
    }

    /// Load settings from disk, or return defaults if not found
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<(), String> {
        let path = Self::settings_path().ok_or("Could not determine config directory")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {e}"))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {e}"))?;

        std::fs::write(path, json).map_err(|e| format!("Failed to write settings: {e}"))?;

        Ok(())
    }

    /// Where the mirror, caches and local storage live
    pub fn data_dir(&self) -> Result<PathBuf, String> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        dirs::data_dir()
            .map(|p| p.join("storyline"))
            .ok_or_else(|| "Could not determine data directory".to_string())
    }

    pub fn api_url(&self) -> Result<Url, String> {
        Url::parse(&self.api_base_url).map_err(|e| format!("Invalid API URL: {e}"))
    }

    pub fn shell_url(&self) -> Result<Url, String> {
        Url::parse(&self.shell_url).map_err(|e| format!("Invalid shell URL: {e}"))
    }
}
