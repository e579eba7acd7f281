//! Viewer settings
//!
//! Settings are read from a JSON file in the user's config directory:
//! - Linux: ~/.config/vibe-browser/config.json
//! - macOS: ~/Library/Application Support/vibe-browser/config.json
//! - Windows: %APPDATA%\vibe-browser\config.json
//!
//! The file is only ever read. A missing or unreadable file means defaults.

use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::state::library::SortOrder;

/// Allowed thumbnail display sizes in pixels
pub const THUMBNAIL_SIZE_RANGE: RangeInclusive<u32> = 50..=500;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Active version label (`v4.5`, `v4.5c`, `v4`, `v4c`)
    pub version: String,
    /// Thumbnail display size (square, pixels)
    pub thumbnail_size: u32,
    /// Folders scanned for vibe files
    pub directories: Vec<PathBuf>,
    /// One of `name_asc`, `name_desc`, `time_asc`, `time_desc`
    pub sort_order: String,
    pub show_images_without_thumbnails: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: "v4.5".to_string(),
            thumbnail_size: 128,
            directories: Vec::new(),
            sort_order: SortOrder::NameAsc.as_str().to_string(),
            show_images_without_thumbnails: false,
        }
    }
}

impl Settings {
    /// Where the settings file lives by default
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir().or_else(dirs::home_dir)?;
        path.push("vibe-browser");
        path.push("config.json");
        Some(path)
    }

    /// Load settings from `path`, falling back to defaults when the file is
    /// missing or cannot be parsed. Directories that no longer exist are dropped.
    pub fn load(path: &Path) -> Self {
        let mut settings = match fs::read_to_string(path) {
            Ok(text) => Self::from_json(&text).unwrap_or_else(|e| {
                log::warn!("Ignoring settings file {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                log::debug!("No settings at {} ({}), using defaults", path.display(), e);
                Self::default()
            }
        };
        settings.retain_existing_directories();
        settings
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn retain_existing_directories(&mut self) {
        self.directories.retain(|dir| {
            let exists = dir.exists();
            if !exists {
                log::warn!("Dropping missing folder {}", dir.display());
            }
            exists
        });
    }

    /// The configured sort order. An unknown key is a hard error.
    pub fn sort_order(&self) -> Result<SortOrder> {
        self.sort_order.parse()
    }

    pub fn validate(&self) -> Result<()> {
        validate_thumbnail_size(self.thumbnail_size)?;
        self.sort_order()?;
        Ok(())
    }
}

pub fn validate_thumbnail_size(size: u32) -> Result<()> {
    if THUMBNAIL_SIZE_RANGE.contains(&size) {
        Ok(())
    } else {
        Err(Error::InvalidThumbnailSize(size))
    }
}
