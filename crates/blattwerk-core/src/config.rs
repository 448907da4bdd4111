// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Editor configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EditorError, Result};
use crate::types::{PageSize, Rgb, TextStyle};

/// Persistent editor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum number of snapshots kept in the undo history.
    pub history_capacity: usize,
    /// Size of pages created by "insert blank page".
    pub blank_page: PageSize,
    /// Directory scanned for external `.ttf`/`.otf` fonts.
    pub font_dir: Option<PathBuf>,
    /// Zoom used for page thumbnails.
    pub thumbnail_zoom: f32,
    /// Zoom used when exporting a page as an image.
    pub export_zoom: f32,
    /// Style applied to new text when the caller gives none.
    pub default_text: TextStyle,
    pub highlight_color: Rgb,
    pub highlight_opacity: f32,
    /// Write `/ModDate` and `/Producer` into the Info dictionary on save.
    pub stamp_on_save: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_capacity: 40,
            blank_page: PageSize::A4,
            font_dir: None,
            thumbnail_zoom: 0.2,
            export_zoom: 1.5,
            default_text: TextStyle::default(),
            highlight_color: Rgb::YELLOW,
            highlight_opacity: 0.35,
            stamp_on_save: true,
        }
    }
}

impl EditorConfig {
    /// Read a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Like [`EditorConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.history_capacity == 0 {
            return Err(EditorError::Config(
                "history_capacity must be at least 1".into(),
            ));
        }
        if !(self.blank_page.width > 0.0 && self.blank_page.height > 0.0) {
            return Err(EditorError::Config(format!(
                "blank_page must have a positive size, got {}x{}",
                self.blank_page.width, self.blank_page.height
            )));
        }
        if !(self.thumbnail_zoom > 0.0 && self.export_zoom > 0.0) {
            return Err(EditorError::Config("zoom factors must be positive".into()));
        }
        Ok(())
    }
}

/// Default location of the configuration file.
///
/// Uses `$XDG_CONFIG_HOME/blattwerk/config.json`, falling back to
/// `~/.config/blattwerk/config.json`, then the working directory.
pub fn default_config_path() -> PathBuf {
    config_base().join("blattwerk").join("config.json")
}

fn config_base() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".config");
    }
    PathBuf::from(".")
}
