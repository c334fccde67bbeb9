//! Settings for the viewer, the virtual display and asset naming.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{GtkwaveError, Result};

/// Top-level settings, loadable from a JSON or YAML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Viewer binary.
    pub viewer: String,
    /// Prefix of generated image file names.
    pub image_prefix: String,
    pub display: DisplaySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            viewer: "gtkwave".to_string(),
            image_prefix: "gtkwave".to_string(),
            display: DisplaySettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, picking the format from the extension.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| GtkwaveError::Config(format!("failed to read settings file: {e}")))?;

        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        if ext == "json" {
            serde_json::from_str(&contents).map_err(GtkwaveError::Json)
        } else if ext == "yaml" || ext == "yml" {
            serde_yaml::from_str(&contents)
                .map_err(|e| GtkwaveError::Config(format!("yaml error: {e}")))
        } else {
            serde_json::from_str(&contents)
                .or_else(|_| serde_yaml::from_str(&contents))
                .map_err(|e| GtkwaveError::Config(format!("settings parse error: {e}")))
        }
    }
}

/// How virtual displays are started and grabbed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplaySettings {
    /// Off-screen X server binary.
    pub xvfb: String,
    /// Nested X server binary, used for visible displays.
    pub xephyr: String,
    pub color_depth: u32,
    /// How long to wait for the X server socket.
    pub start_timeout_ms: u64,
    /// Command printing a screenshot of `$DISPLAY` to stdout.
    pub grab_command: Vec<String>,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            xvfb: "Xvfb".to_string(),
            xephyr: "Xephyr".to_string(),
            color_depth: 24,
            start_timeout_ms: 10_000,
            grab_command: vec![
                "import".to_string(),
                "-window".to_string(),
                "root".to_string(),
                "png:-".to_string(),
            ],
        }
    }
}
