use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use rollcall_core::detection::infrastructure::onnx_yolo_detector::DEFAULT_CONFIDENCE;
use rollcall_core::shared::constants::{DEFAULT_BULK_WORKERS, DEFAULT_MATCH_THRESHOLD};

/// Persistent CLI defaults. Flags given on the command line win.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub gallery_dir: Option<PathBuf>,
    pub threshold: f64,
    pub confidence: f64,
    pub workers: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gallery_dir: None,
            threshold: DEFAULT_MATCH_THRESHOLD,
            confidence: DEFAULT_CONFIDENCE,
            workers: DEFAULT_BULK_WORKERS,
        }
    }
}

impl Settings {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("Rollcall").join("settings.json"))
    }

    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    /// Where collections live when `--gallery-dir` is not given.
    pub fn gallery_dir(&self) -> Option<PathBuf> {
        self.gallery_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("Rollcall").join("gallery")))
    }
}
