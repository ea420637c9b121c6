//! `settings.json` shared with the desktop front end
//!
//! The file is a flat JSON object. Reads are best-effort: a missing or
//! corrupt file is an empty object.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Result;

/// Platform default location of `settings.json`
///
/// - Windows: `%APPDATA%/JDS6600Controller/settings.json`
/// - elsewhere: `~/.jds6600_controller/settings.json`
pub fn settings_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    if cfg!(windows) {
        let base = std::env::var_os("APPDATA")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or(home);
        base.join("JDS6600Controller").join("settings.json")
    } else {
        home.join(".jds6600_controller").join("settings.json")
    }
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(settings_path())
    }
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `path`, or the platform default
    pub fn at(path: Option<PathBuf>) -> Self {
        path.map_or_else(Self::default, Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Map<String, Value> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) => {
                debug!("No settings at {}: {}", self.path.display(), e);
                return Map::new();
            }
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                debug!("Settings at {} are not an object", self.path.display());
                Map::new()
            }
            Err(e) => {
                debug!("Ignoring unreadable settings {}: {}", self.path.display(), e);
                Map::new()
            }
        }
    }

    pub fn save(&self, settings: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(settings)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, text)?;
        debug!("Saved settings to {}", self.path.display());
        Ok(())
    }

    /// Load, change and save in one go
    pub fn update(&self, f: impl FnOnce(&mut Map<String, Value>)) -> Result<()> {
        let mut settings = self.load();
        f(&mut settings);
        self.save(&settings)
    }

    /// Last port a device was found on
    pub fn last_port(&self) -> Option<String> {
        self.load()
            .get("port")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
    }

    pub fn remember_run(&self, port: &str, file: &Path) -> Result<()> {
        self.update(|s| {
            s.insert("port".to_string(), Value::from(port));
            s.insert(
                "file_path".to_string(),
                Value::from(file.to_string_lossy().into_owned()),
            );
        })
    }
}
