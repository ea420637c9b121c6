//! Persisted resume point
//!
//! A stopped run stores its [`Checkpoint`] under the `resume` key of
//! `settings.json`, bound to the command file's absolute path and SHA-256.
//! The point is only offered again for the exact same file contents.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::settings::SettingsStore;
use crate::commands::Checkpoint;
use crate::error::Result;

/// Format version of the `resume` entry
pub const RESUME_VERSION: u32 = 1;

const RESUME_KEY: &str = "resume";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeInfo {
    pub v: u32,
    pub file_path: String,
    pub file_sha256: String,
    pub checkpoint: Checkpoint,
    /// Unix seconds
    #[serde(default)]
    pub saved_at: u64,
}

/// Hex SHA-256 of a file's contents
pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Debug, Clone, Default)]
pub struct ResumeStore {
    settings: SettingsStore,
}

impl ResumeStore {
    pub fn new(settings: SettingsStore) -> Self {
        Self { settings }
    }

    /// Save `checkpoint` for `path`
    ///
    /// Returns `false` without saving when the file no longer matches
    /// `executed_sha256` (it was edited while running).
    pub fn persist(
        &self,
        path: &Path,
        checkpoint: &Checkpoint,
        executed_sha256: Option<&str>,
    ) -> Result<bool> {
        let sha = file_sha256(path)?;
        if executed_sha256.is_some_and(|executed| executed != sha) {
            info!("Command file changed since start, not saving resume point");
            return Ok(false);
        }

        let entry = ResumeInfo {
            v: RESUME_VERSION,
            file_path: absolute(path).to_string_lossy().into_owned(),
            file_sha256: sha,
            checkpoint: *checkpoint,
            saved_at: unix_now(),
        };
        let value = serde_json::to_value(&entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        self.settings.update(|s| {
            s.insert(RESUME_KEY.to_string(), value);
        })?;
        debug!(step = checkpoint.step_index, "Saved resume point");
        Ok(true)
    }

    /// Stored resume point if it belongs to this exact file
    pub fn load_for_file(&self, path: &Path) -> Option<ResumeInfo> {
        let value = self.settings.load().remove(RESUME_KEY)?;
        let entry: ResumeInfo = match serde_json::from_value(value) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Ignoring malformed resume entry: {}", e);
                return None;
            }
        };
        if entry.v != RESUME_VERSION || entry.file_sha256.is_empty() {
            return None;
        }
        if absolute(Path::new(&entry.file_path)) != absolute(path) {
            debug!("Resume point belongs to {}", entry.file_path);
            return None;
        }
        match file_sha256(path) {
            Ok(sha) if sha == entry.file_sha256 => Some(entry),
            Ok(_) => {
                debug!("Command file changed since the resume point was saved");
                None
            }
            Err(e) => {
                debug!("Cannot hash {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Remove the stored resume point, if any
    pub fn clear(&self) -> Result<()> {
        let mut settings = self.settings.load();
        if settings.remove(RESUME_KEY).is_some() {
            self.settings.save(&settings)?;
        }
        Ok(())
    }

    /// Raw stored entry, whatever file it belongs to
    #[cfg(test)]
    fn stored(&self) -> Option<serde_json::Value> {
        self.settings.load().remove(RESUME_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Within;
    use serde_json::Value;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ResumeStore, PathBuf) {
        let dir = TempDir::new().unwrap();
        let store = ResumeStore::new(SettingsStore::new(dir.path().join("settings.json")));
        let csv = dir.path().join("commands.csv");
        fs::write(&csv, "freq,1000\nwait,10\n").unwrap();
        (dir, store, csv)
    }

    #[test]
    fn test_sha256_of_known_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("abc.txt");
        fs::write(&path, "abc").unwrap();
        assert_eq!(
            file_sha256(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_persist_and_load() {
        let (_dir, store, csv) = setup();
        let ck = Checkpoint::within(1, Within::Wait { remaining: 4.5 });

        assert!(store.persist(&csv, &ck, None).unwrap());

        let info = store.load_for_file(&csv).unwrap();
        assert_eq!(info.v, 1);
        assert_eq!(info.checkpoint, ck);
        assert!(info.saved_at > 0);
    }

    #[test]
    fn test_edited_file_invalidates() {
        let (_dir, store, csv) = setup();
        store.persist(&csv, &Checkpoint::at(1), None).unwrap();

        fs::write(&csv, "freq,2000\nwait,10\n").unwrap();
        assert!(store.load_for_file(&csv).is_none());
    }

    #[test]
    fn test_other_file_ignored() {
        let (dir, store, csv) = setup();
        store.persist(&csv, &Checkpoint::at(1), None).unwrap();

        let other = dir.path().join("other.csv");
        fs::copy(&csv, &other).unwrap();
        assert!(store.load_for_file(&other).is_none());
    }

    #[test]
    fn test_not_saved_when_changed_during_run() {
        let (_dir, store, csv) = setup();
        let executed = file_sha256(&csv).unwrap();
        fs::write(&csv, "stop\n").unwrap();

        assert!(!store.persist(&csv, &Checkpoint::at(0), Some(&executed)).unwrap());
        assert!(store.stored().is_none());
    }

    #[test]
    fn test_clear_keeps_other_settings() {
        let (dir, store, csv) = setup();
        let settings = SettingsStore::new(dir.path().join("settings.json"));
        settings
            .update(|s| {
                s.insert("port".to_string(), Value::from("COM3"));
            })
            .unwrap();
        store.persist(&csv, &Checkpoint::at(1), None).unwrap();

        store.clear().unwrap();
        assert!(store.load_for_file(&csv).is_none());
        assert_eq!(settings.last_port().as_deref(), Some("COM3"));
    }

    #[test]
    fn test_wrong_version_ignored() {
        let (dir, store, csv) = setup();
        store.persist(&csv, &Checkpoint::at(1), None).unwrap();
        let settings = SettingsStore::new(dir.path().join("settings.json"));
        settings
            .update(|s| {
                s["resume"]["v"] = Value::from(2);
            })
            .unwrap();
        assert!(store.load_for_file(&csv).is_none());
    }
}
