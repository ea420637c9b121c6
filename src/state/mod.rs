//! Persisted state: user settings and the resume point

pub mod resume;
pub mod settings;

pub use resume::{file_sha256, ResumeInfo, ResumeStore, RESUME_VERSION};
pub use settings::{settings_path, SettingsStore};
