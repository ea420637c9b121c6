//! Configuration loader with XDG-compliant path resolution
//!
//! Layers, lowest priority first:
//! 1. built-in defaults
//! 2. `~/.config/jds6600-controller/config.toml`
//! 3. `./jds6600-controller.toml`
//! 4. the `-c/--config` file
//! 5. `JDS6600_` environment variables (`JDS6600_SERIAL__PORT=/dev/ttyUSB0`)

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use super::model::Config;

/// Application name used for XDG directories
const APP_NAME: &str = "jds6600-controller";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "JDS6600_";

/// Config search paths in priority order (lowest to highest)
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join(APP_NAME).join("config.toml"));
    }

    paths.push(PathBuf::from(format!("{}.toml", APP_NAME)));

    paths
}

/// Load configuration
///
/// A missing `override_path` is an error; the default search paths are
/// optional.
pub fn load_config(override_path: Option<&Path>) -> Result<Config> {
    let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

    for path in find_config_files() {
        tracing::debug!("Loading config from: {}", path.display());
        figment = figment.merge(Toml::file(&path));
    }

    if let Some(path) = override_path {
        if !path.exists() {
            bail!("Config file not found: {}", path.display());
        }
        tracing::debug!("Loading override config from: {}", path.display());
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    figment.extract().context("Failed to load configuration")
}

/// Existing config files, in load order
pub fn find_config_files() -> Vec<PathBuf> {
    config_paths().into_iter().filter(|p| p.exists()).collect()
}
