//! Configuration
//!
//! Layered TOML files plus `JDS6600_` environment variables, merged with
//! figment.

pub mod loader;
pub mod model;

pub use loader::{config_paths, find_config_files, load_config, ENV_PREFIX};
pub use model::*;
