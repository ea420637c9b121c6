//! jds6600-controller - command file runner for JDS6600 signal generators
//!
//! Drives a JDS6600 (and compatible) two channel DDS generator over its
//! USB serial port from a simple CSV-like command file:
//!
//! ```text
//! freq,1000,{"waveform":"sine","amplitude":5}
//! wait,10
//! cycle,[100,{"start":1000,"end":5000,"step":1000}],on=2,off=1
//! mod,100,10000,5,rise-and-fall,true,false
//! stop
//! ```
//!
//! ## Features
//!
//! - Lenient command file parser with line-accurate errors
//! - Serial port discovery and JDS6600 auto-detection
//! - Pause / next / quit while running, resume after a stop
//! - Remaining-time estimates, adaptive amplitude for sweeps
//! - Layered TOML + environment configuration

pub mod cli;
pub mod commands;
pub mod config;
pub mod device;
pub mod error;
pub mod format;
pub mod logging;
pub mod ports;
pub mod runner;
pub mod state;

pub use cli::Cli;
pub use commands::{parse_commands_file, parse_commands_str, Checkpoint, Step};
pub use config::{load_config, Config};
pub use device::{connect, Generator, Jds6600};
pub use error::{ControllerError, ErrorInfo};
pub use ports::{find_first_jds6600, list_serial_ports, PortInfo};
pub use runner::{run_sequence, RunControl, RunObserver, RunOptions, RunOutcome};
pub use state::{ResumeStore, SettingsStore};
