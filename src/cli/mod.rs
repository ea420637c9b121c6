//! Command line front end
//!
//! - `commands` - argument definitions
//! - `keys` - interactive key controls
//! - `output` - console printing of runs and port lists

pub mod commands;
pub mod keys;
pub mod output;

pub use commands::Cli;
pub use keys::{read_keys, KeyAction, RawModeGuard, HELP_LINE};
pub use output::{port_list_lines, Console, ConsoleObserver};
