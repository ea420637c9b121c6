//! Command file module
//!
//! Provides:
//! - The step model (freq, wait, stop, cycle, mod)
//! - A lenient CSV-like parser with line-numbered errors
//! - Run time estimation, including from a runner checkpoint

pub mod checkpoint;
pub mod estimate;
pub mod model;
pub mod options;
pub mod parser;

pub use checkpoint::{estimate_remaining_from_checkpoint, Checkpoint, Leg, Phase, Within};
pub use estimate::*;
pub use model::*;
pub use parser::{parse_commands_file, parse_commands_str};
