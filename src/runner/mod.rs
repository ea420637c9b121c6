//! Sequence runner
//!
//! Executes parsed command steps on a generator:
//! - `control` - pause / stop / skip flags and interruptible sleeps
//! - `apply` - step options to generator settings
//! - `adaptive` - frequency dependent amplitude for cycle/mod steps
//! - `sequence` - the step loop with checkpoints and resume

pub mod adaptive;
pub mod apply;
pub mod control;
pub mod sequence;

pub use adaptive::{AdaptiveVoltage, VoltagePoint, DEFAULT_POINTS};
pub use apply::{apply_freq_step, apply_setting, ChannelSelection};
pub use control::{sleep_with_control, RunControl, SleepOutcome, DEFAULT_TICK_INTERVAL};
pub use sequence::{run_sequence, NullObserver, Progress, RunObserver, RunOptions, RunOutcome};
