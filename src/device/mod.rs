//! JDS6600 device module
//!
//! Provides:
//! - The ASCII register protocol ([`protocol`])
//! - A line [`Transport`] over `serialport`, mockable in tests
//! - The [`Generator`] trait and its [`Jds6600`] implementation
//! - Device state snapshots for display

pub mod generator;
pub mod protocol;
pub mod state;
pub mod transport;

#[cfg(test)]
pub(crate) mod fake;

pub use generator::{Generator, Jds6600};
pub use protocol::{Channel, Waveform};
pub use state::{read_device_state, ChannelState, DeviceState};
pub use transport::{SerialTransport, Transport, DEFAULT_BAUD_RATE};

use std::time::Duration;

use tracing::info;

use crate::error::Result;

/// Open `port` and verify a JDS6600 answers on it
///
/// # Errors
///
/// Fails when the port cannot be opened or the channel register read does
/// not produce a well formed answer.
pub fn connect(port: &str, baud_rate: u32, timeout: Duration) -> Result<Jds6600<SerialTransport>> {
    let mut generator = Jds6600::open(port, baud_rate, timeout)?;
    let (ch1, ch2) = generator.get_channels()?;
    info!(port, ch1, ch2, "connected to JDS6600");
    Ok(generator)
}
