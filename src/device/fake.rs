//! In-memory generator for unit tests

use super::generator::Generator;
use super::protocol::{Channel, Waveform};
use crate::error::{ControllerError, Result};

#[derive(Debug, Clone)]
struct FakeChannel {
    on: bool,
    waveform: Waveform,
    hz: f64,
    amplitude: f64,
    offset: f64,
    duty: f64,
}

impl Default for FakeChannel {
    fn default() -> Self {
        Self {
            on: true,
            waveform: Waveform::SINE,
            hz: 1000.0,
            amplitude: 5.0,
            offset: 0.0,
            duty: 50.0,
        }
    }
}

/// Stores every setting and records each call as a short string
/// (`"freq 1 1000"`, `"channels 1 0"`, ...)
#[derive(Debug, Default)]
pub struct FakeGenerator {
    channels: [FakeChannel; 2],
    pub phase: f64,
    pub calls: Vec<String>,
    /// Getter names that fail (`"amplitude"`, `"channels"`, ...)
    pub failing_reads: Vec<&'static str>,
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frequency_calls(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter(|c| c.starts_with("freq "))
            .cloned()
            .collect()
    }

    fn ch(&mut self, channel: Channel) -> &mut FakeChannel {
        &mut self.channels[usize::from(channel.number() - 1)]
    }

    fn read<T>(&mut self, name: &'static str, f: impl FnOnce(&mut Self) -> T) -> Result<T> {
        if self.failing_reads.contains(&name) {
            Err(ControllerError::Protocol(format!("{} read failed", name)))
        } else {
            Ok(f(self))
        }
    }
}

impl Generator for FakeGenerator {
    fn set_channels(&mut self, ch1: bool, ch2: bool) -> Result<()> {
        self.channels[0].on = ch1;
        self.channels[1].on = ch2;
        self.calls
            .push(format!("channels {} {}", u8::from(ch1), u8::from(ch2)));
        Ok(())
    }

    fn get_channels(&mut self) -> Result<(bool, bool)> {
        self.read("channels", |s| (s.channels[0].on, s.channels[1].on))
    }

    fn set_frequency(&mut self, channel: Channel, hz: f64) -> Result<()> {
        super::protocol::check_range("frequency", hz, 0.0, super::protocol::MAX_FREQUENCY_HZ)?;
        self.ch(channel).hz = hz;
        self.calls.push(format!("freq {} {}", channel.number(), hz));
        Ok(())
    }

    fn get_frequency(&mut self, channel: Channel) -> Result<f64> {
        self.read("frequency", |s| s.ch(channel).hz)
    }

    fn set_waveform(&mut self, channel: Channel, waveform: Waveform) -> Result<()> {
        self.ch(channel).waveform = waveform;
        self.calls
            .push(format!("waveform {} {}", channel.number(), waveform));
        Ok(())
    }

    fn get_waveform(&mut self, channel: Channel) -> Result<Waveform> {
        self.read("waveform", |s| s.ch(channel).waveform)
    }

    fn set_amplitude(&mut self, channel: Channel, volts: f64) -> Result<()> {
        super::protocol::check_range("amplitude", volts, 0.0, super::protocol::MAX_AMPLITUDE_V)?;
        self.ch(channel).amplitude = volts;
        self.calls
            .push(format!("amplitude {} {}", channel.number(), volts));
        Ok(())
    }

    fn get_amplitude(&mut self, channel: Channel) -> Result<f64> {
        self.read("amplitude", |s| s.ch(channel).amplitude)
    }

    fn set_offset(&mut self, channel: Channel, volts: f64) -> Result<()> {
        self.ch(channel).offset = volts;
        self.calls.push(format!("offset {} {}", channel.number(), volts));
        Ok(())
    }

    fn get_offset(&mut self, channel: Channel) -> Result<f64> {
        self.read("offset", |s| s.ch(channel).offset)
    }

    fn set_duty_cycle(&mut self, channel: Channel, percent: f64) -> Result<()> {
        self.ch(channel).duty = percent;
        self.calls.push(format!("duty {} {}", channel.number(), percent));
        Ok(())
    }

    fn get_duty_cycle(&mut self, channel: Channel) -> Result<f64> {
        self.read("duty", |s| s.ch(channel).duty)
    }

    fn set_phase(&mut self, degrees: f64) -> Result<()> {
        self.phase = degrees;
        self.calls.push(format!("phase {}", degrees));
        Ok(())
    }

    fn model(&mut self) -> Result<String> {
        self.read("model", |_| "60".to_string())
    }
}
