//! Snapshot of the generator's current output settings

use std::fmt;

use serde::Serialize;
use tracing::debug;

use super::generator::Generator;
use super::protocol::Channel;

/// Settings of one output; `None` when the device did not answer
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChannelState {
    pub on: Option<bool>,
    pub wave: Option<String>,
    pub freq_hz: Option<f64>,
    pub ampl_v: Option<f64>,
    pub offs_v: Option<f64>,
    pub duty_pct: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceState {
    pub ch1: ChannelState,
    pub ch2: ChannelState,
}

impl DeviceState {
    pub fn channel(&self, channel: Channel) -> &ChannelState {
        match channel {
            Channel::One => &self.ch1,
            Channel::Two => &self.ch2,
        }
    }
}

/// Read every setting of both channels
///
/// Each getter is isolated: a failing read leaves that field unknown and the
/// remaining reads still happen.
pub fn read_device_state(generator: &mut dyn Generator) -> DeviceState {
    let (ch1_on, ch2_on) = match generator.get_channels() {
        Ok((a, b)) => (Some(a), Some(b)),
        Err(e) => {
            debug!(error = %e, "could not read channel enable state");
            (None, None)
        }
    };

    let mut read = |channel: Channel, on: Option<bool>| ChannelState {
        on,
        wave: generator.get_waveform(channel).ok().map(|w| w.name()),
        freq_hz: generator.get_frequency(channel).ok(),
        ampl_v: generator.get_amplitude(channel).ok(),
        offs_v: generator.get_offset(channel).ok(),
        duty_pct: generator.get_duty_cycle(channel).ok(),
    };

    let ch1 = read(Channel::One, ch1_on);
    let ch2 = read(Channel::Two, ch2_on);
    DeviceState { ch1, ch2 }
}

/// `1000Hz`, `0.5Hz`, `1234.568Hz`, `n/a`
pub fn fmt_hz(value: Option<f64>) -> String {
    match value {
        None => "n/a".to_string(),
        Some(v) if (v - v.round()).abs() < 1e-9 => format!("{}Hz", v.round() as i64),
        Some(v) => {
            let s = format!("{:.3}", v);
            let s = s.trim_end_matches('0').trim_end_matches('.');
            format!("{}Hz", s)
        }
    }
}

fn fmt_volts(value: Option<f64>, decimals: usize) -> String {
    match value {
        None => "n/a".to_string(),
        Some(v) => format!("{:.*}v", decimals, v),
    }
}

fn fmt_percent(value: Option<f64>) -> String {
    match value {
        None => "n/a".to_string(),
        Some(v) => format!("{:.1}%", v),
    }
}

impl ChannelState {
    fn write_labeled(&self, f: &mut fmt::Formatter<'_>, label: &str) -> fmt::Result {
        let on = match self.on {
            Some(true) => "on",
            Some(false) => "off",
            None => "n/a",
        };
        write!(
            f,
            "{}={}, wave: {}, freq: {}, ampl:{}, offs: {}, duty: {}",
            label,
            on,
            self.wave.as_deref().unwrap_or("unknown"),
            fmt_hz(self.freq_hz),
            fmt_volts(self.ampl_v, 1),
            fmt_volts(self.offs_v, 2),
            fmt_percent(self.duty_pct)
        )
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.ch1.write_labeled(f, "CH1")?;
        f.write_str(";  ")?;
        self.ch2.write_labeled(f, "CH2")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::fake::FakeGenerator;
    use crate::device::protocol::Waveform;

    #[test]
    fn test_read_and_format_state() {
        let mut fake = FakeGenerator::new();
        fake.set_channels(true, false).unwrap();
        fake.set_waveform(Channel::Two, Waveform::SQUARE).unwrap();
        fake.set_frequency(Channel::Two, 0.5).unwrap();

        let state = read_device_state(&mut fake);
        assert_eq!(
            state.to_string(),
            "CH1=on, wave: sine, freq: 1000Hz, ampl:5.0v, offs: 0.00v, duty: 50.0%;  \
             CH2=off, wave: square, freq: 0.5Hz, ampl:5.0v, offs: 0.00v, duty: 50.0%"
        );
    }

    #[test]
    fn test_failing_getter_is_isolated() {
        let mut fake = FakeGenerator::new();
        fake.failing_reads = vec!["amplitude", "channels"];

        let state = read_device_state(&mut fake);
        assert_eq!(state.ch1.on, None);
        assert_eq!(state.ch2.ampl_v, None);
        assert_eq!(state.ch1.freq_hz, Some(1000.0));
        assert!(state.to_string().starts_with("CH1=n/a, wave: sine"));
    }

    #[test]
    fn test_unknown_state_format() {
        let state = DeviceState::default();
        assert_eq!(
            state.to_string(),
            "CH1=n/a, wave: unknown, freq: n/a, ampl:n/a, offs: n/a, duty: n/a;  \
             CH2=n/a, wave: unknown, freq: n/a, ampl:n/a, offs: n/a, duty: n/a"
        );
    }

    #[test]
    fn test_fmt_hz() {
        assert_eq!(fmt_hz(Some(10000.0)), "10000Hz");
        assert_eq!(fmt_hz(Some(1234.5678)), "1234.568Hz");
        assert_eq!(fmt_hz(Some(12.5)), "12.5Hz");
        assert_eq!(fmt_hz(None), "n/a");
    }
}
