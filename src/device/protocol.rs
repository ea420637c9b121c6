//! JDS6600 wire protocol
//!
//! The generator speaks a line based ASCII protocol at 115200 8N1:
//!
//! ```text
//! write:  :w23=100000,0.\r\n   ->  :ok
//! read:   :r23=0.\r\n          ->  :r23=100000,0.
//! ```
//!
//! # Registers
//!
//! | reg   | meaning                    | encoding              |
//! |-------|----------------------------|-----------------------|
//! | 00    | model (max MHz)            | integer               |
//! | 01    | serial number              | integer               |
//! | 20    | output enable              | `ch1,ch2` (0/1)       |
//! | 21/22 | waveform CH1/CH2           | code                  |
//! | 23/24 | frequency CH1/CH2          | `hz*100,unit`         |
//! | 25/26 | amplitude CH1/CH2          | millivolts            |
//! | 27/28 | offset CH1/CH2             | `volts*100 + 1000`    |
//! | 29/30 | duty cycle CH1/CH2         | `percent*10`          |
//! | 31    | phase CH2 relative to CH1  | `degrees*10`          |

use std::fmt;
use std::str::FromStr;

use crate::error::{ControllerError, Result};

pub const REG_MODEL: u8 = 0;
pub const REG_CHANNELS: u8 = 20;
pub const REG_WAVEFORM: u8 = 21;
pub const REG_FREQUENCY: u8 = 23;
pub const REG_AMPLITUDE: u8 = 25;
pub const REG_OFFSET: u8 = 27;
pub const REG_DUTY: u8 = 29;
pub const REG_PHASE: u8 = 31;

pub const MAX_FREQUENCY_HZ: f64 = 60_000_000.0;
pub const MAX_AMPLITUDE_V: f64 = 20.0;
pub const MAX_OFFSET_V: f64 = 9.99;
pub const MAX_DUTY_PCT: f64 = 100.0;
pub const MAX_PHASE_DEG: f64 = 360.0;

/// Output channel of the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    One,
    Two,
}

impl Channel {
    pub const BOTH: [Channel; 2] = [Channel::One, Channel::Two];

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Channel::One),
            2 => Some(Channel::Two),
            _ => None,
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            Channel::One => 1,
            Channel::Two => 2,
        }
    }

    /// Register for a per-channel setting, given the CH1 register
    pub fn register(&self, ch1_register: u8) -> u8 {
        ch1_register + self.number() - 1
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CH{}", self.number())
    }
}

const BUILTIN_WAVEFORMS: [&str; 17] = [
    "sine",
    "square",
    "pulse",
    "triangle",
    "partial-sine",
    "cmos",
    "dc",
    "half-wave",
    "full-wave",
    "pos-ladder",
    "neg-ladder",
    "noise",
    "exp-rise",
    "exp-decay",
    "multi-tone",
    "sinc",
    "lorenz",
];

/// First code of the arbitrary waveform slots (`arb1`)
const ARBITRARY_BASE: u16 = 100;
const ARBITRARY_SLOTS: u16 = 60;

/// Waveform selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    /// One of the 17 built-in shapes (code 0..=16)
    Builtin(u8),
    /// User defined slot 1..=60 (code 101..=160)
    Arbitrary(u8),
}

impl Waveform {
    pub const SINE: Waveform = Waveform::Builtin(0);
    pub const SQUARE: Waveform = Waveform::Builtin(1);

    /// Decode a device code
    pub fn from_code(code: u16) -> Option<Self> {
        if (code as usize) < BUILTIN_WAVEFORMS.len() {
            return Some(Waveform::Builtin(code as u8));
        }
        if code > ARBITRARY_BASE && code <= ARBITRARY_BASE + ARBITRARY_SLOTS {
            return Some(Waveform::Arbitrary((code - ARBITRARY_BASE) as u8));
        }
        None
    }

    /// Device code for this waveform
    pub fn code(&self) -> u16 {
        match self {
            Waveform::Builtin(c) => u16::from(*c),
            Waveform::Arbitrary(slot) => ARBITRARY_BASE + u16::from(*slot),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Waveform::Builtin(c) => BUILTIN_WAVEFORMS[*c as usize].to_string(),
            Waveform::Arbitrary(slot) => format!("arb{}", slot),
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for Waveform {
    type Err = ControllerError;

    /// Accepts names (`sine`, `Partial Sine`, `exp_rise`, `arb12`) or codes
    fn from_str(s: &str) -> Result<Self> {
        let norm = s.trim().to_lowercase().replace(['_', ' '], "-");
        if let Ok(code) = norm.parse::<u16>() {
            return Waveform::from_code(code).ok_or_else(|| unknown_waveform(s));
        }
        if let Some(pos) = BUILTIN_WAVEFORMS.iter().position(|w| *w == norm) {
            return Ok(Waveform::Builtin(pos as u8));
        }
        let compact = norm.replace('-', "");
        if let Some(pos) = BUILTIN_WAVEFORMS
            .iter()
            .position(|w| w.replace('-', "") == compact)
        {
            return Ok(Waveform::Builtin(pos as u8));
        }
        if let Some(slot) = compact
            .strip_prefix("arbitrary")
            .or_else(|| compact.strip_prefix("arb"))
            .and_then(|n| n.parse::<u8>().ok())
        {
            if (1..=ARBITRARY_SLOTS as u8).contains(&slot) {
                return Ok(Waveform::Arbitrary(slot));
            }
        }
        Err(unknown_waveform(s))
    }
}

fn unknown_waveform(s: &str) -> ControllerError {
    ControllerError::InvalidOption {
        key: "waveform".to_string(),
        message: format!(
            "unknown waveform '{}'. Use one of: {}, arb1..arb60",
            s,
            BUILTIN_WAVEFORMS.join(", ")
        ),
    }
}

/// Reject values the device would not accept
pub fn check_range(what: &'static str, value: f64, min: f64, max: f64) -> Result<f64> {
    if value.is_finite() && value >= min && value <= max {
        Ok(value)
    } else {
        Err(ControllerError::OutOfRange {
            what,
            value,
            min,
            max,
        })
    }
}

/// Encode a register write: `:wNN=a,b.\r\n`
pub fn encode_write(register: u8, args: &[String]) -> String {
    format!(":w{:02}={}.\r\n", register, args.join(","))
}

/// Encode a register read: `:rNN=0.\r\n`
pub fn encode_read(register: u8) -> String {
    format!(":r{:02}=0.\r\n", register)
}

/// Whether a line acknowledges a write
pub fn is_ok(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(":ok")
}

/// Parse the values of a read response for `register`
pub fn parse_read_response(register: u8, line: &str) -> Result<Vec<String>> {
    let line = line.trim();
    let prefix = format!(":r{:02}=", register);
    let body = line.strip_prefix(&prefix).ok_or_else(|| {
        ControllerError::Protocol(format!(
            "unexpected response to read of register {:02}: '{}'",
            register, line
        ))
    })?;
    let body = body.strip_suffix('.').unwrap_or(body);
    Ok(body.split(',').map(|v| v.trim().to_string()).collect())
}

/// Parse one numeric field of a read response
pub fn field<T: FromStr>(values: &[String], index: usize, register: u8) -> Result<T> {
    values
        .get(index)
        .and_then(|v| v.parse::<T>().ok())
        .ok_or_else(|| {
            ControllerError::Protocol(format!(
                "register {:02}: missing or invalid field #{} in {:?}",
                register, index, values
            ))
        })
}

/// Frequency to wire arguments (`hz*100`, unit Hz)
pub fn frequency_to_wire(hz: f64) -> Result<Vec<String>> {
    let hz = check_range("frequency", hz, 0.0, MAX_FREQUENCY_HZ)?;
    Ok(vec![format!("{}", (hz * 100.0).round() as u64), "0".to_string()])
}

/// Frequency from wire arguments, honoring the unit field
pub fn frequency_from_wire(values: &[String]) -> Result<f64> {
    let raw: f64 = field(values, 0, REG_FREQUENCY)?;
    let unit: u8 = field(values, 1, REG_FREQUENCY).unwrap_or(0);
    let scale = match unit {
        3 => 1e-3,
        4 => 1e-6,
        _ => 1.0,
    };
    Ok(raw / 100.0 * scale)
}

pub fn amplitude_to_wire(volts: f64) -> Result<Vec<String>> {
    let v = check_range("amplitude", volts, 0.0, MAX_AMPLITUDE_V)?;
    Ok(vec![format!("{}", (v * 1000.0).round() as u32)])
}

pub fn amplitude_from_wire(values: &[String]) -> Result<f64> {
    let mv: f64 = field(values, 0, REG_AMPLITUDE)?;
    Ok(mv / 1000.0)
}

pub fn offset_to_wire(volts: f64) -> Result<Vec<String>> {
    let v = check_range("offset", volts, -MAX_OFFSET_V, MAX_OFFSET_V)?;
    Ok(vec![format!("{}", ((v * 100.0).round() as i32) + 1000)])
}

pub fn offset_from_wire(values: &[String]) -> Result<f64> {
    let raw: f64 = field(values, 0, REG_OFFSET)?;
    Ok((raw - 1000.0) / 100.0)
}

pub fn duty_to_wire(percent: f64) -> Result<Vec<String>> {
    let p = check_range("duty cycle", percent, 0.0, MAX_DUTY_PCT)?;
    Ok(vec![format!("{}", (p * 10.0).round() as u32)])
}

pub fn duty_from_wire(values: &[String]) -> Result<f64> {
    let raw: f64 = field(values, 0, REG_DUTY)?;
    Ok(raw / 10.0)
}

pub fn phase_to_wire(degrees: f64) -> Result<Vec<String>> {
    let d = check_range("phase", degrees, 0.0, MAX_PHASE_DEG)?;
    Ok(vec![format!("{}", (d * 10.0).round() as u32)])
}

pub fn channels_to_wire(ch1: bool, ch2: bool) -> Vec<String> {
    vec![u8::from(ch1).to_string(), u8::from(ch2).to_string()]
}

pub fn channels_from_wire(values: &[String]) -> Result<(bool, bool)> {
    let a: u8 = field(values, 0, REG_CHANNELS)?;
    let b: u8 = field(values, 1, REG_CHANNELS)?;
    Ok((a != 0, b != 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_write_and_read() {
        assert_eq!(
            encode_write(REG_FREQUENCY, &frequency_to_wire(1000.0).unwrap()),
            ":w23=100000,0.\r\n"
        );
        assert_eq!(encode_read(REG_CHANNELS), ":r20=0.\r\n");
        assert_eq!(
            encode_write(REG_CHANNELS, &channels_to_wire(true, false)),
            ":w20=1,0.\r\n"
        );
    }

    #[test]
    fn test_parse_read_response() {
        let values = parse_read_response(23, ":r23=123456,0.\r\n").unwrap();
        assert_eq!(values, vec!["123456", "0"]);
        assert_eq!(frequency_from_wire(&values).unwrap(), 1234.56);

        let err = parse_read_response(23, ":r24=1,0.").unwrap_err();
        assert!(matches!(err, ControllerError::Protocol(_)));
    }

    #[test]
    fn test_is_ok() {
        assert!(is_ok(":ok\r\n"));
        assert!(is_ok(":OK"));
        assert!(!is_ok(":r20=1,1."));
    }

    #[test]
    fn test_channel_registers() {
        assert_eq!(Channel::One.register(REG_FREQUENCY), 23);
        assert_eq!(Channel::Two.register(REG_FREQUENCY), 24);
        assert_eq!(Channel::Two.register(REG_DUTY), 30);
        assert_eq!(Channel::from_number(3), None);
    }

    #[test]
    fn test_offset_encoding() {
        assert_eq!(offset_to_wire(0.0).unwrap(), vec!["1000"]);
        assert_eq!(offset_to_wire(-2.5).unwrap(), vec!["750"]);
        assert_eq!(offset_from_wire(&["1250".to_string()]).unwrap(), 2.5);
        assert!(offset_to_wire(12.0).is_err());
    }

    #[test]
    fn test_amplitude_duty_phase_encoding() {
        assert_eq!(amplitude_to_wire(5.0).unwrap(), vec!["5000"]);
        assert_eq!(amplitude_from_wire(&["1500".to_string()]).unwrap(), 1.5);
        assert_eq!(duty_to_wire(50.0).unwrap(), vec!["500"]);
        assert_eq!(duty_from_wire(&["255".to_string()]).unwrap(), 25.5);
        assert_eq!(phase_to_wire(90.0).unwrap(), vec!["900"]);
        assert!(amplitude_to_wire(25.0).is_err());
        assert!(duty_to_wire(-1.0).is_err());
    }

    #[test]
    fn test_frequency_range() {
        assert!(frequency_to_wire(60_000_001.0).is_err());
        assert!(frequency_to_wire(f64::NAN).is_err());
        assert_eq!(frequency_to_wire(0.0).unwrap(), vec!["0", "0"]);
    }

    #[test]
    fn test_waveform_names() {
        assert_eq!("sine".parse::<Waveform>().unwrap(), Waveform::SINE);
        assert_eq!("Square".parse::<Waveform>().unwrap(), Waveform::SQUARE);
        assert_eq!(
            "partial sine".parse::<Waveform>().unwrap(),
            Waveform::Builtin(4)
        );
        assert_eq!("exp_rise".parse::<Waveform>().unwrap(), Waveform::Builtin(12));
        assert_eq!("multitone".parse::<Waveform>().unwrap(), Waveform::Builtin(14));
        assert_eq!("arb12".parse::<Waveform>().unwrap(), Waveform::Arbitrary(12));
        assert_eq!("3".parse::<Waveform>().unwrap(), Waveform::Builtin(3));
        assert!("arb61".parse::<Waveform>().is_err());
        assert!("wobble".parse::<Waveform>().is_err());
    }

    #[test]
    fn test_waveform_codes() {
        assert_eq!(Waveform::Arbitrary(1).code(), 101);
        assert_eq!(Waveform::from_code(160), Some(Waveform::Arbitrary(60)));
        assert_eq!(Waveform::from_code(100), None);
        assert_eq!(Waveform::from_code(16).unwrap().name(), "lorenz");
    }
}
