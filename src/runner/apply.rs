//! Applying step options to the generator
//!
//! Option keys of a `freq` step:
//! - `channel`: selector (`1`, `ch1`, `2`, `both`, `1+2`, ...)
//! - `channels`: output enable, `{"ch1":true,"ch2":false}` or a selector
//! - `ch1` / `ch2`: per-channel settings, may carry their own `frequency`
//! - `waveform`, `amplitude`, `offset`, `dutycycle` (`duty`), `phase`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::commands::{FreqStep, StepOptions};
use crate::device::{Channel, Generator, Waveform};
use crate::error::{ControllerError, Result};

/// Keys that select channels rather than configure them
const SELECTOR_KEYS: &[&str] = &["channel", "channels", "ch1", "ch2", "channel1", "channel2"];

/// Which outputs a step addresses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelSelection {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
    #[default]
    Both,
}

impl ChannelSelection {
    pub fn channels(&self) -> &'static [Channel] {
        match self {
            ChannelSelection::One => &[Channel::One],
            ChannelSelection::Two => &[Channel::Two],
            ChannelSelection::Both => &Channel::BOTH,
        }
    }

    /// Interpret a selector option, falling back to `default` when absent
    ///
    /// Unrecognized selectors address both channels.
    pub fn from_value(value: Option<&Value>, default: ChannelSelection) -> Self {
        match value {
            None | Some(Value::Null) => default,
            Some(Value::String(s)) if s.trim().is_empty() => default,
            Some(Value::String(s)) => s.parse().unwrap_or(ChannelSelection::Both),
            Some(Value::Number(n)) => match n.as_u64() {
                Some(1) => ChannelSelection::One,
                Some(2) => ChannelSelection::Two,
                _ => ChannelSelection::Both,
            },
            Some(_) => ChannelSelection::Both,
        }
    }
}

impl FromStr for ChannelSelection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "ch1" | "channel1" => Ok(ChannelSelection::One),
            "2" | "ch2" | "channel2" => Ok(ChannelSelection::Two),
            "both" | "all" | "12" | "1+2" => Ok(ChannelSelection::Both),
            other => Err(format!("invalid channel '{}'. Use 1, 2 or both", other)),
        }
    }
}

impl fmt::Display for ChannelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChannelSelection::One => "1",
            ChannelSelection::Two => "2",
            ChannelSelection::Both => "both",
        })
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ControllerError {
    ControllerError::InvalidOption {
        key: key.to_string(),
        message: message.into(),
    }
}

fn as_f64(key: &str, value: &Value) -> Result<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.ok_or_else(|| invalid(key, format!("expected a number, got {}", value)))
}

fn as_bool(key: &str, value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().unwrap_or(0.0) != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "y" | "on" => Ok(true),
            "0" | "false" | "no" | "n" | "off" => Ok(false),
            _ => Err(invalid(key, format!("expected true/false, got '{}'", s))),
        },
        other => Err(invalid(key, format!("expected true/false, got {}", other))),
    }
}

fn as_waveform(key: &str, value: &Value) -> Result<Waveform> {
    match value {
        Value::String(s) => s.parse(),
        Value::Number(n) => n
            .as_u64()
            .and_then(|c| u16::try_from(c).ok())
            .and_then(Waveform::from_code)
            .ok_or_else(|| invalid(key, format!("unknown waveform code {}", n))),
        other => Err(invalid(key, format!("expected a waveform name, got {}", other))),
    }
}

/// Apply one setting to `channel`
///
/// # Errors
///
/// Unknown keys and malformed values are [`ControllerError::InvalidOption`].
pub fn apply_setting(
    generator: &mut dyn Generator,
    channel: Channel,
    key: &str,
    value: &Value,
) -> Result<()> {
    match key.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
        "frequency" | "freq" => generator.set_frequency(channel, as_f64(key, value)?),
        "waveform" | "wave" => generator.set_waveform(channel, as_waveform(key, value)?),
        "amplitude" | "ampl" => generator.set_amplitude(channel, as_f64(key, value)?),
        "offset" | "offs" => generator.set_offset(channel, as_f64(key, value)?),
        "dutycycle" | "duty_cycle" | "duty" => {
            generator.set_duty_cycle(channel, as_f64(key, value)?)
        }
        "phase" => generator.set_phase(as_f64(key, value)?),
        _ => Err(invalid(
            key,
            "unsupported option. Use waveform, amplitude, offset, dutycycle, phase",
        )),
    }
}

/// Apply every non-selector setting of `settings` to `channel`
pub fn apply_channel_settings(
    generator: &mut dyn Generator,
    channel: Channel,
    settings: &StepOptions,
) -> Result<()> {
    for (key, value) in settings {
        if SELECTOR_KEYS.contains(&key.to_lowercase().as_str()) {
            continue;
        }
        apply_setting(generator, channel, key, value)?;
    }
    Ok(())
}

/// Settings of a step that configure the signal shape (no frequency)
pub fn shape_settings(options: &StepOptions) -> StepOptions {
    options
        .iter()
        .filter(|(k, _)| !matches!(k.to_lowercase().as_str(), "frequency" | "freq"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Output enable from the `channels` option
fn output_enable(value: &Value) -> Result<(bool, bool)> {
    match value {
        Value::Object(map) => {
            let pick = |a: &str, b: &str| -> Result<bool> {
                match map.get(a).or_else(|| map.get(b)) {
                    Some(v) => as_bool("channels", v),
                    None => Ok(true),
                }
            };
            Ok((pick("ch1", "channel1")?, pick("ch2", "channel2")?))
        }
        Value::String(s) => {
            let sel: ChannelSelection = s.parse().map_err(|e: String| invalid("channels", e))?;
            Ok((
                sel.channels().contains(&Channel::One),
                sel.channels().contains(&Channel::Two),
            ))
        }
        other => Err(invalid(
            "channels",
            format!("expected {{\"ch1\":true,\"ch2\":false}} or a channel, got {}", other),
        )),
    }
}

fn per_channel(options: &StepOptions, channel: Channel) -> Option<&serde_json::Map<String, Value>> {
    let (short, long) = match channel {
        Channel::One => ("ch1", "channel1"),
        Channel::Two => ("ch2", "channel2"),
    };
    options
        .get(short)
        .or_else(|| options.get(long))
        .and_then(Value::as_object)
}

/// Execute a `freq` step on the generator
///
/// Frequency is written before the other settings of a channel.
pub fn apply_freq_step(
    generator: &mut dyn Generator,
    step: &FreqStep,
    default: ChannelSelection,
) -> Result<()> {
    let opts = &step.options;

    if let Some(value) = opts.get("channels") {
        let (ch1, ch2) = output_enable(value)?;
        generator.set_channels(ch1, ch2)?;
    }

    let overrides: Vec<(Channel, &serde_json::Map<String, Value>)> = Channel::BOTH
        .iter()
        .filter_map(|&ch| per_channel(opts, ch).map(|m| (ch, m)))
        .collect();

    if !overrides.is_empty() {
        for (channel, settings) in overrides {
            let hz = match settings.get("frequency") {
                Some(v) => as_f64("frequency", v)?,
                None => step.hz,
            };
            generator.set_frequency(channel, hz)?;
            apply_channel_settings(generator, channel, &shape_settings(settings))?;
        }
        return Ok(());
    }

    let selection = ChannelSelection::from_value(opts.get("channel"), default);
    for &channel in selection.channels() {
        generator.set_frequency(channel, step.hz)?;
        apply_channel_settings(generator, channel, opts)?;
    }
    Ok(())
}
