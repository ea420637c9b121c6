//! Command file parser
//!
//! Parses the CSV-like command format into a flat list of [`Step`]s.
//!
//! # Supported commands (case-insensitive)
//!
//! - `freq,<hz or [list]>,<optional options>`
//! - `wait,<seconds>`
//! - `stop`
//! - `cycle,[list],<on>,<off>` or `cycle,[list],on=5,off=10,pause_hz=0`
//! - `mod,<start>,<end>,<time>,<direction>,<adaptive>,<repeat>,<update_ms>`
//!   or the same as `key=value` pairs
//!
//! # Legacy list groups
//!
//! `freq,[list]` followed by an optional `wait`, an optional `freq,0` and an
//! optional second `wait` is expanded so the whole group runs per element.
//!
//! The delimiter is sniffed (`,`, `;` or tab). Quotes are not interpreted so
//! JSON options can live unquoted inside a row.

use std::path::Path;

use serde_json::Value;

use super::model::{
    CycleItem, CycleRange, CycleStep, Direction, FreqStep, ModStep, Step, StepOptions, StopStep,
    WaitStep,
};
use super::options::{parse_loose_list, parse_options, strip_prefix_ci};
use crate::error::{ControllerError, Result};

const WAIT_ALIASES: &[&str] = &["wait", "sleep", "delay"];
const STOP_ALIASES: &[&str] = &["stop", "off", "disable"];
const FREQ_ALIASES: &[&str] = &["freq", "frequency", "f"];
const CYCLE_ALIASES: &[&str] = &["cycle", "loop"];
const MOD_ALIASES: &[&str] = &["mod", "modulate", "sweep"];

/// Candidate delimiters in preference order
const DELIMITERS: [char; 3] = [',', ';', '\t'];

/// Lines inspected when sniffing the delimiter
const SNIFF_LINES: usize = 25;

/// Steps before list-group expansion
#[derive(Debug)]
enum RawStep {
    Step(Step),
    FreqList {
        freqs_hz: Vec<f64>,
        options: StepOptions,
        source_line: usize,
    },
}

/// Parse a command file from disk
///
/// # Errors
/// * `ControllerError::CommandFileNotFound` - If the file does not exist
/// * `ControllerError::Parse` - On the first invalid line
pub fn parse_commands_file(path: impl AsRef<Path>) -> Result<Vec<Step>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ControllerError::CommandFileNotFound(
            path.display().to_string(),
        ));
    }
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    tracing::debug!("Parsing command file: {}", path.display());
    parse_commands_str(&text)
}

/// Parse command text
pub fn parse_commands_str(text: &str) -> Result<Vec<Step>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let delimiter = sniff_delimiter(text);
    let mut raw_steps: Vec<RawStep> = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let idx = i + 1;
        let row: Vec<String> = line
            .split(delimiter)
            .map(|c| c.trim().to_string())
            .collect();
        if row.is_empty() || row[0].is_empty() || row[0].starts_with('#') {
            continue;
        }

        let cmd = row[0].to_lowercase();
        let cmd = cmd.as_str();

        if WAIT_ALIASES.contains(&cmd) {
            let seconds = row
                .get(1)
                .and_then(|s| parse_number(s))
                .ok_or_else(|| ControllerError::parse(idx, "wait expects seconds as number"))?;
            raw_steps.push(RawStep::Step(Step::Wait(WaitStep {
                seconds,
                source_line: idx,
            })));
        } else if STOP_ALIASES.contains(&cmd) {
            raw_steps.push(RawStep::Step(Step::Stop(StopStep { source_line: idx })));
        } else if FREQ_ALIASES.contains(&cmd) {
            raw_steps.push(parse_freq(&row, delimiter, idx)?);
        } else if CYCLE_ALIASES.contains(&cmd) {
            raw_steps.push(RawStep::Step(Step::Cycle(parse_cycle(&row, delimiter, idx)?)));
        } else if MOD_ALIASES.contains(&cmd) {
            raw_steps.push(RawStep::Step(Step::Mod(parse_mod(&row, delimiter, idx)?)));
        } else {
            return Err(ControllerError::parse(
                idx,
                format!(
                    "unknown command '{}'. Use 'freq', 'wait', 'stop', 'cycle' or 'mod'.",
                    row[0]
                ),
            ));
        }
    }

    Ok(expand_steps(raw_steps))
}

/// Pick the delimiter that most often follows the command word
///
/// Options may contain commas in a `;` separated file, so only the first
/// candidate character of each line is counted.
fn sniff_delimiter(text: &str) -> char {
    let mut counts = [0usize; DELIMITERS.len()];
    for line in text
        .lines()
        .take(SNIFF_LINES)
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
    {
        if let Some(pos) = line
            .chars()
            .find_map(|c| DELIMITERS.iter().position(|&d| d == c))
        {
            counts[pos] += 1;
        }
    }

    let mut best = 0;
    for (i, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = i;
        }
    }
    DELIMITERS[best]
}

/// Parse a float the way a user would expect (`1e3`, ` 5 `, `inf`)
pub(crate) fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

/// Parse a user supplied boolean
pub(crate) fn parse_bool(s: &str) -> std::result::Result<bool, String> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        _ => Err(format!("invalid boolean '{}' (use true/false)", s)),
    }
}

fn looks_like_list(s: &str) -> bool {
    let st = s.trim();
    st.starts_with('[') && st.ends_with(']')
}

fn starts_options(cell: &str) -> bool {
    cell.starts_with('{')
        || strip_prefix_ci(cell, "json:").is_some()
        || strip_prefix_ci(cell, "py:").is_some()
}

/// Join cells starting at `start` until a `[...]` token is balanced
///
/// With `,` as delimiter `freq,[1000,2000,3000]` arrives as
/// `["freq", "[1000", "2000", "3000]"]`. Returns the token and the index of
/// the first cell after it.
fn consume_bracketed_token(cells: &[String], start: usize, delimiter: char) -> (String, usize) {
    let Some(first) = cells.get(start) else {
        return (String::new(), start);
    };
    if !first.starts_with('[') {
        return (first.clone(), start + 1);
    }

    let mut parts: Vec<&str> = Vec::new();
    let mut balance: i64 = 0;
    let mut i = start;
    while i < cells.len() {
        let p = cells[i].as_str();
        parts.push(p);
        balance += p.matches('[').count() as i64 - p.matches(']').count() as i64;
        i += 1;
        if balance <= 0 {
            break;
        }
    }

    (parts.join(&delimiter.to_string()), i)
}

fn tail_options(row: &[String], from: usize, delimiter: char, idx: usize) -> Result<StepOptions> {
    if from >= row.len() {
        return Ok(StepOptions::new());
    }
    let raw = row[from..].join(&delimiter.to_string());
    if raw.trim().is_empty() {
        return Ok(StepOptions::new());
    }
    parse_options(&raw).map_err(|e| ControllerError::parse(idx, e))
}

fn parse_freq(row: &[String], delimiter: char, idx: usize) -> Result<RawStep> {
    if row.len() < 2 {
        return Err(ControllerError::parse(
            idx,
            "freq expects <Hz> or <[list]> as second column",
        ));
    }
    let (token, next) = consume_bracketed_token(row, 1, delimiter);
    let token = token.trim();
    let options = tail_options(row, next, delimiter, idx)?;

    if looks_like_list(token) {
        let freqs_hz = parse_number_list(token, idx)?;
        return Ok(RawStep::FreqList {
            freqs_hz,
            options,
            source_line: idx,
        });
    }

    let hz = parse_number(token).ok_or_else(|| {
        ControllerError::parse(idx, "freq expects a number (Hz) or list like [1000,2000]")
    })?;
    Ok(RawStep::Step(Step::Freq(FreqStep {
        hz,
        options,
        source_line: idx,
    })))
}

fn value_as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

fn parse_number_list(token: &str, idx: usize) -> Result<Vec<f64>> {
    let items = parse_loose_list(token).map_err(|e| {
        ControllerError::parse(idx, format!("invalid list syntax for frequencies: {}", e))
    })?;
    let mut out = Vec::with_capacity(items.len());
    for x in &items {
        let hz = value_as_f64(x).ok_or_else(|| {
            ControllerError::parse(idx, format!("list element '{}' is not a number", x))
        })?;
        out.push(hz);
    }
    if out.is_empty() {
        return Err(ControllerError::parse(idx, "frequency list is empty"));
    }
    Ok(out)
}

const CYCLE_RANGE_EXAMPLE: &str = r#"{"start":55000,"end":200000,"step":0.1}"#;

/// Parse a cycle list allowing numbers and `{start,end,step}` range objects
fn parse_cycle_items(token: &str, idx: usize) -> Result<Vec<CycleItem>> {
    if !looks_like_list(token) {
        return Err(ControllerError::parse(
            idx,
            "cycle expects a list of frequencies, e.g. [1000,2000,3000].",
        ));
    }

    let values = parse_loose_list(token).map_err(|e| {
        ControllerError::parse(
            idx,
            format!(
                "can't parse cycle frequency list. Use a list like [30000, 44000, {}, 1000000]. Details: {}",
                CYCLE_RANGE_EXAMPLE, e
            ),
        )
    })?;

    let mut items = Vec::with_capacity(values.len());
    for (i, x) in values.iter().enumerate() {
        let pos = i + 1;
        match x {
            Value::Number(n) => {
                let hz = n.as_f64().filter(|v| v.is_finite()).ok_or_else(|| {
                    ControllerError::parse(
                        idx,
                        format!("cycle element #{} frequency must be a finite number", pos),
                    )
                })?;
                items.push(CycleItem::Hz(hz));
            }
            Value::Object(map) => {
                let mut extra: Vec<&str> = map
                    .keys()
                    .map(String::as_str)
                    .filter(|k| !matches!(*k, "start" | "end" | "step"))
                    .collect();
                if !extra.is_empty() {
                    extra.sort_unstable();
                    return Err(ControllerError::parse(
                        idx,
                        format!(
                            "cycle element #{} has unknown field(s): {}. Allowed: start, end, step. Example: {}",
                            pos,
                            extra.join(", "),
                            CYCLE_RANGE_EXAMPLE
                        ),
                    ));
                }
                let (Some(start), Some(end)) = (map.get("start"), map.get("end")) else {
                    return Err(ControllerError::parse(
                        idx,
                        format!(
                            "cycle element #{} range must contain 'start' and 'end'. Example: {}",
                            pos, CYCLE_RANGE_EXAMPLE
                        ),
                    ));
                };
                let (Some(start_hz), Some(end_hz)) = (value_as_f64(start), value_as_f64(end))
                else {
                    return Err(ControllerError::parse(
                        idx,
                        format!("cycle element #{} range start/end must be numbers", pos),
                    ));
                };
                if !(start_hz.is_finite() && end_hz.is_finite()) {
                    return Err(ControllerError::parse(
                        idx,
                        format!("cycle element #{} range start/end must be finite numbers", pos),
                    ));
                }
                let step_hz = match map.get("step") {
                    None => 1.0,
                    Some(v) => value_as_f64(v).ok_or_else(|| {
                        ControllerError::parse(
                            idx,
                            format!("cycle element #{} range step must be a number", pos),
                        )
                    })?,
                };
                if !step_hz.is_finite() {
                    return Err(ControllerError::parse(
                        idx,
                        format!("cycle element #{} range step must be a finite number", pos),
                    ));
                }
                if step_hz == 0.0 {
                    return Err(ControllerError::parse(
                        idx,
                        format!("cycle element #{} range step must not be 0", pos),
                    ));
                }
                if start_hz == end_hz {
                    items.push(CycleItem::Hz(start_hz));
                } else {
                    items.push(CycleItem::Range(CycleRange::new(start_hz, end_hz, step_hz)));
                }
            }
            _ => {
                return Err(ControllerError::parse(
                    idx,
                    format!(
                        "cycle element #{} must be either a number (Hz) or a range object. Example: [30000, 44000, {}, 1000000]",
                        pos, CYCLE_RANGE_EXAMPLE
                    ),
                ));
            }
        }
    }

    if items.is_empty() {
        return Err(ControllerError::parse(idx, "cycle list is empty"));
    }
    Ok(items)
}

/// Split `key=value`, normalizing the key (`pause_hz` -> `pause-hz`)
fn split_key_value(cell: &str) -> Option<(String, &str)> {
    let (k, v) = cell.split_once('=')?;
    Some((k.trim().to_lowercase().replace('_', "-"), v.trim()))
}

fn parse_cycle(row: &[String], delimiter: char, idx: usize) -> Result<CycleStep> {
    if row.len() < 2 {
        return Err(ControllerError::parse(
            idx,
            "cycle expects a list, e.g. cycle,[1000,2000,3000],on=5,off=10",
        ));
    }
    let (token, next) = consume_bracketed_token(row, 1, delimiter);
    let token = token.trim();
    if !looks_like_list(token) {
        return Err(ControllerError::parse(
            idx,
            "cycle expects a frequency list like [1000,2000,3000]",
        ));
    }
    let items = parse_cycle_items(token, idx)?;

    let mut on_wait: Option<f64> = None;
    let mut off_wait: Option<f64> = None;
    let mut pause_hz = 0.0;
    let mut adaptive_voltage = false;

    let mut j = next;
    while j < row.len() {
        let cell = row[j].as_str();
        if cell.is_empty() {
            j += 1;
            continue;
        }
        if starts_options(cell) {
            break;
        }

        if let Some((k, v)) = split_key_value(cell) {
            if matches!(k.as_str(), "adaptive-voltage" | "adaptive" | "adaptivevoltage") {
                adaptive_voltage = parse_bool(v).map_err(|e| ControllerError::parse(idx, e))?;
                j += 1;
                continue;
            }
            let fv = parse_number(v).ok_or_else(|| {
                ControllerError::parse(idx, format!("cycle parameter '{}' must be a number", k))
            })?;
            match k.as_str() {
                "on" | "wait" | "hold" | "on-wait" | "onwait" => on_wait = Some(fv),
                "off" | "pause" | "off-wait" | "offwait" | "pause-wait" | "pausewait" => {
                    off_wait = Some(fv)
                }
                "pause-hz" | "pause-freq" | "off-hz" | "off-freq" => pause_hz = fv,
                _ => {
                    return Err(ControllerError::parse(
                        idx,
                        format!(
                            "unknown cycle parameter '{}'. Use on=, off=, pause_hz=, adaptive-voltage=true",
                            k
                        ),
                    ))
                }
            }
            j += 1;
            continue;
        }

        if let Some(fv) = parse_number(cell) {
            if on_wait.is_none() {
                on_wait = Some(fv);
            } else if off_wait.is_none() {
                off_wait = Some(fv);
            } else {
                return Err(ControllerError::parse(
                    idx,
                    "too many numeric args for cycle. Use cycle,[...],on,off",
                ));
            }
            j += 1;
            continue;
        }

        // Anything else starts an unprefixed options tail
        break;
    }

    let options = tail_options(row, j, delimiter, idx)?;

    Ok(CycleStep {
        items,
        on_wait: on_wait.unwrap_or(0.0),
        off_wait,
        pause_hz,
        adaptive_voltage,
        options,
        source_line: idx,
    })
}

fn mod_number(k: &str, v: &str, unit: &str, idx: usize) -> Result<f64> {
    parse_number(v).ok_or_else(|| {
        ControllerError::parse(idx, format!("mod parameter '{}' must be a number{}", k, unit))
    })
}

fn parse_mod(row: &[String], delimiter: char, idx: usize) -> Result<ModStep> {
    let mut start_hz: Option<f64> = None;
    let mut end_hz: Option<f64> = None;
    let mut time_s: Option<f64> = None;
    let mut update_ms: Option<f64> = None;
    let mut direction: Option<Direction> = None;
    let mut adaptive_voltage: Option<bool> = None;
    let mut repeat: Option<bool> = None;

    let as_parse = |e: String| ControllerError::parse(idx, e);

    let mut positional: Vec<&str> = Vec::new();
    let mut j = 1;
    while j < row.len() {
        let cell = row[j].as_str();
        if cell.is_empty() {
            j += 1;
            continue;
        }
        if starts_options(cell) {
            break;
        }
        if let Some((k, v)) = split_key_value(cell) {
            match k.as_str() {
                "start" | "from" | "start-hz" | "f-start" => {
                    start_hz = Some(mod_number(&k, v, "", idx)?)
                }
                "end" | "to" | "end-hz" | "f-end" => end_hz = Some(mod_number(&k, v, "", idx)?),
                "time" | "time-s" | "s" | "sec" | "secs" | "second" | "seconds" | "cycle"
                | "cycle-s" | "duration" | "duration-s" => {
                    time_s = Some(mod_number(&k, v, " (seconds)", idx)?)
                }
                "time-ms" | "ms" | "cycle-ms" | "duration-ms" => {
                    time_s = Some(mod_number(&k, v, " (milliseconds)", idx)? / 1000.0)
                }
                "update" | "update-ms" | "interval" | "interval-ms" | "tick" | "tick-ms"
                | "step" | "step-ms" => update_ms = Some(mod_number(&k, v, " (milliseconds)", idx)?),
                "direction" | "dir" => direction = Some(Direction::parse(v).map_err(as_parse)?),
                "adaptive-voltage" | "adaptive" | "adaptivevoltage" | "adaptive-voltage?" => {
                    adaptive_voltage = Some(parse_bool(v).map_err(as_parse)?)
                }
                "repeat" | "loop" => repeat = Some(parse_bool(v).map_err(as_parse)?),
                _ => {
                    return Err(ControllerError::parse(
                        idx,
                        format!(
                            "unknown mod parameter '{}'. Use start=, end=, time= (seconds), update= (ms), direction=, adaptive-voltage=, repeat=",
                            k
                        ),
                    ))
                }
            }
            j += 1;
            continue;
        }
        positional.push(cell);
        j += 1;
    }

    // positional: start,end,time(seconds),direction,adaptive_voltage,repeat,update-ms
    if positional.len() > 7 {
        return Err(ControllerError::parse(
            idx,
            "too many positional args for mod. Use mod,start,end,time_seconds,direction,adaptive-voltage,repeat,update_ms",
        ));
    }
    for (pos, cell) in positional.iter().enumerate() {
        match pos {
            0 => {
                start_hz = Some(
                    parse_number(cell)
                        .ok_or_else(|| ControllerError::parse(idx, "mod start must be a number"))?,
                )
            }
            1 => {
                end_hz = Some(
                    parse_number(cell)
                        .ok_or_else(|| ControllerError::parse(idx, "mod end must be a number"))?,
                )
            }
            2 => {
                time_s = Some(parse_number(cell).ok_or_else(|| {
                    ControllerError::parse(idx, "mod time must be a number (seconds)")
                })?)
            }
            3 => direction = Some(Direction::parse(cell).map_err(as_parse)?),
            4 => adaptive_voltage = Some(parse_bool(cell).map_err(as_parse)?),
            5 => repeat = Some(parse_bool(cell).map_err(as_parse)?),
            _ => {
                update_ms = Some(parse_number(cell).ok_or_else(|| {
                    ControllerError::parse(
                        idx,
                        "mod update interval must be a number (milliseconds)",
                    )
                })?)
            }
        }
    }

    let start_hz = start_hz.unwrap_or(1.0);
    let end_hz = end_hz.unwrap_or(1_000_000.0);
    let time_s = time_s.unwrap_or(1.0);
    let update_ms = update_ms.unwrap_or(50.0);

    if start_hz < 0.0 || end_hz < 0.0 {
        return Err(ControllerError::parse(idx, "mod start/end must be >= 0"));
    }
    if time_s <= 0.0 || time_s.is_nan() {
        return Err(ControllerError::parse(idx, "mod time must be > 0 (seconds)"));
    }
    if update_ms <= 0.0 || update_ms.is_nan() {
        return Err(ControllerError::parse(
            idx,
            "mod update interval must be > 0 (milliseconds)",
        ));
    }

    let options = tail_options(row, j, delimiter, idx)?;

    Ok(ModStep {
        start_hz,
        end_hz,
        time_s,
        update_ms,
        direction: direction.unwrap_or(Direction::RiseAndFall),
        adaptive_voltage: adaptive_voltage.unwrap_or(false),
        repeat: repeat.unwrap_or(true),
        options,
        source_line: idx,
    })
}

/// Expand legacy `freq,[list]` groups into a flat list of steps
fn expand_steps(raw_steps: Vec<RawStep>) -> Vec<Step> {
    let mut out = Vec::with_capacity(raw_steps.len());
    let mut iter = raw_steps.into_iter().peekable();

    while let Some(raw) = iter.next() {
        let (freqs_hz, options, source_line) = match raw {
            RawStep::Step(step) => {
                out.push(step);
                continue;
            }
            RawStep::FreqList {
                freqs_hz,
                options,
                source_line,
            } => (freqs_hz, options, source_line),
        };

        let on_wait = iter
            .next_if(|s| matches!(s, RawStep::Step(Step::Wait(_))))
            .and_then(into_wait);

        let pause_freq = iter
            .next_if(|s| matches!(s, RawStep::Step(Step::Freq(f)) if f.hz == 0.0))
            .and_then(|s| match s {
                RawStep::Step(Step::Freq(f)) => Some(f),
                _ => None,
            });

        let off_wait = if pause_freq.is_some() {
            iter.next_if(|s| matches!(s, RawStep::Step(Step::Wait(_))))
                .and_then(into_wait)
        } else {
            None
        };

        for hz in freqs_hz {
            out.push(Step::Freq(FreqStep {
                hz,
                options: options.clone(),
                source_line,
            }));
            if let Some(w) = &on_wait {
                out.push(Step::Wait(w.clone()));
            }
            if let Some(p) = &pause_freq {
                out.push(Step::Freq(p.clone()));
                if let Some(w) = &off_wait {
                    out.push(Step::Wait(w.clone()));
                }
            }
        }
    }

    out
}

fn into_wait(s: RawStep) -> Option<WaitStep> {
    match s {
        RawStep::Step(Step::Wait(w)) => Some(w),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn freq_hz(step: &Step) -> f64 {
        match step {
            Step::Freq(f) => f.hz,
            other => panic!("expected freq, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_text_yields_no_steps() {
        assert!(parse_commands_str("").unwrap().is_empty());
        assert!(parse_commands_str("  \n \n").unwrap().is_empty());
    }

    #[test]
    fn test_basic_commands_and_comments() {
        let steps = parse_commands_str(
            "# demo\nfreq,1000\nWAIT,2.5\n\nstop\nsleep,1\noff\n",
        )
        .unwrap();
        assert_eq!(steps.len(), 5);
        assert_eq!(freq_hz(&steps[0]), 1000.0);
        assert_eq!(steps[0].source_line(), 2);
        assert!(matches!(&steps[1], Step::Wait(w) if w.seconds == 2.5 && w.source_line == 3));
        assert!(matches!(&steps[2], Step::Stop(s) if s.source_line == 5));
        assert!(matches!(&steps[4], Step::Stop(_)));
    }

    #[test]
    fn test_unknown_command() {
        let err = parse_commands_str("freq,1000\nbeep,3\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Line 2: unknown command 'beep'. Use 'freq', 'wait', 'stop', 'cycle' or 'mod'."
        );
    }

    #[test]
    fn test_wait_requires_number() {
        let err = parse_commands_str("wait,soon").unwrap_err();
        assert_eq!(err.to_string(), "Line 1: wait expects seconds as number");
        let err = parse_commands_str("wait").unwrap_err();
        assert!(err.to_string().contains("wait expects seconds"));
    }

    #[test]
    fn test_freq_with_unquoted_json_options() {
        let steps =
            parse_commands_str(r#"freq,2000,{"waveform":"square","amplitude":2.5}"#).unwrap();
        match &steps[0] {
            Step::Freq(f) => {
                assert_eq!(f.hz, 2000.0);
                assert_eq!(f.options.get("waveform"), Some(&json!("square")));
                assert_eq!(f.options.get("amplitude"), Some(&json!(2.5)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_semicolon_delimiter_sniffed() {
        let steps = parse_commands_str(
            "freq;1000;{\"waveform\":\"sine\",\"amplitude\":1}\nwait;1\nfreq;[1,2]\n",
        )
        .unwrap();
        assert_eq!(steps.len(), 4);
        match &steps[0] {
            Step::Freq(f) => assert_eq!(f.options.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_tab_delimiter_sniffed() {
        let steps = parse_commands_str("freq\t440\nwait\t0.5\n").unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(freq_hz(&steps[0]), 440.0);
    }

    #[test]
    fn test_freq_list_legacy_group_expansion() {
        let text = "freq,[1000,2000,3000]\nwait,5\nfreq,0\nwait,1\nstop\n";
        let steps = parse_commands_str(text).unwrap();
        // 3 * (freq, wait, freq0, wait) + stop
        assert_eq!(steps.len(), 13);
        assert_eq!(freq_hz(&steps[0]), 1000.0);
        assert!(matches!(&steps[1], Step::Wait(w) if w.seconds == 5.0 && w.source_line == 2));
        assert_eq!(freq_hz(&steps[2]), 0.0);
        assert!(matches!(&steps[3], Step::Wait(w) if w.seconds == 1.0 && w.source_line == 4));
        assert_eq!(freq_hz(&steps[4]), 2000.0);
        assert_eq!(freq_hz(&steps[8]), 3000.0);
        assert!(matches!(&steps[12], Step::Stop(_)));
    }

    #[test]
    fn test_freq_list_without_pause() {
        let steps = parse_commands_str("freq,[10,20]\nwait,1\nfreq,500\n").unwrap();
        assert_eq!(steps.len(), 5);
        assert_eq!(freq_hz(&steps[2]), 20.0);
        assert_eq!(freq_hz(&steps[4]), 500.0);
    }

    #[test]
    fn test_freq_list_options_apply_to_each_element() {
        let steps = parse_commands_str(r#"freq,[1,2],{"channel":"1"}"#).unwrap();
        assert_eq!(steps.len(), 2);
        for s in &steps {
            match s {
                Step::Freq(f) => assert_eq!(f.options.get("channel"), Some(&json!("1"))),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_freq_list_rejects_non_numbers() {
        let err = parse_commands_str(r#"freq,[1000,"abc"]"#).unwrap_err();
        assert!(err.to_string().contains("is not a number"));
        let err = parse_commands_str("freq,[]").unwrap_err();
        assert!(err.to_string().contains("frequency list is empty"));
    }

    #[test]
    fn test_freq_requires_number() {
        let err = parse_commands_str("freq,loud").unwrap_err();
        assert!(err
            .to_string()
            .contains("freq expects a number (Hz) or list like [1000,2000]"));
    }

    #[test]
    fn test_invalid_options_report_line() {
        let err = parse_commands_str("wait,1\nfreq,10,{oops").unwrap_err();
        assert!(err.to_string().starts_with("Line 2: invalid JSON options"));
    }

    #[test]
    fn test_cycle_positional_waits() {
        let steps = parse_commands_str("cycle,[1000,2000,3000],5,10").unwrap();
        match &steps[0] {
            Step::Cycle(c) => {
                assert_eq!(c.items.len(), 3);
                assert_eq!(c.on_wait, 5.0);
                assert_eq!(c.off_wait, Some(10.0));
                assert_eq!(c.pause_hz, 0.0);
                assert!(!c.adaptive_voltage);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_cycle_key_values_and_ranges() {
        let text = r#"cycle,[30000,{"start":100,"end":200,"step":50},1000000],on=2,off=1,pause_hz=10,adaptive-voltage=yes,{"channel":"2"}"#;
        let steps = parse_commands_str(text).unwrap();
        match &steps[0] {
            Step::Cycle(c) => {
                assert_eq!(c.items.len(), 3);
                assert_eq!(c.point_count(), 5);
                assert!(matches!(c.items[1], CycleItem::Range(r) if r.step_hz == 50.0));
                assert_eq!(c.on_wait, 2.0);
                assert_eq!(c.off_wait, Some(1.0));
                assert_eq!(c.pause_hz, 10.0);
                assert!(c.adaptive_voltage);
                assert_eq!(c.options.get("channel"), Some(&json!("2")));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_cycle_bare_range_keys() {
        let steps = parse_commands_str("cycle;[{start:1,end:3}];1").unwrap();
        match &steps[0] {
            Step::Cycle(c) => assert_eq!(c.point_count(), 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_cycle_range_equal_bounds_collapses() {
        let steps = parse_commands_str(r#"cycle,[{"start":5,"end":5,"step":1}],1"#).unwrap();
        match &steps[0] {
            Step::Cycle(c) => assert_eq!(c.items, vec![CycleItem::Hz(5.0)]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_cycle_errors() {
        let err = parse_commands_str("cycle,1000").unwrap_err();
        assert!(err.to_string().contains("cycle expects a frequency list"));

        let err = parse_commands_str(r#"cycle,[{"start":1,"end":2,"step":0}]"#).unwrap_err();
        assert!(err.to_string().contains("step must not be 0"));

        let err = parse_commands_str(r#"cycle,[{"start":1,"stop":2}]"#).unwrap_err();
        assert!(err.to_string().contains("unknown field(s): stop"));

        let err = parse_commands_str(r#"cycle,[{"start":1}]"#).unwrap_err();
        assert!(err.to_string().contains("must contain 'start' and 'end'"));

        let err = parse_commands_str("cycle,[1,2],1,2,3").unwrap_err();
        assert!(err.to_string().contains("too many numeric args"));

        let err = parse_commands_str("cycle,[1,2],speed=3").unwrap_err();
        assert!(err.to_string().contains("unknown cycle parameter 'speed'"));

        let err = parse_commands_str("cycle,[true]").unwrap_err();
        assert!(err.to_string().contains("cycle element #1"));
    }

    #[test]
    fn test_mod_defaults() {
        let steps = parse_commands_str("mod").unwrap();
        match &steps[0] {
            Step::Mod(m) => {
                assert_eq!(m.start_hz, 1.0);
                assert_eq!(m.end_hz, 1_000_000.0);
                assert_eq!(m.time_s, 1.0);
                assert_eq!(m.update_ms, 50.0);
                assert_eq!(m.direction, Direction::RiseAndFall);
                assert!(!m.adaptive_voltage);
                assert!(m.repeat);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_mod_positional() {
        let steps = parse_commands_str("sweep,100,2000,3,rise,true,false,20").unwrap();
        match &steps[0] {
            Step::Mod(m) => {
                assert_eq!(m.start_hz, 100.0);
                assert_eq!(m.end_hz, 2000.0);
                assert_eq!(m.time_s, 3.0);
                assert_eq!(m.direction, Direction::Rise);
                assert!(m.adaptive_voltage);
                assert!(!m.repeat);
                assert_eq!(m.update_ms, 20.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_mod_key_values() {
        let steps = parse_commands_str(
            r#"mod,from=10,to=20,time_ms=500,interval=10,dir=down,repeat=no,{"channel":"1"}"#,
        )
        .unwrap();
        match &steps[0] {
            Step::Mod(m) => {
                assert_eq!(m.start_hz, 10.0);
                assert_eq!(m.end_hz, 20.0);
                assert_eq!(m.time_s, 0.5);
                assert_eq!(m.update_ms, 10.0);
                assert_eq!(m.direction, Direction::Fall);
                assert!(!m.repeat);
                assert_eq!(m.options.get("channel"), Some(&json!("1")));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_mod_validation() {
        let err = parse_commands_str("mod,-1,10").unwrap_err();
        assert!(err.to_string().contains("mod start/end must be >= 0"));

        let err = parse_commands_str("mod,1,10,0").unwrap_err();
        assert!(err.to_string().contains("mod time must be > 0"));

        let err = parse_commands_str("mod,update=0").unwrap_err();
        assert!(err.to_string().contains("update interval must be > 0"));

        let err = parse_commands_str("mod,1,2,3,rise,true,true,5,9").unwrap_err();
        assert!(err.to_string().contains("too many positional args"));

        let err = parse_commands_str("mod,direction=left").unwrap_err();
        assert!(err.to_string().contains("invalid direction 'left'"));

        let err = parse_commands_str("mod,repeat=maybe").unwrap_err();
        assert!(err.to_string().contains("invalid boolean 'maybe'"));

        let err = parse_commands_str("mod,color=red").unwrap_err();
        assert!(err.to_string().contains("unknown mod parameter 'color'"));
    }

    #[test]
    fn test_parse_file_missing() {
        let err = parse_commands_file("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, ControllerError::CommandFileNotFound(_)));
    }

    #[test]
    fn test_parse_file_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "freq,1000").unwrap();
        writeln!(file, "wait,1").unwrap();
        let steps = parse_commands_file(file.path()).unwrap();
        assert_eq!(steps.len(), 2);
    }

    #[test]
    fn test_parse_bool_aliases() {
        assert_eq!(parse_bool("Y"), Ok(true));
        assert_eq!(parse_bool("off"), Ok(false));
        assert!(parse_bool("2").is_err());
    }
}
