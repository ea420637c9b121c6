//! Step types produced by the command file parser
//!
//! A command file is flattened into a list of [`Step`]s. Cycle ranges stay
//! lazy ([`CycleRange`]) so that `{"start":1,"end":1000000,"step":0.1}` does
//! not allocate ten million frequencies.

use std::fmt;

use serde_json::{Map, Value};

/// Free-form per-step options (`{"waveform":"sine","amplitude":2.5}`)
pub type StepOptions = Map<String, Value>;

/// Set one frequency (and optionally other channel settings)
#[derive(Debug, Clone, PartialEq)]
pub struct FreqStep {
    pub hz: f64,
    pub options: StepOptions,
    pub source_line: usize,
}

/// Hold the current output for a number of seconds
#[derive(Debug, Clone, PartialEq)]
pub struct WaitStep {
    pub seconds: f64,
    pub source_line: usize,
}

/// Switch both outputs off
#[derive(Debug, Clone, PartialEq)]
pub struct StopStep {
    pub source_line: usize,
}

/// Sweep direction of a modulation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// start -> end
    Rise,
    /// end -> start
    Fall,
    /// start -> end -> start
    RiseAndFall,
}

impl Direction {
    /// Parse a user supplied direction, accepting the usual aliases
    pub fn parse(s: &str) -> Result<Self, String> {
        let v = s.trim().to_lowercase().replace(['_', ' '], "-");
        match v.as_str() {
            "rise" | "up" | "inc" | "increase" => Ok(Direction::Rise),
            "fall" | "down" | "dec" | "decrease" => Ok(Direction::Fall),
            "rise-and-fall" | "rise-fall" | "up-down" | "up-and-down" | "riseandfall" => {
                Ok(Direction::RiseAndFall)
            }
            _ => Err(format!(
                "invalid direction '{}'. Use: rise, fall, rise-and-fall",
                s
            )),
        }
    }

    /// Number of sweep legs one pass consists of
    pub fn legs(&self) -> u32 {
        match self {
            Direction::RiseAndFall => 2,
            _ => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Rise => "rise",
            Direction::Fall => "fall",
            Direction::RiseAndFall => "rise-and-fall",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frequency modulation (sweep) step
#[derive(Debug, Clone, PartialEq)]
pub struct ModStep {
    pub start_hz: f64,
    pub end_hz: f64,
    /// Duration of one leg in seconds
    pub time_s: f64,
    /// Interval between frequency updates in milliseconds
    pub update_ms: f64,
    pub direction: Direction,
    pub adaptive_voltage: bool,
    /// Repeat until stopped or skipped
    pub repeat: bool,
    pub options: StepOptions,
    pub source_line: usize,
}

impl ModStep {
    /// Number of frequency updates per leg (at least one)
    pub fn updates_per_leg(&self) -> u64 {
        let n = (self.time_s * 1000.0 / self.update_ms).round();
        if n.is_finite() && n >= 1.0 {
            n as u64
        } else {
            1
        }
    }
}

/// Lazy inclusive frequency range used inside `cycle` lists
///
/// `step_hz` always points from `start_hz` towards `end_hz`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleRange {
    pub start_hz: f64,
    pub end_hz: f64,
    pub step_hz: f64,
}

impl CycleRange {
    /// Build a range, normalizing the sign of `step_hz` to match the span
    pub fn new(start_hz: f64, end_hz: f64, step_hz: f64) -> Self {
        let mut step = step_hz.abs();
        if end_hz < start_hz {
            step = -step;
        }
        Self {
            start_hz,
            end_hz,
            step_hz: step,
        }
    }

    /// Inclusive number of points, computed without materializing the range
    pub fn count(&self) -> u64 {
        if self.step_hz == 0.0 || !self.step_hz.is_finite() {
            return 0;
        }
        let span = self.end_hz - self.start_hz;
        if span == 0.0 {
            return 1;
        }
        let mut step = self.step_hz;
        if (span > 0.0 && step < 0.0) || (span < 0.0 && step > 0.0) {
            step = -step;
        }
        let n = (span / step + 1e-12).floor();
        if !n.is_finite() || n < 0.0 {
            return 0;
        }
        n as u64 + 1
    }

    /// Frequency of the k-th point (0-based)
    pub fn nth_hz(&self, k: u64) -> f64 {
        let span = self.end_hz - self.start_hz;
        let step = if span < 0.0 {
            -self.step_hz.abs()
        } else {
            self.step_hz.abs()
        };
        self.start_hz + step * k as f64
    }

    /// Iterate the frequencies of this range lazily
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.count()).map(move |k| self.nth_hz(k))
    }
}

/// One entry of a `cycle` list
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleItem {
    Hz(f64),
    Range(CycleRange),
}

impl CycleItem {
    /// Number of frequencies this item produces
    pub fn count(&self) -> u64 {
        match self {
            CycleItem::Hz(_) => 1,
            CycleItem::Range(r) => r.count(),
        }
    }

    /// Frequency of the k-th point of this item
    pub fn nth_hz(&self, k: u64) -> f64 {
        match self {
            CycleItem::Hz(hz) => *hz,
            CycleItem::Range(r) => r.nth_hz(k),
        }
    }
}

/// Step through a list of frequencies, holding each one
#[derive(Debug, Clone, PartialEq)]
pub struct CycleStep {
    pub items: Vec<CycleItem>,
    /// Seconds to hold each frequency
    pub on_wait: f64,
    /// Seconds to hold `pause_hz` between frequencies
    pub off_wait: Option<f64>,
    pub pause_hz: f64,
    pub adaptive_voltage: bool,
    pub options: StepOptions,
    pub source_line: usize,
}

impl CycleStep {
    /// Total number of frequencies in this cycle
    pub fn point_count(&self) -> u64 {
        cycle_items_count(&self.items)
    }
}

/// Count points in a [`CycleRange`] without materializing it
pub fn cycle_range_count(range: &CycleRange) -> u64 {
    range.count()
}

/// Count points in cycle items (numbers + ranges)
pub fn cycle_items_count(items: &[CycleItem]) -> u64 {
    items.iter().map(CycleItem::count).sum()
}

/// A single executable step
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Freq(FreqStep),
    Wait(WaitStep),
    Stop(StopStep),
    Cycle(CycleStep),
    Mod(ModStep),
}

impl Step {
    /// 1-based line of the command file this step came from
    pub fn source_line(&self) -> usize {
        match self {
            Step::Freq(s) => s.source_line,
            Step::Wait(s) => s.source_line,
            Step::Stop(s) => s.source_line,
            Step::Cycle(s) => s.source_line,
            Step::Mod(s) => s.source_line,
        }
    }

    /// Short command name
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Freq(_) => "freq",
            Step::Wait(_) => "wait",
            Step::Stop(_) => "stop",
            Step::Cycle(_) => "cycle",
            Step::Mod(_) => "mod",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Freq(s) => write!(f, "freq={} Hz", s.hz),
            Step::Wait(s) => write!(f, "wait {}s", s.seconds),
            Step::Stop(_) => write!(f, "stop"),
            Step::Cycle(s) => write!(
                f,
                "cycle {} freqs, on={}s, off={}",
                s.point_count(),
                s.on_wait,
                s.off_wait
                    .map(|w| format!("{}s", w))
                    .unwrap_or_else(|| "-".to_string())
            ),
            Step::Mod(s) => write!(
                f,
                "mod {}..{} Hz, {}s/leg, {}{}",
                s.start_hz,
                s.end_hz,
                s.time_s,
                s.direction,
                if s.repeat { ", repeat" } else { "" }
            ),
        }
    }
}
