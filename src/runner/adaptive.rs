//! Frequency dependent output amplitude
//!
//! Used by `cycle` and `mod` steps with `adaptive-voltage` enabled. The
//! amplitude is interpolated linearly over `log10(hz)` between configured
//! points and held flat outside of them.

use serde::{Deserialize, Serialize};

use crate::device::protocol::MAX_AMPLITUDE_V;
use crate::error::{ControllerError, Result};

/// One `(frequency, amplitude)` point of the curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoltagePoint {
    pub hz: f64,
    pub volts: f64,
}

impl VoltagePoint {
    pub const fn new(hz: f64, volts: f64) -> Self {
        Self { hz, volts }
    }
}

/// Built-in curve
pub const DEFAULT_POINTS: [VoltagePoint; 4] = [
    VoltagePoint::new(1.0, 2.0),
    VoltagePoint::new(1_000.0, 5.0),
    VoltagePoint::new(100_000.0, 10.0),
    VoltagePoint::new(1_000_000.0, 20.0),
];

#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveVoltage {
    points: Vec<VoltagePoint>,
}

impl Default for AdaptiveVoltage {
    fn default() -> Self {
        Self {
            points: DEFAULT_POINTS.to_vec(),
        }
    }
}

impl AdaptiveVoltage {
    /// Build a curve; points are sorted by frequency
    ///
    /// # Errors
    ///
    /// Fails on an empty list or a point with a non-positive frequency.
    pub fn new(mut points: Vec<VoltagePoint>) -> Result<Self> {
        if points.is_empty() {
            return Err(ControllerError::Config(
                "adaptive_voltage.points must not be empty".to_string(),
            ));
        }
        if let Some(bad) = points
            .iter()
            .find(|p| !(p.hz.is_finite() && p.hz > 0.0 && p.volts.is_finite()))
        {
            return Err(ControllerError::Config(format!(
                "adaptive_voltage point {{hz = {}, volts = {}}} is invalid; hz must be > 0",
                bad.hz, bad.volts
            )));
        }
        points.sort_by(|a, b| a.hz.total_cmp(&b.hz));
        Ok(Self { points })
    }

    pub fn points(&self) -> &[VoltagePoint] {
        &self.points
    }

    /// Amplitude in volts for `hz`, clamped to what the device accepts
    pub fn amplitude_for(&self, hz: f64) -> f64 {
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];

        let volts = if !(hz > first.hz) {
            first.volts
        } else if hz >= last.hz {
            last.volts
        } else {
            let x = hz.log10();
            self.points
                .windows(2)
                .find(|w| hz <= w[1].hz)
                .map(|w| {
                    let (x0, x1) = (w[0].hz.log10(), w[1].hz.log10());
                    if x1 == x0 {
                        w[1].volts
                    } else {
                        w[0].volts + (w[1].volts - w[0].volts) * (x - x0) / (x1 - x0)
                    }
                })
                .unwrap_or(last.volts)
        };

        volts.clamp(0.0, MAX_AMPLITUDE_V)
    }
}
