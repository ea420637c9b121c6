//! Run time estimation
//!
//! All functions return seconds. Unbounded steps (repeating `mod`) yield
//! `f64::INFINITY`.

use super::model::Step;

/// Effective hold time of a cycle wait with an optional fixed override
///
/// Waits that are disabled (`<= 0`) stay disabled under an override.
pub fn effective_cycle_wait(wait: Option<f64>, fixed_wait: Option<f64>) -> f64 {
    match wait {
        Some(w) if w > 0.0 => fixed_wait.unwrap_or(w).max(0.0),
        _ => 0.0,
    }
}

/// Sum of plain `wait` seconds from `start_index` onward
pub fn estimate_remaining_wait_time(steps: &[Step], start_index: usize) -> f64 {
    steps
        .iter()
        .skip(start_index)
        .filter_map(|s| match s {
            Step::Wait(w) => Some(w.seconds),
            _ => None,
        })
        .sum()
}

/// Remaining plain wait time when every wait is replaced by `fixed_wait`
pub fn estimate_remaining_wait_time_with(
    steps: &[Step],
    start_index: usize,
    fixed_wait: Option<f64>,
) -> f64 {
    match fixed_wait {
        None => estimate_remaining_wait_time(steps, start_index),
        Some(fixed) => {
            let count = steps
                .iter()
                .skip(start_index)
                .filter(|s| matches!(s, Step::Wait(_)))
                .count();
            count as f64 * fixed
        }
    }
}

/// Estimated duration of a single step
///
/// - freq/stop: 0
/// - wait: wait seconds (or `fixed_wait`)
/// - cycle: `points * (on + off)`, waits replaced by `fixed_wait` when enabled
/// - mod: infinite when repeating, else `time * legs`
pub fn estimate_step_duration(step: &Step, fixed_wait: Option<f64>) -> f64 {
    match step {
        Step::Wait(w) => fixed_wait.unwrap_or(w.seconds).max(0.0),
        Step::Cycle(c) => {
            let count = c.point_count();
            if count == 0 {
                return 0.0;
            }
            let on = effective_cycle_wait(Some(c.on_wait), fixed_wait);
            let off = effective_cycle_wait(c.off_wait, fixed_wait);
            count as f64 * (on + off)
        }
        Step::Mod(m) => {
            if m.repeat {
                f64::INFINITY
            } else {
                (m.time_s * f64::from(m.direction.legs())).max(0.0)
            }
        }
        Step::Freq(_) | Step::Stop(_) => 0.0,
    }
}

/// Estimated remaining run time from `start_index` (inclusive)
pub fn estimate_remaining_run_time(steps: &[Step], start_index: usize, fixed_wait: Option<f64>) -> f64 {
    let mut total = 0.0;
    for step in steps.iter().skip(start_index) {
        let d = estimate_step_duration(step, fixed_wait);
        if d.is_infinite() {
            return f64::INFINITY;
        }
        total += d;
    }
    total
}
