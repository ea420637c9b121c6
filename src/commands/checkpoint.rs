//! Execution position inside a command list
//!
//! The runner reports a [`Checkpoint`] whenever its position changes. A
//! checkpoint is enough to resume a stopped run and to compute the exact
//! remaining run time.

use serde::{Deserialize, Serialize};

use super::estimate::{effective_cycle_wait, estimate_remaining_run_time, estimate_step_duration};
use super::model::{Direction, Step};

/// Sweep leg of a `mod` step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Leg {
    /// start -> end
    Rise,
    /// end -> start
    Fall,
}

/// Hold phase of a cycle point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Holding the point frequency
    On,
    /// Holding the pause frequency
    Off,
}

/// Position inside the current step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Within {
    Wait {
        remaining: f64,
    },
    Mod {
        leg: Leg,
        k: u64,
        updates: u64,
    },
    /// Point `sub_k` of item `item_i` was just set
    Cycle {
        item_i: usize,
        sub_k: u64,
        sub_n: u64,
    },
    CycleWait {
        item_i: usize,
        sub_k: u64,
        sub_n: u64,
        phase: Phase,
        remaining: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub step_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub within: Option<Within>,
}

impl Checkpoint {
    /// Checkpoint at the start of a step
    pub fn at(step_index: usize) -> Self {
        Self {
            step_index,
            within: None,
        }
    }

    pub fn within(step_index: usize, within: Within) -> Self {
        Self {
            step_index,
            within: Some(within),
        }
    }
}

/// Remaining run time in seconds from a checkpoint, including the rest of
/// the current step
///
/// Returns `f64::INFINITY` when a repeating `mod` is still ahead.
pub fn estimate_remaining_from_checkpoint(
    steps: &[Step],
    checkpoint: &Checkpoint,
    fixed_wait: Option<f64>,
) -> f64 {
    let index = checkpoint.step_index;
    let Some(step) = steps.get(index) else {
        return 0.0;
    };

    let tail = estimate_remaining_run_time(steps, index + 1, fixed_wait);
    let current = remaining_in_step(step, checkpoint.within.as_ref(), fixed_wait);

    if tail.is_infinite() || current.is_infinite() {
        f64::INFINITY
    } else {
        tail + current
    }
}

fn remaining_in_step(step: &Step, within: Option<&Within>, fixed_wait: Option<f64>) -> f64 {
    match (step, within) {
        (Step::Wait(_), Some(Within::Wait { remaining })) => remaining.max(0.0),

        (Step::Mod(m), _) if m.repeat => f64::INFINITY,
        (Step::Mod(m), Some(Within::Mod { leg, k, updates })) => {
            let leg_s = m.time_s.max(0.0);
            let updates = (*updates).max(1);
            let frac = (*k as f64 / updates as f64).clamp(0.0, 1.0);
            let rem_leg = leg_s * (1.0 - frac);
            if m.direction == Direction::RiseAndFall && *leg == Leg::Rise {
                rem_leg + leg_s
            } else {
                rem_leg
            }
        }

        (Step::Cycle(c), Some(w)) => {
            let (item_i, sub_k, sub_n, phase) = match *w {
                Within::Cycle {
                    item_i,
                    sub_k,
                    sub_n,
                } => (item_i, sub_k, sub_n, None),
                Within::CycleWait {
                    item_i,
                    sub_k,
                    sub_n,
                    phase,
                    remaining,
                } => (item_i, sub_k, sub_n, Some((phase, remaining.max(0.0)))),
                _ => return estimate_step_duration(step, fixed_wait),
            };

            let on_s = effective_cycle_wait(Some(c.on_wait), fixed_wait);
            let off_s = effective_cycle_wait(c.off_wait, fixed_wait);
            let per_point = on_s + off_s;

            let Some(current) = c.items.get(item_i) else {
                return 0.0;
            };
            let total_n = if sub_n > 0 { sub_n } else { current.count() };
            let mut points_left = total_n.saturating_sub(sub_k);
            points_left += c.items[item_i + 1..]
                .iter()
                .map(|it| it.count())
                .sum::<u64>();

            let current_point = match phase {
                Some((Phase::On, rem)) => rem + off_s,
                Some((Phase::Off, rem)) => rem,
                None => per_point,
            };

            current_point + points_left.saturating_sub(1) as f64 * per_point
        }

        _ => estimate_step_duration(step, fixed_wait),
    }
}
