//! Sequence execution
//!
//! [`run_sequence`] walks the steps of a command file and drives the
//! generator. It is synchronous and blocks for the duration of the run;
//! the front end talks to it through [`RunControl`] and [`RunObserver`].
//!
//! Passing no generator performs a dry run: every step is reported, nothing
//! is sent and no time is spent waiting.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info};

use super::adaptive::AdaptiveVoltage;
use super::apply::{apply_channel_settings, apply_freq_step, shape_settings, ChannelSelection};
use super::control::{seconds, sleep_with_control, RunControl, SleepOutcome, DEFAULT_TICK_INTERVAL};
use crate::commands::{
    effective_cycle_wait, estimate_remaining_wait_time_with, Checkpoint, CycleStep, Direction,
    FreqStep, Leg, ModStep, Phase, Step, StepOptions, WaitStep, Within,
};
use crate::device::{read_device_state, Channel, DeviceState, Generator};
use crate::error::Result;
use crate::format::fmt_seconds;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunOutcome {
    Completed,
    /// Stopped by the user; carries the last reported position
    Stopped(Checkpoint),
}

impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Completed => 0,
            RunOutcome::Stopped(_) => 4,
        }
    }
}

/// Position report sent at every step boundary
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    /// 0-based index of the step about to run
    pub index: usize,
    pub total: usize,
    /// Plain wait seconds after this step
    pub est_remaining_wait: f64,
    pub step: &'a Step,
}

impl Progress<'_> {
    pub fn remaining_steps(&self) -> usize {
        self.total.saturating_sub(self.index + 1)
    }
}

impl fmt::Display for Progress<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Progress: {}/{} | remaining steps: {} | est remaining wait time: {}",
            self.index + 1,
            self.total,
            self.remaining_steps(),
            fmt_seconds(self.est_remaining_wait)
        )
    }
}

/// Receives everything a run reports
///
/// All methods default to doing nothing.
pub trait RunObserver: Send {
    fn status(&mut self, _message: &str) {}
    fn progress(&mut self, _progress: &Progress<'_>) {}
    fn checkpoint(&mut self, _checkpoint: &Checkpoint) {}
    fn device_state(&mut self, _state: &DeviceState) {}
}

/// Observer that discards all reports
#[derive(Debug, Default)]
pub struct NullObserver;

impl RunObserver for NullObserver {}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Channels a step addresses when it has no `channel` option
    pub default_channel: ChannelSelection,
    /// Replaces every wait (and enabled cycle hold) when set
    pub fixed_wait: Option<f64>,
    pub tick_interval: Duration,
    /// Emit `waiting... Xs left` status lines during waits
    pub tick_wait_updates: bool,
    /// Read the device back after each freq/stop step
    pub report_device_state: bool,
    pub resume: Option<Checkpoint>,
    pub adaptive: AdaptiveVoltage,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            default_channel: ChannelSelection::Both,
            fixed_wait: None,
            tick_interval: DEFAULT_TICK_INTERVAL,
            tick_wait_updates: true,
            report_device_state: false,
            resume: None,
            adaptive: AdaptiveVoltage::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

impl From<SleepOutcome> for Flow {
    fn from(outcome: SleepOutcome) -> Self {
        match outcome {
            SleepOutcome::Stopped => Flow::Stop,
            _ => Flow::Continue,
        }
    }
}

/// Run `steps` on `generator` (or dry run when `None`)
///
/// # Errors
///
/// Device and option errors abort the run and are returned as is.
pub fn run_sequence<'a>(
    steps: &'a [Step],
    generator: Option<&'a mut dyn Generator>,
    options: &'a RunOptions,
    control: &'a RunControl,
    observer: &'a mut dyn RunObserver,
) -> Result<RunOutcome> {
    Sequencer {
        steps,
        generator,
        options,
        control,
        observer,
        last: Checkpoint::at(0),
    }
    .run()
}

struct Sequencer<'a> {
    steps: &'a [Step],
    generator: Option<&'a mut dyn Generator>,
    options: &'a RunOptions,
    control: &'a RunControl,
    observer: &'a mut dyn RunObserver,
    last: Checkpoint,
}

impl<'a> Sequencer<'a> {
    fn run(mut self) -> Result<RunOutcome> {
        let steps = self.steps;
        let total = steps.len();
        let resume = self.options.resume.filter(|ck| ck.step_index < total);
        let start = resume.map_or(0, |ck| ck.step_index);

        if resume.is_some() {
            info!(step = start + 1, total, "resuming run");
            self.status(&format!(
                "Resuming at step {}/{} (line {})",
                start + 1,
                total,
                steps[start].source_line()
            ));
            self.restore_output(start)?;
        }

        for (i, step) in steps.iter().enumerate().skip(start) {
            if self.control.is_stopped() {
                return Ok(self.stopped());
            }

            let est = estimate_remaining_wait_time_with(steps, i + 1, self.options.fixed_wait);
            self.observer.progress(&Progress {
                index: i,
                total,
                est_remaining_wait: est,
                step,
            });

            let within = resume
                .filter(|ck| ck.step_index == i)
                .and_then(|ck| ck.within);
            self.set_checkpoint(Checkpoint {
                step_index: i,
                within,
            });

            self.control.wait_while_paused();
            if self.control.is_stopped() {
                return Ok(self.stopped());
            }

            debug!(step = i + 1, kind = step.kind(), line = step.source_line(), "executing step");
            let flow = match step {
                Step::Freq(s) => self.run_freq(i, s, est)?,
                Step::Stop(_) => self.run_stop(i, step, est)?,
                Step::Wait(s) => self.run_wait(i, s, est, within),
                Step::Cycle(s) => self.run_cycle(i, step, s, est, within)?,
                Step::Mod(s) => self.run_mod(i, step, s, est, within)?,
            };
            if flow == Flow::Stop {
                return Ok(self.stopped());
            }
        }

        self.status("Done.");
        Ok(RunOutcome::Completed)
    }

    fn status(&mut self, message: &str) {
        self.observer.status(message);
    }

    fn header(&self, i: usize, what: &str, line: usize, est: f64) -> String {
        format!(
            "[{}/{}] {} (line {}) | remaining waits: {}",
            i + 1,
            self.steps.len(),
            what,
            line,
            fmt_seconds(est)
        )
    }

    fn set_checkpoint(&mut self, checkpoint: Checkpoint) {
        self.last = checkpoint;
        self.observer.checkpoint(&checkpoint);
    }

    fn stopped(&mut self) -> RunOutcome {
        self.status("Stopped.");
        RunOutcome::Stopped(self.last)
    }

    fn report_state(&mut self) {
        if !self.options.report_device_state {
            return;
        }
        if let Some(generator) = self.generator.as_deref_mut() {
            let state = read_device_state(generator);
            self.observer.device_state(&state);
        }
    }

    /// Re-apply the output state in effect before step `start`
    ///
    /// Everything after the last `stop` is replayed in file order: `freq`
    /// steps in full, `cycle` and `mod` steps with their shape settings.
    fn restore_output(&mut self, start: usize) -> Result<()> {
        if self.generator.is_none() {
            return Ok(());
        }
        let default = self.options.default_channel;
        let steps = self.steps;
        let before = &steps[..start];
        let last_stop = before.iter().rposition(|s| matches!(s, Step::Stop(_)));
        let from = last_stop.map_or(0, |p| p + 1);

        if last_stop.is_some() {
            if let Some(generator) = self.generator.as_deref_mut() {
                generator.set_channels(false, false)?;
            }
        }
        for step in &before[from..] {
            let options = match step {
                Step::Freq(freq) => {
                    debug!(line = freq.source_line, "replaying freq step");
                    if let Some(generator) = self.generator.as_deref_mut() {
                        apply_freq_step(generator, freq, default)?;
                    }
                    continue;
                }
                Step::Cycle(cycle) => &cycle.options,
                Step::Mod(sweep) => &sweep.options,
                Step::Wait(_) | Step::Stop(_) => continue,
            };
            debug!(line = step.source_line(), "replaying shape settings");
            let selection = ChannelSelection::from_value(options.get("channel"), default);
            self.configure(selection.channels(), options)?;
        }
        Ok(())
    }

    /// Sleep with checkpoints on every tick; no-op in a dry run
    fn hold(
        &mut self,
        step_index: usize,
        secs: f64,
        wait_status: bool,
        within: impl Fn(f64) -> Within,
    ) -> SleepOutcome {
        if self.generator.is_none() {
            return SleepOutcome::Elapsed;
        }
        let tick_status = wait_status && self.options.tick_wait_updates;
        let observer = &mut *self.observer;
        let last = &mut self.last;
        sleep_with_control(
            seconds(secs),
            self.control,
            self.options.tick_interval,
            |remaining| {
                let checkpoint = Checkpoint::within(step_index, within(remaining));
                *last = checkpoint;
                observer.checkpoint(&checkpoint);
                if tick_status {
                    observer.status(&format!("  waiting... {} left", fmt_seconds(remaining)));
                }
            },
        )
    }

    /// Apply the non-frequency settings of a cycle/mod step once
    fn configure(&mut self, channels: &[Channel], options: &StepOptions) -> Result<()> {
        let Some(generator) = self.generator.as_deref_mut() else {
            return Ok(());
        };
        let settings = shape_settings(options);
        for &channel in channels {
            apply_channel_settings(generator, channel, &settings)?;
        }
        Ok(())
    }

    fn set_point(&mut self, channels: &[Channel], hz: f64, adaptive: bool) -> Result<()> {
        let curve = &self.options.adaptive;
        let Some(generator) = self.generator.as_deref_mut() else {
            return Ok(());
        };
        for &channel in channels {
            generator.set_frequency(channel, hz)?;
            if adaptive {
                generator.set_amplitude(channel, curve.amplitude_for(hz))?;
            }
        }
        Ok(())
    }

    /// Stop check plus pause gate between sub-steps
    fn gate(&self) -> Flow {
        if self.control.is_stopped() {
            return Flow::Stop;
        }
        self.control.wait_while_paused();
        if self.control.is_stopped() {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    fn run_freq(&mut self, i: usize, step: &FreqStep, est: f64) -> Result<Flow> {
        let header = self.header(i, &format!("freq={} Hz", step.hz), step.source_line, est);
        self.status(&header);
        let default = self.options.default_channel;
        if let Some(generator) = self.generator.as_deref_mut() {
            apply_freq_step(generator, step, default)?;
            self.report_state();
        }
        Ok(Flow::Continue)
    }

    fn run_stop(&mut self, i: usize, step: &Step, est: f64) -> Result<Flow> {
        let header = self.header(i, "stop", step.source_line(), est);
        self.status(&header);
        if let Some(generator) = self.generator.as_deref_mut() {
            generator.set_channels(false, false)?;
            self.report_state();
        }
        Ok(Flow::Continue)
    }

    fn run_wait(&mut self, i: usize, step: &WaitStep, est: f64, within: Option<Within>) -> Flow {
        let mut secs = self.options.fixed_wait.unwrap_or(step.seconds).max(0.0);
        if let Some(Within::Wait { remaining }) = within {
            secs = secs.min(remaining.max(0.0));
        }
        // A skip requested before this wait cancels it entirely
        if self.control.take_skip() {
            secs = 0.0;
        }

        let header = self.header(i, &format!("wait {}s", secs), step.source_line, est);
        self.status(&header);

        let outcome = self.hold(i, secs, true, |remaining| Within::Wait { remaining });
        self.control.take_skip();
        outcome.into()
    }

    fn run_cycle(
        &mut self,
        i: usize,
        step: &Step,
        cycle: &CycleStep,
        est: f64,
        within: Option<Within>,
    ) -> Result<Flow> {
        let header = self.header(i, &step.to_string(), cycle.source_line, est);
        self.status(&header);
        if self.generator.is_none() {
            return Ok(Flow::Continue);
        }

        let selection =
            ChannelSelection::from_value(cycle.options.get("channel"), self.options.default_channel);
        let channels = selection.channels();
        self.configure(channels, &cycle.options)?;

        let fixed = self.options.fixed_wait;
        let on_s = effective_cycle_wait(Some(cycle.on_wait), fixed);
        let off_s = effective_cycle_wait(cycle.off_wait, fixed);
        let total_points = cycle.point_count();

        let (start_item, start_k, mut resumed) = match within {
            Some(Within::Cycle { item_i, sub_k, .. }) => (item_i, sub_k, None),
            Some(Within::CycleWait {
                item_i,
                sub_k,
                phase,
                remaining,
                ..
            }) => (item_i, sub_k, Some((phase, remaining.max(0.0)))),
            _ => (0, 0, None),
        };

        let mut prefix: u64 = cycle.items.iter().take(start_item).map(|it| it.count()).sum();

        for (item_i, item) in cycle.items.iter().enumerate().skip(start_item) {
            let sub_n = item.count();
            let first_k = if item_i == start_item { start_k.min(sub_n) } else { 0 };

            for sub_k in first_k..sub_n {
                if self.gate() == Flow::Stop {
                    return Ok(Flow::Stop);
                }
                let hz = item.nth_hz(sub_k);
                let resume_here = resumed.take();

                if !matches!(resume_here, Some((Phase::Off, _))) {
                    self.set_point(channels, hz, cycle.adaptive_voltage)?;
                    self.set_checkpoint(Checkpoint::within(
                        i,
                        Within::Cycle {
                            item_i,
                            sub_k,
                            sub_n,
                        },
                    ));
                    self.status(&format!(
                        "  cycle {}/{}: {} Hz",
                        prefix + sub_k + 1,
                        total_points,
                        hz
                    ));

                    let on = match resume_here {
                        Some((Phase::On, rem)) => rem.min(on_s),
                        _ => on_s,
                    };
                    if on > 0.0 {
                        let outcome = self.hold(i, on, false, |remaining| Within::CycleWait {
                            item_i,
                            sub_k,
                            sub_n,
                            phase: Phase::On,
                            remaining,
                        });
                        match outcome {
                            SleepOutcome::Stopped => return Ok(Flow::Stop),
                            SleepOutcome::Skipped => {
                                self.control.take_skip();
                            }
                            SleepOutcome::Elapsed => {}
                        }
                    }
                }

                if off_s > 0.0 {
                    let off = match resume_here {
                        Some((Phase::Off, rem)) => rem.min(off_s),
                        _ => off_s,
                    };
                    self.set_point(channels, cycle.pause_hz, false)?;
                    self.set_checkpoint(Checkpoint::within(
                        i,
                        Within::CycleWait {
                            item_i,
                            sub_k,
                            sub_n,
                            phase: Phase::Off,
                            remaining: off,
                        },
                    ));
                    let outcome = self.hold(i, off, false, |remaining| Within::CycleWait {
                        item_i,
                        sub_k,
                        sub_n,
                        phase: Phase::Off,
                        remaining,
                    });
                    match outcome {
                        SleepOutcome::Stopped => return Ok(Flow::Stop),
                        SleepOutcome::Skipped => {
                            self.control.take_skip();
                        }
                        SleepOutcome::Elapsed => {}
                    }
                }
            }
            prefix += sub_n;
            resumed = None;
        }
        Ok(Flow::Continue)
    }

    fn run_mod(
        &mut self,
        i: usize,
        step: &Step,
        sweep: &ModStep,
        est: f64,
        within: Option<Within>,
    ) -> Result<Flow> {
        let header = self.header(i, &step.to_string(), sweep.source_line, est);
        self.status(&header);
        if self.generator.is_none() {
            return Ok(Flow::Continue);
        }

        let selection =
            ChannelSelection::from_value(sweep.options.get("channel"), self.options.default_channel);
        let channels = selection.channels();
        self.configure(channels, &sweep.options)?;

        let updates = sweep.updates_per_leg();
        let interval = sweep.time_s / updates as f64;
        let legs: &[Leg] = match sweep.direction {
            Direction::Rise => &[Leg::Rise],
            Direction::Fall => &[Leg::Fall],
            Direction::RiseAndFall => &[Leg::Rise, Leg::Fall],
        };

        let (mut start_leg, mut start_k) = match within {
            Some(Within::Mod {
                leg,
                k,
                updates: saved,
            }) => {
                let leg_index = legs.iter().position(|l| *l == leg).unwrap_or(0);
                let k = if saved == 0 || saved == updates {
                    k
                } else {
                    (k as f64 * updates as f64 / saved as f64).round() as u64
                };
                (leg_index, k.min(updates))
            }
            _ => (0, 0),
        };

        let mut last_hz: Option<f64> = None;
        loop {
            for &leg in legs.iter().skip(start_leg) {
                let (from, to) = match leg {
                    Leg::Rise => (sweep.start_hz, sweep.end_hz),
                    Leg::Fall => (sweep.end_hz, sweep.start_hz),
                };
                for k in start_k..=updates {
                    if self.gate() == Flow::Stop {
                        return Ok(Flow::Stop);
                    }
                    let hz = from + (to - from) * k as f64 / updates as f64;
                    // The first point of a leg repeats the last point of the previous one
                    if !(k == 0 && last_hz == Some(hz)) {
                        self.set_point(channels, hz, sweep.adaptive_voltage)?;
                        last_hz = Some(hz);
                    }
                    self.set_checkpoint(Checkpoint::within(i, Within::Mod { leg, k, updates }));

                    if k < updates {
                        match self.hold(i, interval, false, |_| Within::Mod { leg, k, updates }) {
                            SleepOutcome::Stopped => return Ok(Flow::Stop),
                            SleepOutcome::Skipped => {
                                self.control.take_skip();
                                self.status("  mod skipped");
                                return Ok(Flow::Continue);
                            }
                            SleepOutcome::Elapsed => {}
                        }
                    }
                }
                start_k = 0;
            }
            start_leg = 0;
            if !sweep.repeat {
                break;
            }
        }
        Ok(Flow::Continue)
    }
}
