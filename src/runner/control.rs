//! Pause / stop / skip control shared between the runner and its front end

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Poll period of every wait loop
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default interval between wait progress ticks
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Upper bound for a single sleep (about 100 years)
const MAX_SLEEP: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// Seconds to a sleep duration; negative and NaN become zero
pub fn seconds(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        Duration::ZERO
    } else {
        Duration::try_from_secs_f64(secs).map_or(MAX_SLEEP, |d| d.min(MAX_SLEEP))
    }
}

/// Flags a running sequence watches
///
/// Shared as `Arc<RunControl>`; every method takes `&self`.
#[derive(Debug, Default)]
pub struct RunControl {
    paused: AtomicBool,
    stopped: AtomicBool,
    skip: AtomicBool,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Control that starts in the paused state
    #[cfg(test)]
    pub(crate) fn paused() -> Self {
        let control = Self::default();
        control.set_paused(true);
        control
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    /// Flip pause; returns the new state
    pub fn toggle_pause(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn request_stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Ask the runner to end the current (or next) hold early
    pub fn request_skip(&self) {
        self.skip.store(true, Ordering::SeqCst);
    }

    pub fn is_skip_requested(&self) -> bool {
        self.skip.load(Ordering::SeqCst)
    }

    /// Consume a pending skip request
    pub fn take_skip(&self) -> bool {
        self.skip.swap(false, Ordering::SeqCst)
    }

    /// Block while paused; returns early when stopped
    pub fn wait_while_paused(&self) {
        while self.is_paused() && !self.is_stopped() {
            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// How a controlled sleep ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    Elapsed,
    Stopped,
    Skipped,
}

/// Sleep for `duration` while honoring the control flags
///
/// - Pause freezes the countdown (the deadline moves with it)
/// - Stop and skip end the sleep early; a skip is left pending for the caller
/// - `on_tick` receives the remaining seconds every `tick_interval` and `0.0`
///   once the time is up
pub fn sleep_with_control(
    duration: Duration,
    control: &RunControl,
    tick_interval: Duration,
    mut on_tick: impl FnMut(f64),
) -> SleepOutcome {
    let mut deadline = Instant::now() + duration.min(MAX_SLEEP);
    let mut last_tick: Option<Instant> = None;

    loop {
        if control.is_stopped() {
            return SleepOutcome::Stopped;
        }
        if control.is_skip_requested() {
            return SleepOutcome::Skipped;
        }
        if control.is_paused() {
            thread::sleep(POLL_INTERVAL);
            deadline += POLL_INTERVAL;
            continue;
        }

        let now = Instant::now();
        let remaining = deadline.saturating_duration_since(now);
        if remaining.is_zero() {
            on_tick(0.0);
            return SleepOutcome::Elapsed;
        }
        if last_tick.map_or(true, |t| now.duration_since(t) >= tick_interval) {
            on_tick(remaining.as_secs_f64());
            last_tick = Some(now);
        }
        thread::sleep(remaining.min(POLL_INTERVAL));
    }
}
