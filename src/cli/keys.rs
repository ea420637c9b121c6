//! Interactive key controls
//!
//! Keys are read with crossterm in raw mode so single presses arrive
//! without Enter. Raw mode also swallows Ctrl-C, so it is mapped to quit.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::debug;

use super::output::Console;
use crate::runner::control::POLL_INTERVAL;
use crate::runner::RunControl;

pub const HELP_LINE: &str = "Keys: P=pause/resume, N=next, Q=quit, H=help";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    TogglePause,
    /// End the current wait or hold
    Next,
    Quit,
    Help,
}

impl KeyAction {
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'p' | ' ' => Some(KeyAction::TogglePause),
            'n' => Some(KeyAction::Next),
            'q' => Some(KeyAction::Quit),
            'h' | '?' => Some(KeyAction::Help),
            _ => None,
        }
    }

    /// Apply to `control`; returns the line to show
    pub fn apply(self, control: &RunControl) -> &'static str {
        match self {
            KeyAction::TogglePause => {
                if control.toggle_pause() {
                    "== PAUSED =="
                } else {
                    "== RESUMED =="
                }
            }
            KeyAction::Next => {
                control.request_skip();
                "== NEXT =="
            }
            KeyAction::Quit => {
                control.request_stop();
                "== STOP REQUESTED =="
            }
            KeyAction::Help => HELP_LINE,
        }
    }
}

fn action_for(key: &KeyEvent) -> Option<KeyAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(KeyAction::Quit)
        }
        KeyCode::Char(c) => KeyAction::from_char(c),
        _ => None,
    }
}

/// Terminal raw mode, restored on drop
#[derive(Debug)]
pub struct RawModeGuard(());

impl RawModeGuard {
    pub fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self(()))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            debug!("Failed to restore terminal mode: {}", e);
        }
    }
}

/// Poll keys until `done` is set
///
/// Blocks; run it on a blocking task.
pub fn read_keys(control: &RunControl, done: &AtomicBool, console: Console) -> io::Result<()> {
    while !done.load(Ordering::SeqCst) {
        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if let Some(action) = action_for(&key) {
                debug!(?action, "key pressed");
                console.line(action.apply(control));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_char_mapping() {
        assert_eq!(KeyAction::from_char('P'), Some(KeyAction::TogglePause));
        assert_eq!(KeyAction::from_char('n'), Some(KeyAction::Next));
        assert_eq!(KeyAction::from_char('Q'), Some(KeyAction::Quit));
        assert_eq!(KeyAction::from_char('h'), Some(KeyAction::Help));
        assert_eq!(KeyAction::from_char('x'), None);
    }

    #[test]
    fn test_ctrl_c_quits() {
        let key = press(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(action_for(&key), Some(KeyAction::Quit));
        assert_eq!(action_for(&press(KeyCode::Char('c'), KeyModifiers::NONE)), None);
    }

    #[test]
    fn test_release_ignored() {
        let mut key = press(KeyCode::Char('p'), KeyModifiers::NONE);
        key.kind = KeyEventKind::Release;
        assert_eq!(action_for(&key), None);
    }

    #[test]
    fn test_actions_drive_control() {
        let control = RunControl::new();

        assert_eq!(KeyAction::TogglePause.apply(&control), "== PAUSED ==");
        assert!(control.is_paused());
        assert_eq!(KeyAction::TogglePause.apply(&control), "== RESUMED ==");
        assert!(!control.is_paused());

        KeyAction::Next.apply(&control);
        assert!(control.take_skip());

        assert_eq!(KeyAction::Quit.apply(&control), "== STOP REQUESTED ==");
        assert!(control.is_stopped());
        assert_eq!(KeyAction::Help.apply(&control), HELP_LINE);
    }
}
