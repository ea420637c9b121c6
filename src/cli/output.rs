//! Terminal output
//!
//! In raw mode the terminal does not translate `\n`, so every line is
//! written with an explicit `\r\n`.

use std::io::{self, Write};

use colored::Colorize;

use crate::commands::Checkpoint;
use crate::device::DeviceState;
use crate::ports::PortInfo;
use crate::runner::{Progress, RunObserver};

#[derive(Debug, Clone, Copy, Default)]
pub struct Console {
    raw: bool,
}

impl Console {
    pub fn new(raw: bool) -> Self {
        Self { raw }
    }

    pub fn line(&self, text: &str) {
        let mut out = io::stdout().lock();
        let result = if self.raw {
            write!(out, "{}\r\n", text.replace('\n', "\r\n"))
        } else {
            writeln!(out, "{}", text)
        };
        // stdout going away (closed pipe) must not abort a run
        let _ = result.and_then(|_| out.flush());
    }
}

/// Prints everything a run reports
#[derive(Debug)]
pub struct ConsoleObserver {
    console: Console,
    last_checkpoint: Option<Checkpoint>,
}

impl ConsoleObserver {
    pub fn new(console: Console) -> Self {
        Self {
            console,
            last_checkpoint: None,
        }
    }

    pub fn last_checkpoint(&self) -> Option<Checkpoint> {
        self.last_checkpoint
    }
}

impl RunObserver for ConsoleObserver {
    fn status(&mut self, message: &str) {
        match message {
            "Done." => self.console.line(&message.green().to_string()),
            "Stopped." => self.console.line(&message.yellow().to_string()),
            _ => self.console.line(message),
        }
    }

    fn progress(&mut self, progress: &Progress<'_>) {
        self.console.line(&progress.to_string());
    }

    fn checkpoint(&mut self, checkpoint: &Checkpoint) {
        self.last_checkpoint = Some(*checkpoint);
    }

    fn device_state(&mut self, state: &DeviceState) {
        self.console.line(&format!("{}: {}", "Device".cyan(), state));
    }
}

/// Lines printed by `--list-ports`
pub fn port_list_lines(ports: &[PortInfo], by_id: &[String]) -> Vec<String> {
    let mut lines = Vec::new();

    if !by_id.is_empty() {
        lines.push("Recommended (stable) ports (/dev/serial/by-id):".to_string());
        lines.extend(by_id.iter().map(|p| format!(" * {}", p)));
        lines.push(String::new());
    }

    lines.push("All detected serial ports:".to_string());
    for port in ports {
        let mut extra = Vec::new();
        if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            extra.push(format!("VID:PID={:04x}:{:04x}", vid, pid));
        }
        if !port.manufacturer.is_empty() {
            extra.push(port.manufacturer.clone());
        }
        if !port.hwid.is_empty() && !port.hwid.to_uppercase().contains("VID") {
            extra.push(port.hwid.clone());
        }
        let extras = if extra.is_empty() {
            String::new()
        } else {
            format!(" | {}", extra.join(", "))
        };
        lines.push(format!(" - {} ({}){}", port.device, port.description, extras));
    }

    lines
}
