//! Error types for jds6600-controller
//!
//! Provides structured error types with suggestions for common serial issues.

use serde::Serialize;
use thiserror::Error;

/// Main error type for controller operations
#[derive(Error, Debug)]
pub enum ControllerError {
    /// Command file could not be parsed
    #[error("Line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Command file does not exist
    #[error("Command file not found: {0}")]
    CommandFileNotFound(String),

    /// No serial ports present on the system
    #[error("No serial ports found.")]
    NoPorts,

    /// A specific port did not answer like a JDS6600
    #[error("Port '{port}' is not accessible or not a JDS6600. Error: {error}")]
    PortNotUsable { port: String, error: String },

    /// Auto-detection exhausted every candidate
    #[error("Could not find JDS6600 on any port.\n{}", failures.join("\n"))]
    DeviceNotFound { failures: Vec<String> },

    /// Failure opening or talking to the serial port
    #[error("Serial error on {port}: {error}")]
    Serial { port: String, error: String },

    /// Device answered with something we did not expect
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A value is outside of what the device accepts
    #[error("Value out of range for {what}: {value} (allowed {min}..={max})")]
    OutOfRange {
        what: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Step option could not be applied
    #[error("Invalid option '{key}': {message}")]
    InvalidOption { key: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControllerError {
    /// Shorthand for a parse error at a 1-based line
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        ControllerError::Parse {
            line,
            message: message.into(),
        }
    }

    /// Process exit code the CLI reports for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            ControllerError::Parse { .. } | ControllerError::CommandFileNotFound(_) => 2,
            ControllerError::NoPorts
            | ControllerError::PortNotUsable { .. }
            | ControllerError::DeviceNotFound { .. }
            | ControllerError::Serial { .. }
            | ControllerError::Protocol(_) => 3,
            _ => 1,
        }
    }
}

impl From<serialport::Error> for ControllerError {
    fn from(err: serialport::Error) -> Self {
        ControllerError::Serial {
            port: String::new(),
            error: err.to_string(),
        }
    }
}

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, ControllerError>;

/// Serializable error info for machine-readable output
#[derive(Debug, Serialize, Clone)]
pub struct ErrorInfo {
    pub message: String,
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl From<&ControllerError> for ErrorInfo {
    fn from(err: &ControllerError) -> Self {
        let (error_type, suggestion, line) = match err {
            ControllerError::Parse { line, .. } => (
                "parse_error",
                Some("See commands.example.csv for the supported syntax".to_string()),
                Some(*line),
            ),
            ControllerError::CommandFileNotFound(_) => (
                "command_file_not_found",
                Some("Pass the file with --csv or place commands.csv next to the program".to_string()),
                None,
            ),
            ControllerError::NoPorts => (
                "no_ports",
                Some("Check the USB cable and the USB-to-serial driver".to_string()),
                None,
            ),
            ControllerError::PortNotUsable { port, error } => {
                ("port_not_usable", suggest_fix(port, error), None)
            }
            ControllerError::DeviceNotFound { failures } => (
                "device_not_found",
                failures
                    .iter()
                    .find_map(|f| suggest_fix(f, f))
                    .or_else(|| Some("Is the generator powered on and connected?".to_string())),
                None,
            ),
            ControllerError::Serial { port, error } => ("serial_error", suggest_fix(port, error), None),
            ControllerError::Protocol(_) => (
                "protocol_error",
                Some("Make sure the device on this port is a JDS6600".to_string()),
                None,
            ),
            ControllerError::OutOfRange { .. } => ("out_of_range", None, None),
            ControllerError::InvalidOption { .. } => (
                "invalid_option",
                Some(
                    "Supported options: channel, channels, ch1, ch2, waveform, amplitude, offset, dutycycle, phase"
                        .to_string(),
                ),
                None,
            ),
            ControllerError::Config(_) => (
                "config_error",
                Some("Check your jds6600-controller configuration file".to_string()),
                None,
            ),
            ControllerError::Io(_) => ("io_error", None, None),
        };

        ErrorInfo {
            message: err.to_string(),
            error_type: error_type.to_string(),
            suggestion,
            line,
        }
    }
}

/// Suggest fixes for common serial port error patterns
pub fn suggest_fix(port: &str, error: &str) -> Option<String> {
    let lower = error.to_lowercase();

    if lower.contains("permission denied") || lower.contains("access is denied") {
        if port.starts_with("/dev/") || cfg!(unix) {
            return Some(
                "Permission denied. Add your user to the 'dialout' group (sudo usermod -aG dialout $USER) and log in again."
                    .to_string(),
            );
        }
        return Some("Access denied. Close other programs using this COM port.".to_string());
    }

    if lower.contains("busy") || lower.contains("in use") {
        return Some("Port is busy. Close other programs using this serial port.".to_string());
    }

    if lower.contains("no such file") || lower.contains("not found") || lower.contains("cannot find") {
        if port.to_uppercase().starts_with("COM") {
            return Some(
                "COM port not found. Install the CH340 USB-to-serial driver (USB id 1a86:7523).".to_string(),
            );
        }
        return Some("Port not found. Check the cable or use --list-ports.".to_string());
    }

    if lower.contains("timed out") || lower.contains("timeout") {
        return Some("No answer from the device. Is this the right port and is the generator on?".to_string());
    }

    None
}
