//! Serial port discovery and JDS6600 auto-detection
//!
//! Detection order:
//! 1. An explicit port hint must answer, otherwise detection fails loudly
//! 2. Stable `/dev/serial/by-id/*` symlinks (Linux)
//! 3. All ports ranked by [`score_port`], skipping `/dev/ttyS*`
//! 4. `/dev/ttyS*` as a last resort

use std::path::Path;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serialport::SerialPortType;
use tracing::{debug, info};

use crate::device;
use crate::error::{ControllerError, Result};

/// Linux on-board UARTs, almost never the generator
static LINUX_TTYS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/dev/ttyS\d+$").unwrap());

const BY_ID_DIR: &str = "/dev/serial/by-id";

/// USB id of the CH340 bridge the JDS6600 ships with
pub const CH340_VID: u16 = 0x1a86;
pub const CH340_PID: u16 = 0x7523;

/// What the OS reports about a serial port
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PortInfo {
    pub device: String,
    pub description: String,
    pub hwid: String,
    pub manufacturer: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

impl PortInfo {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..Default::default()
        }
    }

    fn from_serialport(info: serialport::SerialPortInfo) -> Self {
        let mut port = PortInfo::new(info.port_name);
        match info.port_type {
            SerialPortType::UsbPort(usb) => {
                port.vid = Some(usb.vid);
                port.pid = Some(usb.pid);
                port.description = usb.product.unwrap_or_else(|| "USB Serial".to_string());
                port.manufacturer = usb.manufacturer.unwrap_or_default();
                port.hwid = match usb.serial_number {
                    Some(sn) => format!("USB VID:PID={:04X}:{:04X} SER={}", usb.vid, usb.pid, sn),
                    None => format!("USB VID:PID={:04X}:{:04X}", usb.vid, usb.pid),
                };
            }
            SerialPortType::BluetoothPort => {
                port.description = "Bluetooth serial".to_string();
                port.hwid = "BLUETOOTH".to_string();
            }
            SerialPortType::PciPort => {
                port.description = "PCI serial".to_string();
                port.hwid = "PCI".to_string();
            }
            SerialPortType::Unknown => {
                port.description = "n/a".to_string();
                port.hwid = "n/a".to_string();
            }
        }
        port
    }

    pub fn is_linux_ttys(&self) -> bool {
        LINUX_TTYS_RE.is_match(&self.device)
    }
}

/// Outcome of probing one port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub port: String,
    pub ok: bool,
    pub error: Option<String>,
}

impl ProbeResult {
    pub fn ok(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ok: true,
            error: None,
        }
    }

    pub fn failed(port: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ok: false,
            error: Some(error.into()),
        }
    }

    fn failure_line(&self) -> String {
        format!("{}: {}", self.port, self.error.as_deref().unwrap_or("unknown error"))
    }
}

/// List ports the OS knows about
///
/// # Errors
///
/// Returns an error if the OS enumeration itself fails.
pub fn list_serial_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports()?;
    Ok(ports.into_iter().map(PortInfo::from_serialport).collect())
}

/// Sorted symlinks under `/dev/serial/by-id`, empty when absent
pub fn list_linux_by_id_ports() -> Vec<String> {
    list_symlinks(Path::new(BY_ID_DIR))
}

fn list_symlinks(dir: &Path) -> Vec<String> {
    if !cfg!(unix) {
        return vec![];
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return vec![];
    };
    let mut out: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_symlink()).unwrap_or(false))
        .map(|e| e.path().to_string_lossy().into_owned())
        .collect();
    out.sort();
    out
}

/// Rank a port by how likely it is to be a USB generator
pub fn score_port(port: &PortInfo) -> i32 {
    score_port_for(port, cfg!(windows))
}

fn score_port_for(port: &PortInfo, windows: bool) -> i32 {
    let dev = port.device.to_lowercase();
    let desc = port.description.to_lowercase();
    let hwid = port.hwid.to_lowercase();
    let man = port.manufacturer.to_lowercase();

    let mut score = 0;

    let has_usb_id = port.vid.is_some() && port.pid.is_some();
    if has_usb_id {
        score += 120;
    }
    if port.vid == Some(CH340_VID) && port.pid == Some(CH340_PID) {
        score += 50;
    }
    if desc.contains("usb") || hwid.contains("usb") || man.contains("usb") {
        score += 80;
    }

    if dev.starts_with("/dev/ttyusb") || dev.starts_with("/dev/ttyacm") {
        score += 110;
    }
    if port.is_linux_ttys() {
        score -= 300;
    }

    if windows && port.vid.is_none() && port.pid.is_none() && dev.starts_with("com") {
        score -= 120;
    }

    if desc.contains("bluetooth") || hwid.contains("bluetooth") {
        score -= 200;
    }

    if matches!(desc.as_str(), "n/a" | "" | "unknown") {
        score -= 20;
    }

    score
}

/// Open `port` and read the channel register
pub fn probe_port(port: &str, baud_rate: u32, timeout: Duration) -> ProbeResult {
    match device::connect(port, baud_rate, timeout) {
        Ok(_) => ProbeResult::ok(port),
        Err(e) => {
            debug!(port, error = %e, "probe failed");
            ProbeResult::failed(port, e.to_string())
        }
    }
}

/// Find the first port with a JDS6600 on it
///
/// # Errors
///
/// - [`ControllerError::PortNotUsable`] when `hint` is given and fails
/// - [`ControllerError::NoPorts`] when nothing is attached
/// - [`ControllerError::DeviceNotFound`] listing every failed probe
pub fn find_first_jds6600(hint: Option<&str>, baud_rate: u32, timeout: Duration) -> Result<String> {
    let hint = hint.map(str::trim).filter(|h| !h.is_empty());
    let by_id = if hint.is_some() { vec![] } else { list_linux_by_id_ports() };
    let ports = if hint.is_some() { vec![] } else { list_serial_ports()? };
    find_first_with(hint, &by_id, &ports, |p| probe_port(p, baud_rate, timeout))
}

/// Detection with the port listings and the probe supplied by the caller
pub fn find_first_with<F>(
    hint: Option<&str>,
    by_id: &[String],
    ports: &[PortInfo],
    mut probe: F,
) -> Result<String>
where
    F: FnMut(&str) -> ProbeResult,
{
    if let Some(hint) = hint.filter(|h| !h.trim().is_empty()) {
        let res = probe(hint);
        if res.ok {
            return Ok(res.port);
        }
        return Err(ControllerError::PortNotUsable {
            port: hint.to_string(),
            error: res.error.unwrap_or_default(),
        });
    }

    let mut failures = Vec::new();

    for port in by_id {
        let res = probe(port);
        if res.ok {
            info!(port = %port, "found JDS6600 via by-id link");
            return Ok(res.port);
        }
        failures.push(res.failure_line());
    }

    if ports.is_empty() && by_id.is_empty() {
        return Err(ControllerError::NoPorts);
    }

    let mut ranked: Vec<&PortInfo> = ports.iter().collect();
    ranked.sort_by_key(|p| std::cmp::Reverse(score_port(p)));

    let (last_resort, preferred): (Vec<&PortInfo>, Vec<&PortInfo>) =
        ranked.into_iter().partition(|p| p.is_linux_ttys());

    for port in preferred.into_iter().chain(last_resort) {
        let res = probe(&port.device);
        if res.ok {
            info!(port = %port.device, "found JDS6600");
            return Ok(res.port);
        }
        failures.push(res.failure_line());
    }

    Err(ControllerError::DeviceNotFound { failures })
}
