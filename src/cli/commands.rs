//! CLI definition using clap

use clap::Parser;
use std::path::PathBuf;

use crate::runner::ChannelSelection;

/// Execute JDS6600 command files over a serial port.
///
/// Keys while running: P pause/resume, N next, Q quit, H help.
#[derive(Parser, Debug)]
#[command(name = "jds6600-controller")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// List serial ports and exit
    #[arg(long)]
    pub list_ports: bool,

    /// Serial port like COM3 or /dev/ttyUSB0. If omitted, auto-detect
    #[arg(short, long)]
    pub port: Option<String>,

    /// Command file. Default: commands.csv next to the executable
    #[arg(short = 'f', long = "csv", value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Default channel for steps without a `channel` option
    #[arg(long, value_name = "1|2|both", value_parser = parse_channel)]
    pub channel: Option<ChannelSelection>,

    /// Do not connect to the device; just print the steps
    #[arg(long)]
    pub dry_run: bool,

    /// Disable key controls
    #[arg(long)]
    pub no_interactive: bool,

    /// Replace every wait with this many seconds
    #[arg(long, value_name = "SECONDS", value_parser = parse_seconds)]
    pub wait_override: Option<f64>,

    /// Continue from the point where the last run of this file was stopped
    #[arg(long, conflicts_with = "dry_run")]
    pub resume: bool,

    /// Print the device state and exit
    #[arg(long, conflicts_with_all = ["dry_run", "resume"])]
    pub state: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Config file path (overrides default XDG paths)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

fn parse_channel(s: &str) -> Result<ChannelSelection, String> {
    s.parse()
}

fn parse_seconds(s: &str) -> Result<f64, String> {
    let v: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", s))?;
    if v.is_finite() && v >= 0.0 {
        Ok(v)
    } else {
        Err(format!("wait override must be >= 0, got {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["jds6600-controller"]);
        assert!(!cli.list_ports);
        assert!(cli.port.is_none());
        assert!(cli.csv.is_none());
        assert!(cli.channel.is_none());
        assert!(!cli.dry_run);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_run_flags() {
        let cli = Cli::parse_from([
            "jds6600-controller",
            "-p",
            "/dev/ttyUSB0",
            "-f",
            "seq.csv",
            "--channel",
            "2",
            "--wait-override",
            "0.5",
            "--no-interactive",
            "--resume",
        ]);
        assert_eq!(cli.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(cli.csv, Some(PathBuf::from("seq.csv")));
        assert_eq!(cli.channel, Some(ChannelSelection::Two));
        assert_eq!(cli.wait_override, Some(0.5));
        assert!(cli.no_interactive);
        assert!(cli.resume);
    }

    #[test]
    fn test_cli_channel_aliases() {
        let cli = Cli::parse_from(["jds6600-controller", "--channel", "both"]);
        assert_eq!(cli.channel, Some(ChannelSelection::Both));
        assert!(Cli::try_parse_from(["jds6600-controller", "--channel", "3"]).is_err());
    }

    #[test]
    fn test_cli_rejects_negative_wait() {
        assert!(Cli::try_parse_from(["jds6600-controller", "--wait-override", "-1"]).is_err());
        assert!(Cli::try_parse_from(["jds6600-controller", "--wait-override", "x"]).is_err());
    }

    #[test]
    fn test_cli_conflicts() {
        assert!(Cli::try_parse_from(["jds6600-controller", "--dry-run", "--resume"]).is_err());
        assert!(Cli::try_parse_from(["jds6600-controller", "--state", "--dry-run"]).is_err());
    }

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }
}
