//! jds6600-controller CLI entry point
//!
//! Usage:
//!   jds6600-controller                        Run commands.csv next to the executable
//!   jds6600-controller -f seq.csv -p COM3     Run a command file on a given port
//!   jds6600-controller -f seq.csv --dry-run   Print the steps without a device
//!   jds6600-controller -f seq.csv --resume    Continue a stopped run
//!   jds6600-controller --list-ports           List serial ports
//!   jds6600-controller --state                Print the device state

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use jds6600_controller::cli::{
    port_list_lines, read_keys, Cli, Console, ConsoleObserver, RawModeGuard, HELP_LINE,
};
use jds6600_controller::commands::{
    estimate_remaining_from_checkpoint, estimate_remaining_run_time, parse_commands_file,
};
use jds6600_controller::config::{load_config, Config};
use jds6600_controller::device::{self, read_device_state, Generator, Jds6600, SerialTransport};
use jds6600_controller::error::{ControllerError, ErrorInfo};
use jds6600_controller::format::fmt_hhmmss;
use jds6600_controller::logging::init_logging;
use jds6600_controller::ports::{
    find_first_jds6600, list_linux_by_id_ports, list_serial_ports, probe_port,
};
use jds6600_controller::runner::{run_sequence, RunControl, RunOptions, RunOutcome};
use jds6600_controller::state::{file_sha256, ResumeStore, SettingsStore};

const EXIT_NO_PORTS: u8 = 1;
const EXIT_CSV: u8 = 2;

/// Command file looked up when none is configured
const DEFAULT_COMMANDS_FILE: &str = "commands.csv";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            let code = match e.downcast_ref::<ControllerError>() {
                Some(err) => {
                    if let Some(hint) = ErrorInfo::from(err).suggestion {
                        eprintln!("{}: {}", "hint".yellow(), hint);
                    }
                    err.exit_code()
                }
                None => 1,
            };
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let config = load_config(cli.config.as_deref())?;
    init_logging(cli.verbose, &config.log)?;
    debug!(?config, "configuration loaded");

    if cli.list_ports {
        return list_ports();
    }

    let settings = SettingsStore::at(config.state.settings_path());

    if cli.state {
        let generator = open_generator(&cli, &config, &settings).await?;
        let port = generator.port().to_string();
        let state = tokio::task::spawn_blocking(move || {
            let mut generator = generator;
            read_device_state(&mut generator)
        })
        .await
        .context("device state task failed")?;
        println!("{}: {}", "Port".cyan(), port);
        println!("{}", state);
        return Ok(0);
    }

    let path = commands_file(&cli, &config);
    let steps = match parse_commands_file(&path) {
        Ok(steps) => steps,
        Err(e) => {
            eprintln!("{}: {}", "CSV error".red().bold(), e);
            return Ok(EXIT_CSV);
        }
    };
    info!(file = %path.display(), steps = steps.len(), "command file loaded");

    let resume_store = ResumeStore::new(settings.clone());
    let resume = if cli.resume {
        match resume_store.load_for_file(&path) {
            Some(saved) => Some(saved.checkpoint),
            None => {
                println!(
                    "{}",
                    "No resume point saved for this file; starting from the beginning.".yellow()
                );
                None
            }
        }
    } else {
        None
    };

    let fixed_wait = cli.wait_override.or(config.run.wait_override);
    let options = RunOptions {
        default_channel: match cli.channel {
            Some(channel) => channel,
            None => config.run.channel_selection()?,
        },
        fixed_wait,
        tick_interval: config.run.tick_interval(),
        tick_wait_updates: true,
        report_device_state: config.run.report_device_state,
        resume,
        adaptive: config.adaptive_voltage.curve()?,
    };

    let estimate = match &resume {
        Some(checkpoint) => estimate_remaining_from_checkpoint(&steps, checkpoint, fixed_wait),
        None => estimate_remaining_run_time(&steps, 0, fixed_wait),
    };
    println!(
        "{}: {} ({} steps)",
        "Estimated run time".cyan(),
        fmt_hhmmss(estimate),
        steps.len()
    );

    let generator = if cli.dry_run {
        None
    } else {
        let generator = open_generator(&cli, &config, &settings).await?;
        if let Err(e) = settings.remember_run(generator.port(), &path) {
            warn!("Could not save settings: {}", e);
        }
        Some(generator)
    };
    let executed_sha = file_sha256(&path).ok();

    let raw_mode = if !cli.no_interactive && std::io::stdin().is_terminal() {
        match RawModeGuard::enable() {
            Ok(guard) => Some(guard),
            Err(e) => {
                warn!("Key controls unavailable: {}", e);
                None
            }
        }
    } else {
        None
    };
    let console = Console::new(raw_mode.is_some());
    if raw_mode.is_some() {
        console.line(HELP_LINE);
    }

    let control = Arc::new(RunControl::new());
    let done = Arc::new(AtomicBool::new(false));

    let keys = raw_mode.as_ref().map(|_| {
        let control = Arc::clone(&control);
        let done = Arc::clone(&done);
        tokio::task::spawn_blocking(move || read_keys(&control, &done, console))
    });

    let ctrl_c = {
        let control = Arc::clone(&control);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                control.request_stop();
                console.line("== STOP REQUESTED ==");
            }
        })
    };

    let run_control = Arc::clone(&control);
    let (result, last_checkpoint) = tokio::task::spawn_blocking(move || {
        let mut generator = generator;
        let mut observer = ConsoleObserver::new(console);
        let result = run_sequence(
            &steps,
            generator.as_mut().map(|g| g as &mut dyn Generator),
            &options,
            &run_control,
            &mut observer,
        );
        (result, observer.last_checkpoint())
    })
    .await
    .context("sequence task failed")?;

    done.store(true, Ordering::SeqCst);
    if let Some(keys) = keys {
        match keys.await {
            Ok(Err(e)) => warn!("Key reader failed: {}", e),
            Err(e) => warn!("Key reader task failed: {}", e),
            Ok(Ok(())) => {}
        }
    }
    ctrl_c.abort();
    drop(raw_mode);

    match result {
        Ok(RunOutcome::Completed) => {
            if !cli.dry_run {
                if let Err(e) = resume_store.clear() {
                    warn!("Could not clear resume point: {}", e);
                }
            }
            Ok(RunOutcome::Completed.exit_code())
        }
        Ok(outcome @ RunOutcome::Stopped(checkpoint)) => {
            if !cli.dry_run {
                save_resume_point(&resume_store, &path, &checkpoint, executed_sha.as_deref());
            }
            Ok(outcome.exit_code())
        }
        Err(e) => {
            if let Some(checkpoint) = last_checkpoint.filter(|_| !cli.dry_run) {
                save_resume_point(&resume_store, &path, &checkpoint, executed_sha.as_deref());
            }
            Err(e.into())
        }
    }
}

/// `--list-ports`
fn list_ports() -> Result<u8> {
    let ports = list_serial_ports()?;
    if ports.is_empty() {
        println!("No serial ports found.");
        return Ok(EXIT_NO_PORTS);
    }
    for line in port_list_lines(&ports, &list_linux_by_id_ports()) {
        println!("{}", line);
    }
    Ok(0)
}

/// Find the generator and open it
///
/// Without an explicit port the last port a device was found on is tried
/// before full auto-detection.
async fn open_generator(
    cli: &Cli,
    config: &Config,
    settings: &SettingsStore,
) -> Result<Jds6600<SerialTransport>> {
    let hint = cli.port.clone().or_else(|| config.serial.port.clone());
    let remembered = if hint.is_none() {
        settings.last_port()
    } else {
        None
    };
    let baud_rate = config.serial.baud_rate;
    let timeout = config.serial.timeout();

    let spinner = spinner(match &hint {
        Some(port) => format!("Connecting to {}...", port),
        None => "Searching for JDS6600...".to_string(),
    });

    let opened = tokio::task::spawn_blocking(move || {
        let port = match remembered {
            Some(port) if probe_port(&port, baud_rate, timeout).ok => port,
            _ => find_first_jds6600(hint.as_deref(), baud_rate, timeout)?,
        };
        device::connect(&port, baud_rate, timeout)
    })
    .await
    .context("port detection task failed");
    spinner.finish_and_clear();

    let generator = opened??;
    println!("{}: {}", "Connected".green(), generator.port());
    Ok(generator)
}

fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn save_resume_point(
    store: &ResumeStore,
    path: &Path,
    checkpoint: &jds6600_controller::Checkpoint,
    executed_sha: Option<&str>,
) {
    match store.persist(path, checkpoint, executed_sha) {
        Ok(true) => println!(
            "Resume point saved at step {}. Continue with --resume.",
            checkpoint.step_index + 1
        ),
        Ok(false) => {}
        Err(e) => warn!("Could not save resume point: {}", e),
    }
}

/// `--csv`, then `run.commands_file`, then the default file
fn commands_file(cli: &Cli, config: &Config) -> PathBuf {
    cli.csv
        .clone()
        .or_else(|| config.run.commands_file_path())
        .unwrap_or_else(default_commands_file)
}

/// `commands.csv` next to the executable if present, else in the working
/// directory
fn default_commands_file() -> PathBuf {
    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_COMMANDS_FILE)));
    match beside_exe {
        Some(path) if path.exists() => path,
        _ => PathBuf::from(DEFAULT_COMMANDS_FILE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_commands_file_name() {
        let path = default_commands_file();
        assert_eq!(path.file_name().unwrap(), DEFAULT_COMMANDS_FILE);
    }

    #[test]
    fn test_commands_file_precedence() {
        let mut config = Config::default();
        config.run.commands_file = Some("/tmp/configured.csv".to_string());

        let cli = Cli::parse_from(["jds6600-controller", "-f", "given.csv"]);
        assert_eq!(commands_file(&cli, &config), PathBuf::from("given.csv"));

        let cli = Cli::parse_from(["jds6600-controller"]);
        assert_eq!(
            commands_file(&cli, &config),
            PathBuf::from("/tmp/configured.csv")
        );

        assert_eq!(
            commands_file(&cli, &Config::default()).file_name().unwrap(),
            DEFAULT_COMMANDS_FILE
        );
    }
}
