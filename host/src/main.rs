use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Local;
use clap::{Parser, Subcommand};
use log::{error, info, warn};

use simtrack_common::at::engine::AtEngine;
use simtrack_common::sim868::sms::SmsMessage;
use simtrack_common::tracker::Tracker;
use simtrack_host::config::HostConfig;
use simtrack_host::sensor::{self, THERMAL_ZONE};
use simtrack_host::serial::{SerialPowerPin, SerialTransport, StdClock};

#[derive(Parser, Debug)]
#[command(about = "Reports GPS position and temperature by SMS through a SIM868 modem")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Serial port of the modem, overrides the configuration
    #[arg(short, long)]
    port: Option<String>,
    /// Temperature to report instead of reading the thermal zone
    #[arg(short, long, allow_negative_numbers = true)]
    temperature: Option<f32>,
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Default)]
enum Command {
    /// Power on, attach, get a fix and send the report
    #[default]
    Run,
    /// Power on the modem and wait until it answers
    Probe,
    /// Power on the modem and get a GPS fix
    Gps,
    /// Power on the modem and send a text message
    Sms {
        #[arg(short, long)]
        message: String,
    },
}

type SimTracker = Tracker<AtEngine<SerialTransport, StdClock>, SerialPowerPin>;

fn connect(config: &HostConfig) -> simtrack_host::Result<SimTracker> {
    let transport = SerialTransport::open(&config.port, config.baud_rate)?;
    let pin = transport.power_pin(config.power_line)?;
    info!("Connected to {} at {} baud", transport.port(), config.baud_rate);
    let retry = config.modem.retry;
    let at = AtEngine::new(transport, StdClock::new(), retry.command_timeout())
        .with_poll_interval(retry.poll_interval());
    Ok(Tracker::new(at, pin, config.modem.clone()))
}

fn execute(args: Args) -> simtrack_host::Result<bool> {
    let mut config = match &args.config {
        Some(path) => HostConfig::load(path)?,
        None => HostConfig::default(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }

    let mut tracker = connect(&config)?;
    match args.command.unwrap_or_default() {
        Command::Run => {
            let temperature = sensor::temperature(
                args.temperature,
                Path::new(THERMAL_ZONE),
                config.fallback_temperature,
            );
            let report = tracker.run(temperature, || Local::now().naive_local());
            info!("Modem powered on after {} power cycles", report.power_cycles);
            match &report.sms {
                Ok(sent) => info!("Report sent: {sent:?}"),
                Err(err) => error!("Report not sent: {err}"),
            }
            Ok(report.sms.is_ok())
        }
        Command::Probe => {
            let power_cycles = tracker.turn_on();
            info!("Modem ready after {power_cycles} power cycles");
            Ok(true)
        }
        Command::Gps => {
            tracker.turn_on();
            match tracker.acquire_fix() {
                Some(fix) => {
                    info!("Latitude {}, longitude {}", fix.latitude, fix.longitude);
                    Ok(true)
                }
                None => {
                    warn!("No GPS fix");
                    Ok(false)
                }
            }
        }
        Command::Sms { message } => {
            let message = SmsMessage::new(&config.modem.phone_number, &message)?;
            tracker.turn_on();
            match tracker.send_sms(&message) {
                Ok(sent) => {
                    info!("Message sent: {sent:?}");
                    Ok(true)
                }
                Err(err) => {
                    error!("Message not sent: {err}");
                    Ok(false)
                }
            }
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::builder()
        .filter_level(level)
        .format_timestamp_millis()
        .init();

    match execute(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
