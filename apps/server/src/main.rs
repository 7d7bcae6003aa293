//! Herald - command-line runner for Sonos announcements.
//!
//! Each invocation probes the configured players, runs one command and exits
//! once every player it interrupted is back to what it was doing. Ctrl+C
//! cancels the command and restores interrupted players first.

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use herald_core::{
    bootstrap_services, BootstrappedServices, EndMode, IntercomTarget, LoggingEventEmitter,
    PlaybackReport, RoomCommand, SpeakOptions,
};
use tokio::signal;

use crate::config::ServerConfig;

/// Herald - announcements and room control for Sonos players.
#[derive(Parser, Debug)]
#[command(name = "herald")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE", env = "HERALD_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "HERALD_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Player to probe as `host[:port]` (repeatable, overrides config file).
    #[arg(long = "host", value_name = "HOST")]
    hosts: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Speak text in a room.
    Speak {
        #[arg(short, long)]
        room: String,
        text: String,
        #[arg(long, value_enum, default_value_t = EndModeArg::Restore)]
        end: EndModeArg,
        #[arg(long)]
        volume: Option<u8>,
        #[arg(long)]
        voice: Option<String>,
        #[arg(long)]
        speed: Option<u32>,
    },
    /// Play a file or URI in a room (`[seconds@@]path-or-uri`).
    Play {
        #[arg(short, long)]
        room: String,
        file: String,
        #[arg(long, value_enum, default_value_t = EndModeArg::Restore)]
        end: EndModeArg,
        #[arg(long)]
        volume: Option<u8>,
    },
    /// Relay the recorded intercom clip from one room to others.
    Intercom {
        /// Room the message was recorded in.
        #[arg(long)]
        from: String,
        /// Recipient room, or `all`.
        #[arg(long, default_value = "all")]
        to: String,
        /// Clip length in seconds.
        #[arg(long)]
        duration: f64,
        /// Rooms that already heard the message.
        #[arg(long = "played-to", value_name = "ROOM")]
        played_to: Vec<String>,
    },
    /// Set, raise or lower a room's volume (`up`, `down` or 0-100).
    Volume {
        #[arg(short, long)]
        room: String,
        level: String,
    },
    /// Mute or unmute a room.
    Mute {
        #[arg(short, long)]
        room: String,
        #[arg(value_enum)]
        state: Toggle,
    },
    /// Switch a room to TV sound.
    Tv {
        #[arg(short, long)]
        room: String,
    },
    /// Play a room's queue.
    Queue {
        #[arg(short, long)]
        room: String,
    },
    /// Pause a room.
    Stop {
        #[arg(short, long)]
        room: String,
    },
    /// Skip to the next queue track.
    Next {
        #[arg(short, long)]
        room: String,
    },
    /// Go back to the previous queue track.
    Previous {
        #[arg(short, long)]
        room: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EndModeArg {
    /// Stop right away without restoring.
    Stop,
    /// Restore what was playing afterwards.
    Restore,
    /// Keep the announcement playing.
    Leave,
}

impl From<EndModeArg> for EndMode {
    fn from(arg: EndModeArg) -> Self {
        match arg {
            EndModeArg::Stop => EndMode::StopImmediately,
            EndModeArg::Restore => EndMode::RestoreAfterSpeech,
            EndModeArg::Leave => EndMode::LeavePlaying,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Toggle {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Herald v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if !args.hosts.is_empty() {
        config.hosts = args.hosts;
    }
    if config.hosts.is_empty() {
        bail!("No players configured. Pass --host or set `hosts` in the config file.");
    }

    let services = bootstrap_services(config.herald, Arc::new(LoggingEventEmitter))
        .context("Failed to bootstrap services")?;

    let summary = services.discover_hosts(&config.hosts).await;
    if services.registry.is_empty() {
        bail!("None of the {} configured player(s) answered", config.hosts.len());
    }
    log::info!("{} player(s) registered", summary.added + summary.superseded);

    let outcome = tokio::select! {
        result = run_command(&services, args.command) => result,
        _ = shutdown_signal() => {
            log::info!("Shutdown signal received, cleaning up...");
            services.shutdown().await;
            return Ok(());
        }
    };

    // Leave-playing announcements keep their room armed until the watchdog
    // restores it.
    tokio::select! {
        _ = wait_until_disarmed(&services) => {}
        _ = shutdown_signal() => {
            log::info!("Shutdown signal received, cleaning up...");
            services.shutdown().await;
        }
    }

    outcome
}

async fn run_command(services: &BootstrappedServices, command: Command) -> Result<()> {
    match command {
        Command::Speak {
            room,
            text,
            end,
            volume,
            voice,
            speed,
        } => {
            let options = SpeakOptions {
                end_mode: end.into(),
                volume,
                voice,
                speed,
            };
            let report = services
                .speech
                .speak(&text, &room, options, &services.cancel_token)
                .await?;
            print_report(&report);
        }
        Command::Play {
            room,
            file,
            end,
            volume,
        } => {
            let report = services
                .orchestrator
                .play(&file, &room, end.into(), volume)
                .await?;
            print_report(&report);
        }
        Command::Intercom {
            from,
            to,
            duration,
            played_to,
        } => {
            let duration = Duration::try_from_secs_f64(duration)
                .with_context(|| format!("Invalid clip duration: {}", duration))?;
            let target = if to.eq_ignore_ascii_case("all") {
                IntercomTarget::All
            } else {
                IntercomTarget::Room(to)
            };
            let deliveries = services
                .intercom
                .send(&from, target, duration, &played_to)
                .await?;
            for delivery in deliveries {
                match delivery.result {
                    Ok(report) => print_report(&report),
                    Err(e) => log::error!("{}: {}", delivery.room, e),
                }
            }
        }
        Command::Volume { room, level } => {
            let command = match level.as_str() {
                "up" => RoomCommand::VolumeUp,
                "down" => RoomCommand::VolumeDown,
                other => RoomCommand::SetVolume(
                    other
                        .parse()
                        .with_context(|| format!("Invalid volume level: {}", other))?,
                ),
            };
            room_command(services, &room, command).await?;
        }
        Command::Mute { room, state } => {
            room_command(services, &room, RoomCommand::Mute(matches!(state, Toggle::On))).await?;
        }
        Command::Tv { room } => room_command(services, &room, RoomCommand::TvSound).await?,
        Command::Queue { room } => room_command(services, &room, RoomCommand::PlayQueue).await?,
        Command::Stop { room } => room_command(services, &room, RoomCommand::Stop).await?,
        Command::Next { room } => room_command(services, &room, RoomCommand::Next).await?,
        Command::Previous { room } => room_command(services, &room, RoomCommand::Previous).await?,
    }
    Ok(())
}

async fn room_command(
    services: &BootstrappedServices,
    room: &str,
    command: RoomCommand,
) -> Result<()> {
    let outcome = services.commands.execute(room, room, command).await?;
    println!("{}: {:?}", room, outcome);
    Ok(())
}

fn print_report(report: &PlaybackReport) {
    let restored = match &report.restore {
        Some(outcome) if outcome.is_clean() => "restored",
        Some(_) => "restored with errors",
        None => "not restored",
    };
    println!(
        "{}: played for {:.1}s, {}",
        report.room,
        report.timeout.as_secs_f64(),
        restored
    );
}

/// Resolves once no registered room is armed.
async fn wait_until_disarmed(services: &BootstrappedServices) {
    loop {
        let armed = services
            .registry
            .all_device_ids()
            .into_iter()
            .filter(|room| services.interruption.is_armed(room))
            .count();
        if armed == 0 {
            return;
        }
        log::debug!("Waiting for {} armed room(s)", armed);
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
