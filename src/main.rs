// MIT License - Copyright (c) 2026 Peter Wright
// EnvisaLink monitor

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use envisalink_tpi::{Device, PanelEvent, PanelState, Session, TpiConfig};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "evl-monitor")]
#[command(about = "Monitor a DSC alarm panel through an EnvisaLink")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Config {
    device: DeviceToml,
    #[serde(default)]
    panel: PanelToml,
    #[serde(default)]
    monitor: MonitorToml,
}

#[derive(Debug, Deserialize)]
struct DeviceToml {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_password")]
    password: String,
    /// Sent when the panel asks for a code, and used to disarm
    #[serde(default)]
    user_code: String,
}

fn default_port() -> u16 {
    envisalink_tpi::constants::DEFAULT_PORT
}
fn default_password() -> String {
    "user".to_string()
}

#[derive(Debug, Deserialize)]
struct PanelToml {
    #[serde(default = "default_partitions")]
    partitions: u8,
    #[serde(default = "default_zones")]
    zones: u16,
    #[serde(default)]
    command_outputs: u8,
}

impl Default for PanelToml {
    fn default() -> Self {
        Self {
            partitions: default_partitions(),
            zones: default_zones(),
            command_outputs: 0,
        }
    }
}

fn default_partitions() -> u8 {
    1
}
fn default_zones() -> u16 {
    8
}

#[derive(Debug, Deserialize)]
struct MonitorToml {
    #[serde(default = "default_status_poll")]
    status_poll_secs: u64,
    #[serde(default = "default_reconnect_delay")]
    reconnect_delay_ms: u64,
}

impl Default for MonitorToml {
    fn default() -> Self {
        Self {
            status_poll_secs: default_status_poll(),
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }
}

fn default_status_poll() -> u64 {
    300
}
fn default_reconnect_delay() -> u64 {
    10000
}

fn load_config(path: &str) -> Result<Config> {
    let text = std::fs::read_to_string(path).context("Failed to read config file")?;
    let config: Config = toml::from_str(&text).context("Failed to parse config file")?;
    if config.panel.partitions == 0 || config.panel.partitions > 8 {
        anyhow::bail!("panel.partitions must be between 1 and 8");
    }
    if config.panel.zones > 64 {
        anyhow::bail!("panel.zones must be at most 64");
    }
    Ok(config)
}

fn build_tpi_config(device: &DeviceToml) -> TpiConfig {
    TpiConfig::builder()
        .host(&device.host)
        .port(device.port)
        .password(&device.password)
        .access_code(&device.user_code)
        .build()
}

// ---------------------------------------------------------------------------
// Session loop
// ---------------------------------------------------------------------------

/// Why a session loop ended.
enum Outcome {
    /// SIGINT/SIGTERM
    Stop,
    /// SIGHUP: reload config and reconnect
    Restart,
    /// The connection dropped
    Lost,
}

struct Signals {
    sigterm: Signal,
    sighup: Signal,
}

impl Signals {
    /// Resolves with the outcome for the next stop or restart signal.
    async fn next(&mut self) -> Outcome {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down...");
                Outcome::Stop
            }
            _ = self.sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                Outcome::Stop
            }
            _ = self.sighup.recv() => {
                info!("Received SIGHUP, reloading config and reconnecting...");
                Outcome::Restart
            }
        }
    }
}

/// Ask for a full status dump: zone/partition state via 001, then the
/// bypass list by entering and leaving the bypass menu on partition 1.
async fn initial_poll(session: &Session) -> envisalink_tpi::Result<()> {
    session.status_report().await?;
    sleep(Duration::from_secs(1)).await;
    session.dump_bypassed_zones(1).await
}

/// Delay before connection attempt `attempt + 1`, doubling from the
/// configured reconnect delay up to 16x.
fn retry_delay(monitor: &MonitorToml, attempt: u32) -> Duration {
    let factor = 1u64 << attempt.saturating_sub(1).min(4);
    Duration::from_millis(monitor.reconnect_delay_ms.saturating_mul(factor))
}

/// Connect, run until the connection drops or a signal arrives, then shut
/// the session down. With `after_loss` set the first attempt waits the
/// reconnect delay.
async fn run_session(
    tpi_config: &TpiConfig,
    monitor: &MonitorToml,
    panel: &mut PanelState,
    signals: &mut Signals,
    after_loss: bool,
) -> Result<Outcome> {
    // Connect, retrying transient failures with exponential backoff
    let mut attempt: u32 = u32::from(after_loss);
    let mut failed = false;
    let (mut session, mut events) = loop {
        if attempt > 0 {
            let delay = retry_delay(monitor, attempt);
            if failed {
                warn!(
                    "Connection attempt failed. Retrying in {:.1}s...",
                    delay.as_secs_f64()
                );
            } else {
                info!("Reconnecting in {:.1}s...", delay.as_secs_f64());
            }
            tokio::select! {
                _ = sleep(delay) => {}
                outcome = signals.next() => return Ok(outcome),
            }
        }
        attempt += 1;
        failed = true;

        let connect = Session::connect(tpi_config.clone());
        let result = tokio::select! {
            result = connect => result,
            outcome = signals.next() => return Ok(outcome),
        };
        match result {
            Ok(connected) => break connected,
            Err(e) if e.is_retryable() => warn!("Connection error: {e}"),
            Err(e) => return Err(e).context("Unable to log in to EnvisaLink"),
        }
    };
    info!("Connected to EnvisaLink at {}", tpi_config.addr());

    if let Err(e) = initial_poll(&session).await {
        warn!("Initial poll failed: {e}");
    }

    let mut poll = interval(Duration::from_secs(monitor.status_poll_secs.max(1)));
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately and the initial poll already ran
    poll.tick().await;

    let outcome = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    if !panel.apply(&event) {
                        log_unhandled(&event);
                    }
                }
                None => {
                    warn!("EnvisaLink connection lost");
                    break Outcome::Lost;
                }
            },
            _ = poll.tick() => {
                debug!("Polling panel status");
                if let Err(e) = session.status_report().await {
                    warn!("Status poll failed: {e}");
                }
            }
            outcome = signals.next() => break outcome,
        }
    };

    match outcome {
        Outcome::Lost => session.close().await,
        Outcome::Stop | Outcome::Restart => {
            if let Err(e) = session.shutdown().await {
                warn!("Clean shutdown failed ({e}), closing connection");
                session.close().await;
            }
        }
    }

    Ok(outcome)
}

fn log_unhandled(event: &PanelEvent) {
    match event {
        PanelEvent::Partition { partition, event } => {
            debug!("Event for unconfigured partition {partition}: {event:?}")
        }
        PanelEvent::Zone { zone, event } => {
            debug!("Event for unconfigured zone {zone}: {event:?}")
        }
        PanelEvent::DuressAlarm { .. } => warn!("Duress alarm reported by panel"),
        PanelEvent::InstallersMode => info!("Panel is in installer's mode"),
        other => info!("Panel event: {other:?}"),
    }
}

fn log_summary(panel: &PanelState) {
    for partition in panel.partitions() {
        info!("{}: {}", partition.name(), partition.describe());
    }
    let open: Vec<_> = panel
        .zones()
        .filter(|z| z.is_open())
        .map(|z| z.id.to_string())
        .collect();
    info!(
        "Open zones: {}",
        if open.is_empty() { "none".to_string() } else { open.join(", ") }
    );
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=debug or RUST_LOG=envisalink_tpi=trace).
    // Default: info.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;

    let mut signals = Signals {
        sigterm: signal(SignalKind::terminate())?,
        sighup: signal(SignalKind::hangup())?,
    };

    let mut panel = PanelState::new(
        config.panel.partitions,
        config.panel.zones,
        config.panel.command_outputs,
    );

    let mut after_loss = false;
    loop {
        let tpi_config = build_tpi_config(&config.device);
        info!("Monitoring EnvisaLink at {}", tpi_config.addr());

        let outcome =
            run_session(&tpi_config, &config.monitor, &mut panel, &mut signals, after_loss)
                .await?;
        after_loss = matches!(outcome, Outcome::Lost);
        match outcome {
            Outcome::Stop => break,
            Outcome::Lost => log_summary(&panel),
            Outcome::Restart => {
                info!("Reloading config from {}", cli.config);
                match load_config(&cli.config) {
                    Ok(new_config) => {
                        panel = PanelState::new(
                            new_config.panel.partitions,
                            new_config.panel.zones,
                            new_config.panel.command_outputs,
                        );
                        config = new_config;
                        info!("Config reloaded successfully");
                    }
                    Err(e) => error!("Failed to reload config, keeping previous: {e:#}"),
                }
            }
        }
    }

    log_summary(&panel);
    info!("Shutdown complete");
    Ok(())
}
