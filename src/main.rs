//! CLI Entry Point for rotor-daq
//!
//! Provides command-line interface for:
//! - Running the poll loop (one cycle per tick until Ctrl-C or a cycle limit)
//! - Invoking a single named operation and printing its JSON response
//!
//! Real I2C and GPIO back-ends are supplied by the deployment; this binary ships with
//! the simulated rig only.
//!
//! # Usage
//!
//! ```bash
//! rotor-daq run --config config/rotor_daq.toml --simulate --cycles 30
//! rotor-daq action zero_pressure --payload '[14.7, 14.6]'
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rotor_daq::calibration::CalibrationDocument;
use rotor_daq::clock::MonotonicClock;
use rotor_daq::config::Settings;
use rotor_daq::hardware::mock::{MockEdgeSource, MockI2cBus, MockTemperatureProbes, MockValve};
use rotor_daq::hardware::TransducerBus;
use rotor_daq::{dispatch, tracing_setup, Hardware, SensorPoller};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// About 14.7 psi with the default 0-100 psi span.
const SIMULATED_FRAME: [u8; 4] = [0x0B, 0xF2, 0x5C, 0x70];
const SIMULATED_RPM: u32 = 1200;

#[derive(Parser)]
#[command(name = "rotor-daq")]
#[command(about = "Rotor test-rig acquisition with session logging", long_about = None)]
struct Cli {
    /// Settings file
    #[arg(long, global = true, default_value = "config/rotor_daq.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll sensors once per tick
    Run {
        /// Use simulated hardware with a rotor that spins up and stops
        #[arg(long)]
        simulate: bool,

        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,
    },

    /// Run one named operation and print the response
    Action {
        /// Operation name (read_sensors, zero_pressure, open_valve, close_valve)
        name: String,

        /// JSON payload
        #[arg(long)]
        payload: Option<String>,
    },
}

struct SimulatedRig {
    poller: SensorPoller,
    edges: MockEdgeSource,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load_from(&cli.config)
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;
    tracing_setup::init_from_settings(&settings)?;

    match cli.command {
        Commands::Run { simulate, cycles } => run(settings, simulate, cycles).await,
        Commands::Action { name, payload } => action(settings, &name, payload.as_deref()).await,
    }
}

fn load_calibration(path: &Path) -> Result<CalibrationDocument> {
    CalibrationDocument::load_or_init(path, &CalibrationDocument::default())
        .with_context(|| format!("loading calibration from {}", path.display()))
}

fn simulated_rig(settings: &Settings) -> Result<SimulatedRig> {
    let calibration = load_calibration(&settings.storage.calibration_path)?;

    let i2c = MockI2cBus::new();
    for channel in &calibration.pressure {
        i2c.set_frame(channel.bus, channel.address, SIMULATED_FRAME);
    }
    let probes = MockTemperatureProbes::new(
        (0..settings.temperature.probe_count)
            .map(|i| Some(21.0 + i as f64 * 0.5))
            .collect(),
    );
    let hardware = Hardware {
        frames: Arc::new(TransducerBus::new(i2c)),
        probes: Arc::new(probes),
        valve: Arc::new(MockValve::new()),
    };

    let mut edges = MockEdgeSource::new();
    let poller = SensorPoller::new(
        settings,
        calibration,
        hardware,
        &mut edges,
        Arc::new(MonotonicClock),
    )?;
    Ok(SimulatedRig { poller, edges })
}

async fn run(settings: Settings, simulate: bool, cycles: Option<u64>) -> Result<()> {
    if !simulate {
        bail!("no hardware back-end is built in; pass --simulate");
    }

    let SimulatedRig { mut poller, edges } = simulated_rig(&settings)?;
    let poll_interval = settings.acquisition.poll_interval();

    let pins: Vec<u8> = settings.tachometer.iter().map(|t| t.pin).collect();
    let rotor = tokio::spawn(async move {
        // Idle, spin, idle: enough to open and close one session.
        tokio::time::sleep(poll_interval * 3).await;
        let spins = pins.iter().map(|&pin| {
            let edges = edges.clone();
            async move { edges.spin(pin, SIMULATED_RPM, Duration::from_secs(10)).await }
        });
        for handle in spins.map(tokio::spawn).collect::<Vec<_>>() {
            let _ = handle.await;
        }
        tracing::info!("simulated rotor stopped");
    });

    tracing::info!(
        interval_ms = poll_interval.as_millis() as u64,
        sessions_dir = %settings.storage.sessions_dir.display(),
        "polling started"
    );

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut completed = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let record = poller.read_sensors().await;
                tracing::info!(
                    rpm = ?record.rpm,
                    session_id = record.session_id.as_deref().unwrap_or("-"),
                    "sample"
                );
                completed += 1;
                if cycles.is_some_and(|limit| completed >= limit) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    rotor.abort();
    tracing::info!(cycles = completed, "polling stopped");
    Ok(())
}

async fn action(settings: Settings, name: &str, payload: Option<&str>) -> Result<()> {
    let payload = payload
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("payload is not valid JSON")?;

    let SimulatedRig { mut poller, .. } = simulated_rig(&settings)?;
    let response = dispatch(&mut poller, name, payload).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
