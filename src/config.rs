//! Configuration System using Figment
//!
//! This module provides strongly-typed configuration loading. Configuration is loaded
//! from:
//! 1. a TOML file (base configuration)
//! 2. Environment variables (prefixed with `ROTOR_DAQ_`, sections split on `__`)
//!
//! Pressure channel definitions are not part of these settings; they live in the
//! calibration document (see [`crate::calibration`]) because zeroing rewrites them at
//! runtime.
//!
//! # Example
//! ```no_run
//! use rotor_daq::config::Settings;
//!
//! let settings = Settings::load_from("config/rotor_daq.toml")?;
//! println!("Polling every {} ms", settings.acquisition.poll_interval_ms);
//! # Ok::<(), rotor_daq::error::DaqError>(())
//! ```

use crate::error::{AppResult, DaqError};
use crate::tachometer::EstimatorParams;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Poll loop and estimator tuning
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    /// RPM channels, in channel order
    #[serde(default)]
    pub tachometer: Vec<TachometerChannelConfig>,
    /// Auxiliary temperature probes
    #[serde(default)]
    pub temperature: TemperatureConfig,
    /// Valve actuator
    #[serde(default)]
    pub valve: ValveConfig,
    /// File locations
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "rotor-daq".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Acquisition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Period of the poll loop in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// No tachometer edge for this long means the rotor has stopped
    #[serde(default = "default_stall_timeout")]
    pub stall_timeout_ms: u64,
    /// Fewer than `expected / divisor` periods in a reading counts as vibration noise
    #[serde(default = "default_noise_divisor")]
    pub noise_sample_divisor: u32,
    /// Periods buffered per channel between polls
    #[serde(default = "default_buffer_capacity")]
    pub pulse_buffer_capacity: usize,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            stall_timeout_ms: default_stall_timeout(),
            noise_sample_divisor: default_noise_divisor(),
            pulse_buffer_capacity: default_buffer_capacity(),
        }
    }
}

impl AcquisitionConfig {
    /// Poll period as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Estimator tuning derived from these settings.
    pub fn estimator_params(&self) -> EstimatorParams {
        EstimatorParams {
            stall_timeout: Duration::from_millis(self.stall_timeout_ms),
            noise_divisor: f64::from(self.noise_sample_divisor),
        }
    }
}

/// One RPM channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TachometerChannelConfig {
    /// GPIO pin (BCM numbering) wired to the tachometer output
    pub pin: u8,
    /// Human-readable name used in diagnostics
    #[serde(default)]
    pub label: Option<String>,
}

/// Auxiliary temperature probe configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemperatureConfig {
    /// Number of probes to read each cycle
    #[serde(default)]
    pub probe_count: usize,
}

/// Valve configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValveConfig {
    /// GPIO pin driving the valve
    pub pin: u8,
}

impl Default for ValveConfig {
    fn default() -> Self {
        Self { pin: 18 }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory receiving one CSV file per session
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: PathBuf,
    /// Calibration document location
    #[serde(default = "default_calibration_path")]
    pub calibration_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sessions_dir: default_sessions_dir(),
            calibration_path: default_calibration_path(),
        }
    }
}

// Default value functions
fn default_poll_interval() -> u64 {
    1000
}

fn default_stall_timeout() -> u64 {
    2000
}

fn default_noise_divisor() -> u32 {
    3
}

fn default_buffer_capacity() -> usize {
    4096
}

fn default_sessions_dir() -> PathBuf {
    PathBuf::from("sessions")
}

fn default_calibration_path() -> PathBuf {
    PathBuf::from("calibration.json")
}

impl Settings {
    /// Settings for a rig with two tachometers on pins 17 and 27.
    pub fn with_defaults() -> Self {
        Self {
            tachometer: vec![
                TachometerChannelConfig {
                    pin: 17,
                    label: Some("rpm1".to_string()),
                },
                TachometerChannelConfig {
                    pin: 27,
                    label: Some("rpm2".to_string()),
                },
            ],
            ..Default::default()
        }
    }

    /// Load settings from a TOML file and `ROTOR_DAQ_` environment variables.
    ///
    /// Values missing from both fall back to [`Settings::with_defaults`].
    /// Example override: `ROTOR_DAQ_ACQUISITION__POLL_INTERVAL_MS=500`.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let settings: Self = Figment::from(Serialized::defaults(Self::with_defaults()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("ROTOR_DAQ_").split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(DaqError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.acquisition.poll_interval_ms == 0 {
            return Err(DaqError::Configuration(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.acquisition.noise_sample_divisor == 0 {
            return Err(DaqError::Configuration(
                "noise_sample_divisor must be greater than 0".to_string(),
            ));
        }
        if self.acquisition.pulse_buffer_capacity == 0 {
            return Err(DaqError::Configuration(
                "pulse_buffer_capacity must be greater than 0".to_string(),
            ));
        }

        if self.tachometer.is_empty() {
            return Err(DaqError::Configuration(
                "at least one tachometer channel is required".to_string(),
            ));
        }
        let mut pins = HashSet::new();
        for channel in &self.tachometer {
            if !pins.insert(channel.pin) {
                return Err(DaqError::Configuration(format!(
                    "Duplicate tachometer pin: {}",
                    channel.pin
                )));
            }
        }
        if pins.contains(&self.valve.pin) {
            return Err(DaqError::Configuration(format!(
                "Valve pin {} is also used by a tachometer",
                self.valve.pin
            )));
        }

        Ok(())
    }
}
