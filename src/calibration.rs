//! Persisted pressure-channel calibration.
//!
//! The calibration document is a JSON file describing every pressure/temperature
//! transducer: where it lives on the bus, its device count span, the engineering span
//! it maps onto, and the ambient offset captured by zeroing.
//!
//! ```json
//! {
//!   "pressure": [
//!     { "bus": 1, "address": 40, "offset": 14.62, "p_min": 0.0, "p_max": 100.0,
//!       "counts_min": 1000, "counts_max": 15000, "mode": "relative" }
//!   ]
//! }
//! ```
//!
//! Rewrites go through a sibling temporary file and a rename, so a crash mid-write
//! leaves either the old or the new document on disk, never a truncated one.

use crate::error::{AppResult, DaqError};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Whether reported pressure has the ambient offset removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PressureMode {
    /// Reported as measured.
    #[default]
    Absolute,
    /// Reported relative to the zeroed ambient offset.
    Relative,
}

/// Calibration for one pressure/temperature transducer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureChannelCalibration {
    /// Bus number the device is attached to.
    pub bus: u8,
    /// 7-bit device address.
    pub address: u8,
    /// Ambient pressure captured by zeroing, in psi.
    #[serde(default)]
    pub offset: f64,
    /// Engineering value at `counts_min`.
    #[serde(default = "default_p_min")]
    pub p_min: f64,
    /// Engineering value at `counts_max`.
    #[serde(default = "default_p_max")]
    pub p_max: f64,
    /// Raw count at 0 % of the rated span (P1).
    #[serde(default = "default_counts_min")]
    pub counts_min: u16,
    /// Raw count at 100 % of the rated span (P2).
    #[serde(default = "default_counts_max")]
    pub counts_max: u16,
    /// Absolute or relative reporting.
    #[serde(default)]
    pub mode: PressureMode,
}

fn default_p_min() -> f64 {
    0.0
}

fn default_p_max() -> f64 {
    100.0
}

fn default_counts_min() -> u16 {
    1000
}

fn default_counts_max() -> u16 {
    15000
}

impl Default for PressureChannelCalibration {
    fn default() -> Self {
        Self {
            bus: 1,
            address: 0x28,
            offset: 0.0,
            p_min: default_p_min(),
            p_max: default_p_max(),
            counts_min: default_counts_min(),
            counts_max: default_counts_max(),
            mode: PressureMode::Absolute,
        }
    }
}

impl PressureChannelCalibration {
    /// Convert an as-measured pressure into the reported value for this channel.
    pub fn reported(&self, absolute_psi: f64) -> f64 {
        match self.mode {
            PressureMode::Absolute => absolute_psi,
            PressureMode::Relative => absolute_psi - self.offset,
        }
    }
}

/// The whole persisted calibration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationDocument {
    /// One entry per pressure channel, in channel order.
    pub pressure: Vec<PressureChannelCalibration>,
}

impl Default for CalibrationDocument {
    /// Two transducers at 0x28, on the primary bus and on the secondary bus.
    fn default() -> Self {
        Self {
            pressure: vec![
                PressureChannelCalibration::default(),
                PressureChannelCalibration {
                    bus: 3,
                    ..PressureChannelCalibration::default()
                },
            ],
        }
    }
}

impl CalibrationDocument {
    /// Load and validate a document from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        let document: Self = serde_json::from_str(&json)?;
        document.validate()?;
        Ok(document)
    }

    /// Load a document, seeding it with `default` first if the file does not exist.
    pub fn load_or_init<P: AsRef<Path>>(path: P, default: &Self) -> AppResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "calibration file missing, writing defaults");
            default.save_atomic(path)?;
        }
        Self::load(path)
    }

    /// Write the document by replacing the file in one rename.
    pub fn save_atomic<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        let tmp = temporary_sibling(path);
        {
            let mut file = File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    /// Copy of this document with the ambient offsets replaced by `samples`.
    ///
    /// Fails when fewer samples than channels are given or any sample is not finite.
    /// Surplus samples are ignored.
    pub fn with_offsets(&self, samples: &[f64]) -> AppResult<Self> {
        if samples.len() < self.pressure.len() {
            return Err(DaqError::Calibration(format!(
                "expected {} pressure samples, got {}",
                self.pressure.len(),
                samples.len()
            )));
        }
        if let Some(bad) = samples.iter().find(|s| !s.is_finite()) {
            return Err(DaqError::Calibration(format!(
                "pressure sample {bad} is not a finite number"
            )));
        }
        if samples.len() > self.pressure.len() {
            tracing::warn!(
                channels = self.pressure.len(),
                samples = samples.len(),
                "ignoring surplus zeroing samples"
            );
        }

        let mut updated = self.clone();
        for (channel, &offset) in updated.pressure.iter_mut().zip(samples) {
            channel.offset = offset;
        }
        Ok(updated)
    }

    /// Check every channel's spans are usable.
    pub fn validate(&self) -> AppResult<()> {
        for (i, channel) in self.pressure.iter().enumerate() {
            if channel.counts_max <= channel.counts_min {
                return Err(DaqError::Calibration(format!(
                    "pressure channel {}: counts_max ({}) must exceed counts_min ({})",
                    i + 1,
                    channel.counts_max,
                    channel.counts_min
                )));
            }
            if !(channel.p_max > channel.p_min) {
                return Err(DaqError::Calibration(format!(
                    "pressure channel {}: p_max ({}) must exceed p_min ({})",
                    i + 1,
                    channel.p_max,
                    channel.p_min
                )));
            }
            if channel.address > 0x7F {
                return Err(DaqError::Calibration(format!(
                    "pressure channel {}: address 0x{:02x} is not a 7-bit address",
                    i + 1,
                    channel.address
                )));
            }
        }
        Ok(())
    }
}

fn temporary_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "calibration".into());
    name.push(".tmp");
    path.with_file_name(name)
}
