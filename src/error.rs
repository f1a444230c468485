//! Custom error types for the application.
//!
//! This module defines the primary error type, `DaqError`, for the entire crate.
//! Using the `thiserror` crate, it provides a centralized and consistent way to handle
//! the failures that can occur during a poll cycle, from bus transactions to log
//! persistence and configuration problems.
//!
//! ## Error Hierarchy
//!
//! - **`BusConnect`** / **`BusTransfer`**: the transducer could not be reached, or a
//!   write/read on the bus failed. Only the affected channel degrades for that cycle.
//! - **`ProtocolFault`**: the transducer answered but flagged its frame as reserved,
//!   stale or faulted.
//! - **`NumericDegenerate`**: an estimator had nothing meaningful to work with (no
//!   samples, zero spread). Callers resolve this to zero RPM.
//! - **`Persistence`**: a session log could not be written.
//! - **`Config`** / **`Configuration`** / **`Calibration`**: loading or validating
//!   settings and the calibration document.
//!
//! By using `#[from]`, `DaqError` can be created from the underlying I/O, serde and csv
//! errors with the `?` operator.

use crate::measurement::frame::SensorStatus;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

#[derive(Error, Debug)]
pub enum DaqError {
    #[error("Cannot reach device 0x{address:02x} on bus {bus}")]
    BusConnect { bus: u8, address: u8 },

    #[error("Bus transfer failed for device 0x{address:02x} on bus {bus}: {detail}")]
    BusTransfer { bus: u8, address: u8, detail: String },

    #[error("Device reported {0:?} status")]
    ProtocolFault(SensorStatus),

    #[error("Numerically degenerate input: {0}")]
    NumericDegenerate(&'static str),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Calibration error: {0}")]
    Calibration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("operation '{0}' not found")]
    OperationNotFound(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl DaqError {
    /// Whether the error only affects the current poll cycle.
    ///
    /// Bus, protocol, numeric and persistence failures never abort polling; the next
    /// cycle starts from a clean slate. Configuration and calibration failures need
    /// operator attention.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DaqError::BusConnect { .. }
                | DaqError::BusTransfer { .. }
                | DaqError::ProtocolFault(_)
                | DaqError::NumericDegenerate(_)
                | DaqError::Persistence(_)
                | DaqError::Csv(_)
                | DaqError::Io(_)
        )
    }
}
