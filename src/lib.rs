//! # Rotor DAQ Core Library
//!
//! Acquisition core for a rotor test rig: tachometer pulses become per-channel RPM,
//! I2C pressure transducers and auxiliary probes are sampled once per poll, and every
//! poll taken while the rotor turns is appended to a session-scoped CSV log.
//!
//! ## Crate Structure
//!
//! - **`tachometer`**: interrupt-side pulse capture and poll-side RPM estimation over a
//!   lock-free SPSC ring.
//! - **`data`**: Chauvenet outlier rejection and the CSV session logger.
//! - **`measurement`**: transducer frame decoding and the per-poll `SampleRecord`.
//! - **`calibration`**: per-channel spans and ambient offsets, persisted as JSON.
//! - **`session`**: the Idle/Active session state machine.
//! - **`poller`**: `SensorPoller`, which runs one poll cycle per tick.
//! - **`dispatch`**: named operations (`read_sensors`, `zero_pressure`, `open_valve`,
//!   `close_valve`) with JSON responses.
//! - **`hardware`**: capability traits for the bus, probes, valve and GPIO edges, plus
//!   mocks.
//! - **`config`**: layered settings (defaults, TOML, environment) via `figment`.
//! - **`tracing_setup`**: subscriber initialisation.
//! - **`clock`**: monotonic nanosecond clock abstraction.
//! - **`error`**: the crate-wide `DaqError`.

pub mod calibration;
pub mod clock;
pub mod config;
pub mod data;
pub mod dispatch;
pub mod error;
pub mod hardware;
pub mod measurement;
pub mod poller;
pub mod session;
pub mod tachometer;
pub mod tracing_setup;

pub use dispatch::{dispatch, Operation};
pub use error::{AppResult, DaqError};
pub use poller::{Hardware, SensorPoller};
