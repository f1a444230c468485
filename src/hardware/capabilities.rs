//! Hardware Capabilities
//!
//! Small, focused traits for the collaborators the acquisition core talks to. The
//! core never touches a bus, a GPIO line or a 1-Wire probe directly; it is handed
//! implementations of these traits:
//!
//! - [`I2cTransport`]: raw quick-write and block-read transactions
//! - [`FrameSource`]: one complete 4-byte transducer frame per call
//! - [`TemperatureProbes`]: auxiliary (non-bus) temperature probes
//! - [`ValveActuator`]: the test valve
//! - [`EdgeInterrupts`]: falling-edge callbacks per GPIO pin
//!
//! # Design Philosophy
//!
//! Each capability trait:
//! - Is thread-safe (requires Send + Sync, or Send for interrupt registration)
//! - Is async where the call may block the poll context (bus, probes, valve)
//! - Reports failures with [`DaqError`](crate::error::DaqError) so the poller can tell
//!   a missing device from a transient transfer error
//! - Focuses on ONE thing
//!
//! # Example
//!
//! ```rust,ignore
//! async fn sample<F: FrameSource>(bus: &F) -> AppResult<SensorFrame> {
//!     bus.fetch_frame(1, 0x28).await
//! }
//! ```

use crate::error::AppResult;
use crate::measurement::SensorFrame;
use async_trait::async_trait;

/// Callback invoked from the edge-interrupt context with the pin that fired.
///
/// Must return quickly: read a timestamp, push to a buffer, nothing else.
pub type EdgeHandler = Box<dyn FnMut(u8) + Send + 'static>;

/// Capability: raw I2C transactions
///
/// # Contract
/// - `write_quick` issues the wake / start-measurement command; an error means the
///   device did not acknowledge (usually nothing connected).
/// - `read_device` returns `(byte_count, bytes)`; a negative count signals a failed
///   read and the bytes must then be ignored.
#[async_trait]
pub trait I2cTransport: Send + Sync {
    /// Send a quick write (address + R/W bit only) to the device.
    async fn write_quick(&self, bus: u8, address: u8) -> AppResult<()>;

    /// Read up to `len` bytes from the device.
    async fn read_device(&self, bus: u8, address: u8, len: usize) -> (i32, Vec<u8>);
}

/// Capability: pressure/temperature frame acquisition
///
/// # Contract
/// - One call is one complete measurement: wake, settle, read.
/// - Failures are per call; the next call starts fresh.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Fetch one frame from the device at `address` on `bus`.
    async fn fetch_frame(&self, bus: u8, address: u8) -> AppResult<SensorFrame>;
}

/// Capability: auxiliary temperature probes
#[async_trait]
pub trait TemperatureProbes: Send + Sync {
    /// Number of probes currently present.
    fn probe_count(&self) -> usize;

    /// Temperature of probe `index` in °C, `None` if absent or unreadable.
    async fn read_celsius(&self, index: usize) -> Option<f64>;
}

/// Capability: valve actuation
#[async_trait]
pub trait ValveActuator: Send + Sync {
    /// Drive the valve open (`true`) or closed (`false`).
    async fn set_open(&self, open: bool) -> AppResult<()>;
}

/// Capability: falling-edge interrupt registration
pub trait EdgeInterrupts: Send {
    /// Call `handler` on every falling edge of `pin`.
    fn register_falling_edge(&mut self, pin: u8, handler: EdgeHandler) -> AppResult<()>;
}
