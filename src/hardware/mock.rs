//! Mock Hardware Implementations
//!
//! Simulated collaborators for testing and for running the poll loop without a rig.
//! All mocks are cheap to clone; clones share state, so a test can keep a handle
//! while the poller owns another.
//!
//! # Available Mocks
//!
//! - `MockI2cBus` - Transducers keyed by (bus, address) returning scripted frames
//! - `MockTemperatureProbes` - Settable auxiliary probe readings
//! - `MockValve` - Records the commanded valve state
//! - `MockEdgeSource` - Stores edge handlers and fires them on demand

use crate::error::{AppResult, DaqError};
use crate::hardware::capabilities::{
    EdgeHandler, EdgeInterrupts, I2cTransport, TemperatureProbes, ValveActuator,
};
use crate::measurement::SensorFrame;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

// =============================================================================
// MockI2cBus - Simulated transducers
// =============================================================================

#[derive(Debug, Clone, Default)]
struct MockDevice {
    frame: SensorFrame,
    read_failure: Option<i32>,
    wakes: usize,
}

/// Simulated I2C buses with transducers at fixed addresses.
///
/// Devices not added with [`set_frame`](Self::set_frame) do not acknowledge the wake
/// command, which the transducer layer reports as a connect error.
#[derive(Debug, Clone, Default)]
pub struct MockI2cBus {
    devices: Arc<Mutex<HashMap<(u8, u8), MockDevice>>>,
}

impl MockI2cBus {
    /// Bus with no devices attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach (or update) a device returning `frame` on every read.
    pub fn set_frame(&self, bus: u8, address: u8, frame: SensorFrame) {
        let mut devices = self.devices.lock();
        let device = devices.entry((bus, address)).or_default();
        device.frame = frame;
        device.read_failure = None;
    }

    /// Make reads from a device return `code` (negative) instead of data.
    pub fn fail_reads(&self, bus: u8, address: u8, code: i32) {
        self.devices
            .lock()
            .entry((bus, address))
            .or_default()
            .read_failure = Some(code);
    }

    /// Detach a device.
    pub fn remove(&self, bus: u8, address: u8) {
        self.devices.lock().remove(&(bus, address));
    }

    /// Number of wake commands a device has acknowledged.
    pub fn wake_count(&self, bus: u8, address: u8) -> usize {
        self.devices
            .lock()
            .get(&(bus, address))
            .map_or(0, |d| d.wakes)
    }
}

#[async_trait]
impl I2cTransport for MockI2cBus {
    async fn write_quick(&self, bus: u8, address: u8) -> AppResult<()> {
        match self.devices.lock().get_mut(&(bus, address)) {
            Some(device) => {
                device.wakes += 1;
                Ok(())
            }
            None => Err(DaqError::BusTransfer {
                bus,
                address,
                detail: "no acknowledge".to_string(),
            }),
        }
    }

    async fn read_device(&self, bus: u8, address: u8, len: usize) -> (i32, Vec<u8>) {
        let devices = self.devices.lock();
        match devices.get(&(bus, address)) {
            Some(MockDevice {
                read_failure: Some(code),
                ..
            }) => (*code, Vec::new()),
            Some(device) => {
                let bytes: Vec<u8> = device.frame.iter().copied().take(len).collect();
                (i32::try_from(bytes.len()).unwrap_or(i32::MAX), bytes)
            }
            None => (-1, Vec::new()),
        }
    }
}

// =============================================================================
// MockTemperatureProbes
// =============================================================================

/// Auxiliary probes with settable readings.
#[derive(Debug, Clone, Default)]
pub struct MockTemperatureProbes {
    readings: Arc<Mutex<Vec<Option<f64>>>>,
}

impl MockTemperatureProbes {
    /// Probes with the given initial readings.
    pub fn new(readings: Vec<Option<f64>>) -> Self {
        Self {
            readings: Arc::new(Mutex::new(readings)),
        }
    }

    /// Change the reading of probe `index`, growing the probe list if needed.
    pub fn set(&self, index: usize, value: Option<f64>) {
        let mut readings = self.readings.lock();
        if readings.len() <= index {
            readings.resize(index + 1, None);
        }
        readings[index] = value;
    }
}

#[async_trait]
impl TemperatureProbes for MockTemperatureProbes {
    fn probe_count(&self) -> usize {
        self.readings.lock().len()
    }

    async fn read_celsius(&self, index: usize) -> Option<f64> {
        self.readings.lock().get(index).copied().flatten()
    }
}

// =============================================================================
// MockValve
// =============================================================================

/// Valve that remembers the last commanded state.
#[derive(Debug, Clone, Default)]
pub struct MockValve {
    open: Arc<AtomicBool>,
}

impl MockValve {
    /// Closed valve.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last commanded state.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ValveActuator for MockValve {
    async fn set_open(&self, open: bool) -> AppResult<()> {
        self.open.store(open, Ordering::SeqCst);
        tracing::debug!(open, "mock valve actuated");
        Ok(())
    }
}

// =============================================================================
// MockEdgeSource - Simulated GPIO edge interrupts
// =============================================================================

/// Edge interrupt source fired by hand or by a simulated rotor.
#[derive(Clone, Default)]
pub struct MockEdgeSource {
    handlers: Arc<Mutex<HashMap<u8, EdgeHandler>>>,
}

impl MockEdgeSource {
    /// Source with no registered pins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins that have a handler.
    pub fn registered_pins(&self) -> Vec<u8> {
        let mut pins: Vec<u8> = self.handlers.lock().keys().copied().collect();
        pins.sort_unstable();
        pins
    }

    /// Deliver one falling edge on `pin`. Returns `false` if nothing is registered.
    pub fn fire(&self, pin: u8) -> bool {
        match self.handlers.lock().get_mut(&pin) {
            Some(handler) => {
                handler(pin);
                true
            }
            None => false,
        }
    }

    /// Fire edges on `pin` at `rpm` for `duration` of wall-clock time.
    pub async fn spin(&self, pin: u8, rpm: u32, duration: Duration) {
        if rpm == 0 {
            sleep(duration).await;
            return;
        }
        let period = Duration::from_secs_f64(60.0 / f64::from(rpm));
        let mut ticker = tokio::time::interval(period);
        let deadline = tokio::time::Instant::now() + duration;
        while tokio::time::Instant::now() < deadline {
            ticker.tick().await;
            self.fire(pin);
        }
    }
}

impl EdgeInterrupts for MockEdgeSource {
    fn register_falling_edge(&mut self, pin: u8, handler: EdgeHandler) -> AppResult<()> {
        let mut handlers = self.handlers.lock();
        if handlers.contains_key(&pin) {
            return Err(DaqError::Configuration(format!(
                "pin {pin} already has an edge handler"
            )));
        }
        handlers.insert(pin, handler);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_mock_i2c_reads_frame() {
        let bus = MockI2cBus::new();
        bus.set_frame(1, 0x28, [1, 2, 3, 4]);

        bus.write_quick(1, 0x28).await.unwrap();
        assert_eq!(bus.read_device(1, 0x28, 4).await, (4, vec![1, 2, 3, 4]));
        assert_eq!(bus.wake_count(1, 0x28), 1);

        bus.remove(1, 0x28);
        assert!(bus.write_quick(1, 0x28).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_probes() {
        let probes = MockTemperatureProbes::new(vec![Some(20.0)]);
        probes.set(2, Some(30.0));
        assert_eq!(probes.probe_count(), 3);
        assert_eq!(probes.read_celsius(0).await, Some(20.0));
        assert_eq!(probes.read_celsius(1).await, None);
        assert_eq!(probes.read_celsius(9).await, None);
    }

    #[tokio::test]
    async fn test_mock_valve() {
        let valve = MockValve::new();
        valve.set_open(true).await.unwrap();
        assert!(valve.is_open());
        valve.set_open(false).await.unwrap();
        assert!(!valve.is_open());
    }

    #[test]
    fn test_mock_edges() {
        let mut edges = MockEdgeSource::new();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        edges
            .register_falling_edge(17, Box::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        assert!(edges.fire(17));
        assert!(!edges.fire(27));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(edges.registered_pins(), vec![17]);
        assert!(edges.register_falling_edge(17, Box::new(|_| {})).is_err());
    }
}
