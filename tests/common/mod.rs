//! Shared rig for integration tests.
#![allow(dead_code)]

use rotor_daq::calibration::CalibrationDocument;
use rotor_daq::clock::ManualClock;
use rotor_daq::config::Settings;
use rotor_daq::hardware::mock::{MockEdgeSource, MockI2cBus, MockTemperatureProbes, MockValve};
use rotor_daq::hardware::TransducerBus;
use rotor_daq::{Hardware, SensorPoller};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// 1048 pressure counts, 739 temperature counts, normal status.
pub const SAMPLE_FRAME: [u8; 4] = [0x04, 0x18, 0x5C, 0x70];

/// 60 ms between edges.
pub const PERIOD_1000_RPM: Duration = Duration::from_millis(60);

pub struct TestRig {
    pub poller: SensorPoller,
    pub settings: Settings,
    pub edges: MockEdgeSource,
    pub i2c: MockI2cBus,
    pub probes: MockTemperatureProbes,
    pub valve: MockValve,
    pub clock: ManualClock,
    pub dir: TempDir,
}

impl TestRig {
    /// Rig with both default transducers answering and two probes.
    pub fn new() -> Self {
        Self::with_calibration(CalibrationDocument::default())
    }

    pub fn with_calibration(calibration: CalibrationDocument) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::with_defaults();
        settings.temperature.probe_count = 2;
        settings.storage.sessions_dir = dir.path().join("sessions");
        settings.storage.calibration_path = dir.path().join("calibration.json");
        calibration
            .save_atomic(&settings.storage.calibration_path)
            .unwrap();

        let i2c = MockI2cBus::new();
        for channel in &calibration.pressure {
            i2c.set_frame(channel.bus, channel.address, SAMPLE_FRAME);
        }
        let probes = MockTemperatureProbes::new(vec![Some(20.5), Some(22.0)]);
        let valve = MockValve::new();
        let hardware = Hardware {
            frames: Arc::new(TransducerBus::new(i2c.clone())),
            probes: Arc::new(probes.clone()),
            valve: Arc::new(valve.clone()),
        };

        let clock = ManualClock::new(5_000_000_000);
        let mut edges = MockEdgeSource::new();
        let poller = SensorPoller::new(
            &settings,
            calibration,
            hardware,
            &mut edges,
            Arc::new(clock.clone()),
        )
        .unwrap();

        Self {
            poller,
            settings,
            edges,
            i2c,
            probes,
            valve,
            clock,
            dir,
        }
    }

    /// Fire `count` edges on `pin`, advancing the clock by `period` before each.
    pub fn spin(&self, pin: u8, count: usize, period: Duration) {
        for _ in 0..count {
            self.clock.advance(period);
            assert!(self.edges.fire(pin));
        }
    }
}
