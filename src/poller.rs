//! Poll-cycle orchestration.
//!
//! [`SensorPoller`] owns every piece of state that survives between ticks: the
//! per-channel RPM estimators, the session state machine, the last poll time, the
//! last good auxiliary temperatures and the active calibration. An external scheduler
//! calls [`SensorPoller::read_sensors`] once per tick, never concurrently.
//!
//! One cycle:
//! 1. measure the read interval since the previous poll
//! 2. read every RPM channel, fetch and decode every transducer frame, read the
//!    auxiliary probes
//! 3. open a session if rotation just started
//! 4. assemble the record (calibration applied) and log it if a session is open
//! 5. close the session if rotation just stopped, remember RPM and poll time
//!
//! A failing transducer or probe only blanks its own column for that cycle.

use crate::calibration::CalibrationDocument;
use crate::clock::Clock;
use crate::config::Settings;
use crate::data::SampleLogger;
use crate::error::{AppResult, DaqError};
use crate::hardware::{EdgeInterrupts, FrameSource, TemperatureProbes, ValveActuator};
use crate::measurement::{decode, PressureSample, SampleRecord, SensorStatus};
use crate::session::SessionManager;
use crate::tachometer::{pulse_channel, RpmEstimator};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// External collaborators used during a poll cycle.
#[derive(Clone)]
pub struct Hardware {
    /// Transducer frame fetch.
    pub frames: Arc<dyn FrameSource>,
    /// Auxiliary temperature probes.
    pub probes: Arc<dyn TemperatureProbes>,
    /// Test valve.
    pub valve: Arc<dyn ValveActuator>,
}

/// Owner of all acquisition state; see the module docs for the cycle.
pub struct SensorPoller {
    estimators: Vec<RpmEstimator>,
    hardware: Hardware,
    calibration: Arc<CalibrationDocument>,
    calibration_path: PathBuf,
    sessions: SessionManager,
    logger: SampleLogger,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    probe_count: usize,
    last_poll_ns: Option<u64>,
    last_temperatures: Vec<Option<f64>>,
}

impl SensorPoller {
    /// Build the poller and register one edge handler per tachometer pin.
    pub fn new(
        settings: &Settings,
        calibration: CalibrationDocument,
        hardware: Hardware,
        edges: &mut dyn EdgeInterrupts,
        clock: Arc<dyn Clock>,
    ) -> AppResult<Self> {
        settings.validate()?;
        calibration.validate()?;

        let acquisition = &settings.acquisition;
        let mut estimators = Vec::with_capacity(settings.tachometer.len());
        for (channel, tachometer) in settings.tachometer.iter().enumerate() {
            let (mut counter, estimator) = pulse_channel(
                channel,
                tachometer.pin,
                acquisition.pulse_buffer_capacity,
                Arc::clone(&clock),
                acquisition.estimator_params(),
            );
            edges.register_falling_edge(tachometer.pin, Box::new(move |pin| counter.on_edge(pin)))?;
            tracing::info!(
                channel,
                pin = tachometer.pin,
                label = tachometer.label.as_deref().unwrap_or(""),
                "tachometer registered"
            );
            estimators.push(estimator);
        }

        let probe_count = settings.temperature.probe_count;
        Ok(Self {
            estimators,
            hardware,
            calibration: Arc::new(calibration),
            calibration_path: settings.storage.calibration_path.clone(),
            sessions: SessionManager::new(),
            logger: SampleLogger::new(settings.storage.sessions_dir.clone()),
            clock,
            poll_interval: acquisition.poll_interval(),
            probe_count,
            last_poll_ns: None,
            last_temperatures: vec![None; probe_count],
        })
    }

    /// Calibration currently applied to pressure readings.
    pub fn calibration(&self) -> &CalibrationDocument {
        &self.calibration
    }

    /// Id of the open session, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.sessions.session_id()
    }

    /// Session log writer.
    pub fn logger(&self) -> &SampleLogger {
        &self.logger
    }

    /// Run one poll cycle and return its record.
    pub async fn read_sensors(&mut self) -> SampleRecord {
        let now_ns = self.clock.now_ns();
        let read_interval_s = match self.last_poll_ns {
            Some(last) => now_ns.saturating_sub(last) as f64 / 1e9,
            None => self.poll_interval.as_secs_f64(),
        };

        let rpm: Vec<u32> = self
            .estimators
            .iter_mut()
            .map(|estimator| estimator.read(read_interval_s))
            .collect();
        let pressures = self.read_pressures().await;
        let temperatures = self.read_temperatures().await;

        let time = Utc::now();
        self.sessions.begin_cycle(&rpm, time);

        let record = SampleRecord {
            session_id: self.sessions.session_id().map(str::to_string),
            rpm,
            temperatures,
            pressures,
            time,
        };

        if let Some(session_id) = record.session_id.as_deref() {
            self.logger.append(session_id, &record);
        }

        self.sessions.end_cycle(&record.rpm);
        self.last_poll_ns = Some(now_ns);

        tracing::debug!(
            rpm = ?record.rpm,
            session_id = record.session_id.as_deref().unwrap_or("-"),
            read_interval_s,
            "poll cycle complete"
        );
        record
    }

    async fn read_pressures(&self) -> Vec<PressureSample> {
        let calibration = Arc::clone(&self.calibration);
        let mut samples = Vec::with_capacity(calibration.pressure.len());

        for (channel, cal) in calibration.pressure.iter().enumerate() {
            let frame = match self.hardware.frames.fetch_frame(cal.bus, cal.address).await {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(channel, bus = cal.bus, address = cal.address, error = %e, "pressure channel unavailable");
                    samples.push(PressureSample::unavailable());
                    continue;
                }
            };

            let reading = decode(&frame, cal);
            if reading.status != SensorStatus::Normal {
                let e = DaqError::ProtocolFault(reading.status);
                tracing::warn!(channel, bus = cal.bus, address = cal.address, error = %e, "pressure reading withheld");
            }

            samples.push(PressureSample {
                reported_psi: reading.pressure_psi.map(|p| cal.reported(p)),
                absolute_psi: reading.pressure_psi,
                sensor_temperature_c: reading.temperature_c,
                status: Some(reading.status),
            });
        }
        samples
    }

    async fn read_temperatures(&mut self) -> Vec<Option<f64>> {
        let mut temperatures = Vec::with_capacity(self.probe_count);
        for index in 0..self.probe_count {
            let reading = if index < self.hardware.probes.probe_count() {
                self.hardware.probes.read_celsius(index).await
            } else {
                None
            };
            let value = reading.or(self.last_temperatures[index]);
            self.last_temperatures[index] = value;
            temperatures.push(value);
        }
        temperatures
    }

    /// Store `samples` as the ambient offsets of the pressure channels.
    ///
    /// Rewrites the calibration document on disk and then swaps the in-memory copy.
    /// Returns `false`, leaving the current calibration in place, when fewer samples
    /// than channels are given or the document cannot be read or written.
    pub fn zero_pressure(&mut self, samples: &[f64]) -> bool {
        match self.try_zero_pressure(samples) {
            Ok(()) => {
                tracing::info!(offsets = ?samples, "pressure zeroed");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "pressure zeroing rejected");
                false
            }
        }
    }

    fn try_zero_pressure(&mut self, samples: &[f64]) -> AppResult<()> {
        if samples.len() < self.calibration.pressure.len() {
            return Err(DaqError::Calibration(format!(
                "expected {} pressure samples, got {}",
                self.calibration.pressure.len(),
                samples.len()
            )));
        }

        let on_disk = match CalibrationDocument::load(&self.calibration_path) {
            Ok(document) => document,
            Err(DaqError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                (*self.calibration).clone()
            }
            Err(e) => return Err(e),
        };

        let updated = on_disk.with_offsets(samples)?;
        updated.save_atomic(&self.calibration_path)?;
        self.calibration = Arc::new(updated);
        Ok(())
    }

    /// Open the test valve.
    pub async fn open_valve(&self) -> AppResult<bool> {
        self.hardware.valve.set_open(true).await?;
        tracing::info!("valve opened");
        Ok(true)
    }

    /// Close the test valve.
    pub async fn close_valve(&self) -> AppResult<bool> {
        self.hardware.valve.set_open(false).await?;
        tracing::info!("valve closed");
        Ok(false)
    }
}
