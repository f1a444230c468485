//! One row of the session log.

use crate::measurement::frame::SensorStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Wall-clock format of the `time` column.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Pressure channel values for one poll.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PressureSample {
    /// Value after the channel's mode was applied (offset removed when relative).
    pub reported_psi: Option<f64>,
    /// Value as measured.
    pub absolute_psi: Option<f64>,
    /// Transducer membrane temperature.
    pub sensor_temperature_c: Option<f64>,
    /// Frame status, `None` when the bus transaction itself failed.
    pub status: Option<SensorStatus>,
}

impl PressureSample {
    /// A channel whose frame could not be fetched this cycle.
    pub fn unavailable() -> Self {
        Self {
            reported_psi: None,
            absolute_psi: None,
            sensor_temperature_c: None,
            status: None,
        }
    }
}

/// Everything captured in one poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRecord {
    /// Session the record belongs to, if one is active. Not written to the log.
    pub session_id: Option<String>,
    /// RPM per tachometer channel.
    pub rpm: Vec<u32>,
    /// Auxiliary probe temperatures in °C.
    pub temperatures: Vec<Option<f64>>,
    /// Pressure channels.
    pub pressures: Vec<PressureSample>,
    /// When the record was assembled.
    pub time: DateTime<Utc>,
}

/// Difference between two optional readings, missing operands counting as zero.
pub fn differential(first: Option<f64>, second: Option<f64>) -> f64 {
    second.unwrap_or(0.0) - first.unwrap_or(0.0)
}

impl SampleRecord {
    /// Temperature differentials for probe pairs (1,2), (3,4), ...
    pub fn temperature_diffs(&self) -> Vec<f64> {
        self.temperatures
            .chunks_exact(2)
            .map(|pair| differential(pair[0], pair[1]))
            .collect()
    }

    /// Reported pressure differentials for channel pairs (1,2), (3,4), ...
    pub fn pressure_diffs(&self) -> Vec<f64> {
        self.pressures
            .chunks_exact(2)
            .map(|pair| differential(pair[0].reported_psi, pair[1].reported_psi))
            .collect()
    }

    /// Whether any tachometer channel reads above zero.
    pub fn is_rotating(&self) -> bool {
        self.rpm.iter().any(|&rpm| rpm > 0)
    }

    /// Column names matching [`csv_row`](Self::csv_row).
    pub fn csv_header(&self) -> Vec<String> {
        let mut header = Vec::new();
        header.extend((1..=self.rpm.len()).map(|i| format!("rpm_{i}")));
        header.extend((1..=self.temperatures.len()).map(|i| format!("temperature_{i}")));
        for i in 1..=self.pressures.len() {
            header.push(format!("pressure_{i}"));
            header.push(format!("pressure_{i}_absolute"));
            header.push(format!("pressure_{i}_temperature"));
            header.push(format!("pressure_{i}_status"));
        }
        header.extend(pair_names("temperature_diff", self.temperatures.len()));
        header.extend(pair_names("pressure_diff", self.pressures.len()));
        header.push("time".to_string());
        header
    }

    /// Row values; missing readings are empty cells.
    pub fn csv_row(&self) -> Vec<String> {
        let mut row = Vec::new();
        row.extend(self.rpm.iter().map(u32::to_string));
        row.extend(self.temperatures.iter().map(|t| optional(*t)));
        for pressure in &self.pressures {
            row.push(optional(pressure.reported_psi));
            row.push(optional(pressure.absolute_psi));
            row.push(optional(pressure.sensor_temperature_c));
            row.push(pressure.status.map(|s| s.to_string()).unwrap_or_default());
        }
        row.extend(self.temperature_diffs().iter().map(f64::to_string));
        row.extend(self.pressure_diffs().iter().map(f64::to_string));
        row.push(self.time.format(TIME_FORMAT).to_string());
        row
    }
}

fn pair_names(prefix: &str, channels: usize) -> impl Iterator<Item = String> + '_ {
    (0..channels / 2).map(move |pair| format!("{prefix}_{}_{}", pair * 2 + 1, pair * 2 + 2))
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> SampleRecord {
        SampleRecord {
            session_id: Some("2024-05-01_10.00.00".to_string()),
            rpm: vec![1000, 0],
            temperatures: vec![Some(20.5), None, Some(18.0)],
            pressures: vec![
                PressureSample {
                    reported_psi: Some(1.5),
                    absolute_psi: Some(16.2),
                    sensor_temperature_c: Some(22.0),
                    status: Some(SensorStatus::Normal),
                },
                PressureSample::unavailable(),
            ],
            time: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 7).unwrap(),
        }
    }

    #[test]
    fn test_header_layout() {
        let header = record().csv_header();
        assert_eq!(
            header,
            vec![
                "rpm_1",
                "rpm_2",
                "temperature_1",
                "temperature_2",
                "temperature_3",
                "pressure_1",
                "pressure_1_absolute",
                "pressure_1_temperature",
                "pressure_1_status",
                "pressure_2",
                "pressure_2_absolute",
                "pressure_2_temperature",
                "pressure_2_status",
                "temperature_diff_1_2",
                "pressure_diff_1_2",
                "time",
            ]
        );
    }

    #[test]
    fn test_row_matches_header() {
        let record = record();
        let row = record.csv_row();
        assert_eq!(row.len(), record.csv_header().len());
        assert_eq!(row[0], "1000");
        assert_eq!(row[3], "");
        assert_eq!(row[8], "normal");
        assert_eq!(row[9], "");
        assert_eq!(row.last().unwrap(), "2024-05-01 10:00:07");
    }

    #[test]
    fn test_differentials_treat_missing_as_zero() {
        let record = record();
        assert_eq!(record.temperature_diffs(), vec![-20.5]);
        assert_eq!(record.pressure_diffs(), vec![-1.5]);
        // Primary readings stay untouched.
        assert_eq!(record.temperatures[1], None);
        assert_eq!(record.pressures[1].reported_psi, None);
    }

    #[test]
    fn test_is_rotating() {
        let mut record = record();
        assert!(record.is_rotating());
        record.rpm = vec![0, 0];
        assert!(!record.is_rotating());
    }
}
