//! Decoding of the 4-byte pressure/temperature transfer frame.
//!
//! Frame layout (big-endian bit order):
//!
//! ```text
//! byte 0: S1 S0 P13..P8      status bits + pressure high bits
//! byte 1: P7..P0             pressure low bits
//! byte 2: T10..T3            temperature high bits
//! byte 3: T2 T1 T0 x x x x x temperature low bits, remainder ignored
//! ```
//!
//! Pressure is scaled linearly between the device counts `counts_min` (P1, 0 % of span)
//! and `counts_max` (P2, 100 % of span) onto the configured `p_min..p_max`.
//! Temperature spans -50..150 °C over 11 bits.

use crate::calibration::PressureChannelCalibration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of one transfer frame in bytes.
pub const FRAME_LEN: usize = 4;

/// Raw frame as read from the bus.
pub type SensorFrame = [u8; FRAME_LEN];

const PRESSURE_MASK: u16 = 0x3FFF;
const TEMPERATURE_SCOPE: f64 = 200.0;
const TEMPERATURE_SPAN: f64 = 2048.0;
const TEMPERATURE_FLOOR: f64 = 50.0;

/// Health code carried in the two top bits of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorStatus {
    /// `00`: valid data.
    Normal,
    /// `01`: reserved by the manufacturer.
    Reserved,
    /// `10`: data already fetched since the last measurement cycle.
    Stale,
    /// `11`: sensor fault.
    Fault,
}

impl SensorStatus {
    /// Status from the top two bits of the first frame byte.
    pub fn from_first_byte(byte: u8) -> Self {
        match byte >> 6 {
            0b00 => SensorStatus::Normal,
            0b01 => SensorStatus::Reserved,
            0b10 => SensorStatus::Stale,
            _ => SensorStatus::Fault,
        }
    }
}

impl fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorStatus::Normal => "normal",
            SensorStatus::Reserved => "reserved",
            SensorStatus::Stale => "stale",
            SensorStatus::Fault => "fault",
        };
        f.write_str(name)
    }
}

/// Decoded frame in engineering units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineeringReading {
    /// Pressure in psi, `None` unless status is normal.
    pub pressure_psi: Option<f64>,
    /// Membrane temperature in °C, `None` unless status is normal.
    pub temperature_c: Option<f64>,
    /// Reported even when the values are withheld.
    pub status: SensorStatus,
}

/// Raw 14-bit pressure count.
pub fn pressure_count(frame: &SensorFrame) -> u16 {
    ((u16::from(frame[0]) << 8) | u16::from(frame[1])) & PRESSURE_MASK
}

/// Raw 11-bit temperature count.
pub fn temperature_count(frame: &SensorFrame) -> u16 {
    (u16::from(frame[2]) << 3) | (u16::from(frame[3]) >> 5)
}

/// Decode a frame using the channel's span.
pub fn decode(frame: &SensorFrame, calibration: &PressureChannelCalibration) -> EngineeringReading {
    let status = SensorStatus::from_first_byte(frame[0]);
    if status != SensorStatus::Normal {
        return EngineeringReading {
            pressure_psi: None,
            temperature_c: None,
            status,
        };
    }

    let counts = f64::from(pressure_count(frame));
    let p1 = f64::from(calibration.counts_min);
    let p2 = f64::from(calibration.counts_max);
    let pressure_psi =
        (counts - p1) * (calibration.p_max - calibration.p_min) / (p2 - p1) + calibration.p_min;

    let temperature_c =
        f64::from(temperature_count(frame)) * TEMPERATURE_SCOPE / TEMPERATURE_SPAN - TEMPERATURE_FLOOR;

    EngineeringReading {
        pressure_psi: Some(pressure_psi),
        temperature_c: Some(temperature_c),
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: SensorFrame = [0x04, 0x18, 0x5C, 0x70];

    #[test]
    fn test_counts() {
        assert_eq!(pressure_count(&SAMPLE), 1048);
        assert_eq!(temperature_count(&SAMPLE), 739);
    }

    #[test]
    fn test_decode_normal_frame() {
        let reading = decode(&SAMPLE, &PressureChannelCalibration::default());
        assert_eq!(reading.status, SensorStatus::Normal);

        let temperature = reading.temperature_c.unwrap();
        assert!((temperature - 22.168).abs() < 0.01, "got {temperature}");

        // (1048 - 1000) * 100 / 14000
        let pressure = reading.pressure_psi.unwrap();
        assert!((pressure - 0.342_857).abs() < 1e-5, "got {pressure}");
    }

    #[test]
    fn test_full_span() {
        let calibration = PressureChannelCalibration::default();
        // 15000 = 0x3A98
        let reading = decode(&[0x3A, 0x98, 0x00, 0x00], &calibration);
        assert!((reading.pressure_psi.unwrap() - 100.0).abs() < 1e-9);
        assert!((reading.temperature_c.unwrap() + 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_fault_withholds_values() {
        let reading = decode(&[0xC4, 0x18, 0x5C, 0x70], &PressureChannelCalibration::default());
        assert_eq!(reading.status, SensorStatus::Fault);
        assert_eq!(reading.pressure_psi, None);
        assert_eq!(reading.temperature_c, None);
    }

    #[test]
    fn test_status_bits() {
        assert_eq!(SensorStatus::from_first_byte(0x3F), SensorStatus::Normal);
        assert_eq!(SensorStatus::from_first_byte(0x40), SensorStatus::Reserved);
        assert_eq!(SensorStatus::from_first_byte(0x80), SensorStatus::Stale);
        assert_eq!(SensorStatus::from_first_byte(0xFF), SensorStatus::Fault);
    }

    #[test]
    fn test_stale_frame_reports_status() {
        let reading = decode(&[0x84, 0x18, 0x5C, 0x70], &PressureChannelCalibration::default());
        assert_eq!(reading.status, SensorStatus::Stale);
        assert!(reading.pressure_psi.is_none());
    }
}
