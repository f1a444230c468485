//! Sensor frame decoding and the per-cycle sample record.

pub mod frame;
pub mod record;

pub use frame::{decode, EngineeringReading, SensorFrame, SensorStatus};
pub use record::{PressureSample, SampleRecord};
