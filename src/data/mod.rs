//! Statistics on buffered samples and session persistence.

pub mod outliers;
pub mod storage;

pub use outliers::filter_outliers;
pub use storage::SampleLogger;
