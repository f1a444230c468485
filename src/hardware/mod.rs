//! Hardware collaborators
//!
//! Capability traits for the bus, probes, valve and edge interrupts, the transducer
//! transaction sequence built on top of a raw I2C transport, and mock implementations.

pub mod capabilities;
pub mod mock;
pub mod transducer;

pub use capabilities::{
    EdgeHandler, EdgeInterrupts, FrameSource, I2cTransport, TemperatureProbes, ValveActuator,
};
pub use transducer::TransducerBus;
