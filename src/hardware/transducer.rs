//! Digital pressure/temperature transducer frame fetch
//!
//! Protocol Overview:
//! - 7-bit I2C address, typically 0x28
//! - Quick write (READ_MR) wakes the device and starts a measurement + DSP cycle
//! - After a settle delay of at least 2 ms, a 4-byte read (READ_DF4) returns
//!   2 status bits, 14 pressure bits, 11 temperature bits and 5 padding bits
//!
//! This module only sequences the transaction; [`crate::measurement::frame`] turns the
//! bytes into engineering units.

use crate::error::{AppResult, DaqError};
use crate::hardware::capabilities::{FrameSource, I2cTransport};
use crate::measurement::frame::{SensorFrame, FRAME_LEN};
use async_trait::async_trait;
use std::time::Duration;

/// Minimum wait between wake and read.
pub const MIN_SETTLE_DELAY: Duration = Duration::from_millis(2);

/// [`FrameSource`] that drives the transducer over an [`I2cTransport`].
pub struct TransducerBus<T> {
    transport: T,
    settle_delay: Duration,
}

impl<T: I2cTransport> TransducerBus<T> {
    /// Wrap `transport` with the minimum settle delay.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            settle_delay: MIN_SETTLE_DELAY,
        }
    }

    /// Use a longer settle delay; values below the minimum are raised to it.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay.max(MIN_SETTLE_DELAY);
        self
    }

    /// Borrow the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[async_trait]
impl<T: I2cTransport> FrameSource for TransducerBus<T> {
    async fn fetch_frame(&self, bus: u8, address: u8) -> AppResult<SensorFrame> {
        if let Err(e) = self.transport.write_quick(bus, address).await {
            tracing::debug!(bus, address, error = %e, "wake command not acknowledged");
            return Err(DaqError::BusConnect { bus, address });
        }

        tokio::time::sleep(self.settle_delay).await;

        let (count, bytes) = self.transport.read_device(bus, address, FRAME_LEN).await;
        if count < 0 {
            return Err(DaqError::BusTransfer {
                bus,
                address,
                detail: format!("read failed with code {count}"),
            });
        }

        let frame: SensorFrame = bytes
            .get(..FRAME_LEN)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| DaqError::BusTransfer {
                bus,
                address,
                detail: format!("short read: {count} of {FRAME_LEN} bytes"),
            })?;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::MockI2cBus;

    #[tokio::test]
    async fn test_fetch_frame() {
        let i2c = MockI2cBus::new();
        i2c.set_frame(1, 0x28, [0x04, 0x18, 0x5C, 0x70]);
        let bus = TransducerBus::new(i2c);

        let frame = bus.fetch_frame(1, 0x28).await.unwrap();
        assert_eq!(frame, [0x04, 0x18, 0x5C, 0x70]);
        assert_eq!(bus.transport().wake_count(1, 0x28), 1);
    }

    #[tokio::test]
    async fn test_missing_device_is_connect_error() {
        let bus = TransducerBus::new(MockI2cBus::new());
        assert!(matches!(
            bus.fetch_frame(3, 0x28).await,
            Err(DaqError::BusConnect { bus: 3, address: 0x28 })
        ));
    }

    #[tokio::test]
    async fn test_negative_count_is_transfer_error() {
        let i2c = MockI2cBus::new();
        i2c.set_frame(1, 0x28, [0; 4]);
        i2c.fail_reads(1, 0x28, -83);
        let bus = TransducerBus::new(i2c);

        match bus.fetch_frame(1, 0x28).await {
            Err(DaqError::BusTransfer { detail, .. }) => assert!(detail.contains("-83")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_settle_delay_is_respected() {
        let i2c = MockI2cBus::new();
        i2c.set_frame(1, 0x28, [0; 4]);
        let bus = TransducerBus::new(i2c).with_settle_delay(Duration::from_millis(0));

        let start = std::time::Instant::now();
        bus.fetch_frame(1, 0x28).await.unwrap();
        assert!(start.elapsed() >= MIN_SETTLE_DELAY);
    }
}
