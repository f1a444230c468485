//! Tachometer pulse capture and RPM estimation.
//!
//! Each RPM channel is split into two halves that share a bounded single-producer /
//! single-consumer ring and an atomic last-trigger stamp:
//!
//! - [`TachometerCounter`] lives in the edge-interrupt context. On every falling edge it
//!   reads the clock, pushes the period since the previous edge and stores the new
//!   trigger time. It never blocks and never allocates.
//! - [`RpmEstimator`] lives in the poll context. Once per tick it drains every period
//!   present at that moment, rejects outliers with Chauvenet's criterion and turns the
//!   mean period into an integer RPM.
//!
//! The drain takes a snapshot of the ring length and pops exactly that many periods,
//! so a pulse recorded concurrently is either part of this reading or the next one;
//! nothing is cleared in place underneath the producer.

use crate::clock::Clock;
use crate::data::outliers::{filter_outliers, mean};
use crate::error::{AppResult, DaqError};
use ringbuf::{HeapConsumer, HeapProducer, HeapRb};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Sentinel for "no edge seen yet".
const NEVER: u64 = u64::MAX;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Tuning for [`RpmEstimator`].
#[derive(Debug, Clone, Copy)]
pub struct EstimatorParams {
    /// No edge for longer than this means the rotor has stopped.
    pub stall_timeout: Duration,
    /// A reading with fewer than `expected_samples / noise_divisor` periods is
    /// treated as vibration noise.
    pub noise_divisor: f64,
}

impl Default for EstimatorParams {
    fn default() -> Self {
        Self {
            stall_timeout: Duration::from_secs(2),
            noise_divisor: 3.0,
        }
    }
}

/// Create the producer and consumer halves for one RPM channel.
pub fn pulse_channel(
    channel: usize,
    pin: u8,
    capacity: usize,
    clock: Arc<dyn Clock>,
    params: EstimatorParams,
) -> (TachometerCounter, RpmEstimator) {
    let (producer, consumer) = HeapRb::<u64>::new(capacity.max(1)).split();
    let last_trigger = Arc::new(AtomicU64::new(NEVER));

    let counter = TachometerCounter {
        channel,
        pin,
        producer,
        last_trigger: Arc::clone(&last_trigger),
        clock: Arc::clone(&clock),
    };
    let estimator = RpmEstimator {
        channel,
        consumer,
        last_trigger,
        clock,
        params,
        previous_rpm: None,
    };
    (counter, estimator)
}

/// Interrupt-side half of an RPM channel.
pub struct TachometerCounter {
    channel: usize,
    pin: u8,
    producer: HeapProducer<u64>,
    last_trigger: Arc<AtomicU64>,
    clock: Arc<dyn Clock>,
}

impl TachometerCounter {
    /// GPIO pin this counter listens on.
    pub fn pin(&self) -> u8 {
        self.pin
    }

    /// Falling-edge callback entry point.
    pub fn on_edge(&mut self, pin: u8) {
        if pin != self.pin {
            tracing::trace!(channel = self.channel, pin, "edge for a different pin ignored");
            return;
        }
        let now = self.clock.now_ns();
        self.record_edge_at(now);
    }

    /// Record an edge observed at `now_ns`.
    ///
    /// The first edge on a channel only arms `last_trigger`. A full ring drops the
    /// period.
    pub fn record_edge_at(&mut self, now_ns: u64) {
        let last = self.last_trigger.swap(now_ns, Ordering::AcqRel);
        if last == NEVER {
            return;
        }
        let period = now_ns.saturating_sub(last);
        if self.producer.push(period).is_err() {
            tracing::trace!(channel = self.channel, "pulse buffer full, period dropped");
        }
    }
}

/// Poll-side half of an RPM channel.
pub struct RpmEstimator {
    channel: usize,
    consumer: HeapConsumer<u64>,
    last_trigger: Arc<AtomicU64>,
    clock: Arc<dyn Clock>,
    params: EstimatorParams,
    previous_rpm: Option<u32>,
}

impl RpmEstimator {
    /// Channel index this estimator belongs to.
    pub fn channel(&self) -> usize {
        self.channel
    }

    /// RPM returned by the previous [`read`](Self::read), if any.
    pub fn previous_rpm(&self) -> Option<u32> {
        self.previous_rpm
    }

    /// Estimate the current RPM from the periods buffered since the last read.
    ///
    /// The buffer is emptied on every call whatever the outcome. Stalls, noise and
    /// degenerate statistics all read as zero.
    pub fn read(&mut self, read_interval_s: f64) -> u32 {
        let now = self.clock.now_ns();
        let periods = self.drain();
        let last = self.last_trigger.load(Ordering::Acquire);

        let stall_ns = u64::try_from(self.params.stall_timeout.as_nanos()).unwrap_or(u64::MAX);
        let rpm = if last == NEVER || now.saturating_sub(last) > stall_ns {
            0
        } else {
            match estimate_rpm(&periods, read_interval_s, self.params.noise_divisor) {
                Ok(rpm) => rpm,
                Err(e) => {
                    tracing::debug!(channel = self.channel, error = %e, "rpm reading discarded");
                    0
                }
            }
        };

        self.previous_rpm = Some(rpm);
        rpm
    }

    /// Pop exactly the periods that were buffered when the drain started.
    fn drain(&mut self) -> Vec<u64> {
        let pending = self.consumer.len();
        let mut periods = Vec::with_capacity(pending);
        for _ in 0..pending {
            match self.consumer.pop() {
                Some(period) => periods.push(period),
                None => break,
            }
        }
        periods
    }
}

/// Turn raw periods (ns) into an RPM estimate.
///
/// Returns `Ok(0)` when there are far fewer periods than the mean period predicts for
/// `read_interval_s` (a vibration spike rather than rotation), and
/// [`DaqError::NumericDegenerate`] when no usable mean period exists.
pub fn estimate_rpm(periods_ns: &[u64], read_interval_s: f64, noise_divisor: f64) -> AppResult<u32> {
    let samples: Vec<f64> = periods_ns.iter().map(|&p| p as f64).collect();
    let valid = filter_outliers(&samples);

    let mean_ns = mean(&valid).ok_or(DaqError::NumericDegenerate("no valid periods"))?;
    if !mean_ns.is_finite() || mean_ns <= 0.0 {
        return Err(DaqError::NumericDegenerate("non-positive mean period"));
    }

    let mean_s = mean_ns / NANOS_PER_SECOND;
    let expected_samples = read_interval_s / mean_s;
    if expected_samples.is_nan() {
        return Err(DaqError::NumericDegenerate("undefined expected sample count"));
    }

    if (periods_ns.len() as f64) < expected_samples / noise_divisor {
        return Ok(0);
    }

    let rpm = (60.0 / mean_s).round();
    Ok(rpm.clamp(0.0, f64::from(u32::MAX)) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const PERIOD_1000_RPM: u64 = 60_000_000;

    fn channel(clock: &ManualClock) -> (TachometerCounter, RpmEstimator) {
        pulse_channel(0, 17, 64, Arc::new(clock.clone()), EstimatorParams::default())
    }

    fn spin(counter: &mut TachometerCounter, clock: &ManualClock, edges: usize, period: u64) {
        for _ in 0..edges {
            clock.advance(Duration::from_nanos(period));
            counter.record_edge_at(clock.now_ns());
        }
    }

    #[test]
    fn test_steady_rotation() {
        let periods = vec![PERIOD_1000_RPM; 20];
        assert_eq!(estimate_rpm(&periods, 1.2, 3.0).unwrap(), 1000);
    }

    #[test]
    fn test_sixty_hertz_rotation() {
        let periods = vec![16_666_667; 60];
        assert_eq!(estimate_rpm(&periods, 1.0, 3.0).unwrap(), 3600);
    }

    #[test]
    fn test_too_few_samples_is_noise() {
        // Two periods of 60 ms over a 1.2 s window: 20 expected, 2 < 20 / 3.
        let periods = vec![PERIOD_1000_RPM; 2];
        assert_eq!(estimate_rpm(&periods, 1.2, 3.0).unwrap(), 0);
    }

    #[test]
    fn test_no_periods_is_degenerate() {
        assert!(matches!(
            estimate_rpm(&[], 1.0, 3.0),
            Err(DaqError::NumericDegenerate(_))
        ));
    }

    #[test]
    fn test_zero_periods_are_degenerate() {
        assert!(matches!(
            estimate_rpm(&[0, 0, 0], 1.0, 3.0),
            Err(DaqError::NumericDegenerate(_))
        ));
    }

    #[test]
    fn test_outlier_does_not_skew_estimate() {
        let mut periods = vec![PERIOD_1000_RPM; 19];
        periods.push(PERIOD_1000_RPM * 10);
        assert_eq!(estimate_rpm(&periods, 1.2, 3.0).unwrap(), 1000);
    }

    #[test]
    fn test_read_after_edges() {
        let clock = ManualClock::new(1_000);
        let (mut counter, mut estimator) = channel(&clock);

        // 21 edges -> 20 periods; the first edge only arms the counter.
        counter.record_edge_at(clock.now_ns());
        spin(&mut counter, &clock, 20, PERIOD_1000_RPM);

        assert_eq!(estimator.read(1.2), 1000);
        assert_eq!(estimator.previous_rpm(), Some(1000));
    }

    #[test]
    fn test_buffer_cleared_every_read() {
        let clock = ManualClock::new(1_000);
        let (mut counter, mut estimator) = channel(&clock);

        counter.record_edge_at(clock.now_ns());
        spin(&mut counter, &clock, 20, PERIOD_1000_RPM);
        assert_eq!(estimator.read(1.2), 1000);

        // Nothing new buffered: no mean period, so zero.
        assert_eq!(estimator.read(1.2), 0);
    }

    #[test]
    fn test_stall_overrides_buffered_periods() {
        let clock = ManualClock::new(1_000);
        let (mut counter, mut estimator) = channel(&clock);

        counter.record_edge_at(clock.now_ns());
        spin(&mut counter, &clock, 20, PERIOD_1000_RPM);
        clock.advance(Duration::from_nanos(2_000_000_001));

        assert_eq!(estimator.read(1.2), 0);
        // The stalled read still emptied the buffer.
        assert!(estimator.drain().is_empty());
    }

    #[test]
    fn test_never_triggered_reads_zero() {
        let clock = ManualClock::new(5);
        let (_counter, mut estimator) = channel(&clock);
        assert_eq!(estimator.read(1.0), 0);
    }

    #[test]
    fn test_first_edge_only_arms() {
        let clock = ManualClock::new(3_000_000_000);
        let (mut counter, mut estimator) = channel(&clock);
        counter.record_edge_at(clock.now_ns());
        assert_eq!(estimator.drain(), Vec::<u64>::new());
    }

    #[test]
    fn test_full_buffer_drops_periods() {
        let clock = ManualClock::new(0);
        let (mut counter, mut estimator) =
            pulse_channel(1, 27, 4, Arc::new(clock.clone()), EstimatorParams::default());
        counter.record_edge_at(0);
        spin(&mut counter, &clock, 10, 1_000);
        assert_eq!(estimator.drain().len(), 4);
    }

    #[test]
    fn test_edge_for_other_pin_ignored() {
        let clock = ManualClock::new(0);
        let (mut counter, mut estimator) = channel(&clock);
        counter.on_edge(17);
        clock.advance(Duration::from_millis(60));
        counter.on_edge(22);
        clock.advance(Duration::from_millis(60));
        counter.on_edge(17);
        assert_eq!(estimator.drain(), vec![120_000_000]);
    }

    #[test]
    fn test_concurrent_producer_and_consumer() {
        let clock = ManualClock::new(0);
        let (mut counter, mut estimator) =
            pulse_channel(0, 17, 1024, Arc::new(clock.clone()), EstimatorParams::default());

        let producer = std::thread::spawn(move || {
            for i in 0..500u64 {
                counter.record_edge_at(i * 1_000);
            }
        });

        let mut drained = 0;
        while drained < 499 {
            drained += estimator.drain().len();
            std::thread::yield_now();
        }
        producer.join().unwrap();
        assert_eq!(drained, 499);
    }
}
