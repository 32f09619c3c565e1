/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;
use std::time::{Duration, Instant};

use hdrhistogram::CreationError;

use super::{Histogram, Meter, MeteredMetric, SampledMetric, Snapshot};
use crate::Clock;

const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// A meter of calls combined with a distribution of their durations.
///
/// Durations are recorded in nanoseconds and reported in milliseconds.
pub struct Timer {
    meter: Meter,
    durations: Histogram,
}

impl Timer {
    pub fn new(clock: Arc<dyn Clock>) -> Result<Self, CreationError> {
        Ok(Timer {
            meter: Meter::new("calls", clock),
            durations: Histogram::new()?,
        })
    }

    pub fn update(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.durations.update(nanos);
        self.meter.mark();
    }

    pub fn time<F, T>(&self, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let start = Instant::now();
        let r = f();
        self.update(start.elapsed());
        r
    }
}

impl MeteredMetric for Timer {
    fn event_type(&self) -> &str {
        self.meter.event_type()
    }

    fn count(&self) -> i64 {
        self.meter.count()
    }

    fn mean_rate(&self) -> f64 {
        self.meter.mean_rate()
    }

    fn one_minute_rate(&self) -> f64 {
        self.meter.one_minute_rate()
    }

    fn five_minute_rate(&self) -> f64 {
        self.meter.five_minute_rate()
    }

    fn fifteen_minute_rate(&self) -> f64 {
        self.meter.fifteen_minute_rate()
    }
}

impl SampledMetric for Timer {
    fn max(&self) -> f64 {
        self.durations.max() / NANOS_PER_MILLI
    }

    fn min(&self) -> f64 {
        self.durations.min() / NANOS_PER_MILLI
    }

    fn mean(&self) -> f64 {
        self.durations.mean() / NANOS_PER_MILLI
    }

    fn std_dev(&self) -> f64 {
        self.durations.std_dev() / NANOS_PER_MILLI
    }

    fn sum(&self) -> f64 {
        self.durations.sum() / NANOS_PER_MILLI
    }

    fn snapshot(&self) -> Snapshot {
        self.durations.snapshot().scaled(NANOS_PER_MILLI)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SystemClock;

    #[test]
    fn millis() {
        let timer = Timer::new(Arc::new(SystemClock::new())).unwrap();
        timer.update(Duration::from_millis(2));
        timer.update(Duration::from_millis(4));
        assert_eq!(timer.count(), 2);
        assert_eq!(timer.event_type(), "calls");
        assert_eq!(timer.min(), 2.0);
        assert_eq!(timer.max(), 4.0);
        assert_eq!(timer.sum(), 6.0);
        assert!((timer.mean() - 3.0).abs() < 1e-9);

        let p99 = timer.snapshot().p99;
        assert!((p99 - 4.0).abs() < 0.01);
    }

    #[test]
    fn time_closure() {
        let timer = Timer::new(Arc::new(SystemClock::new())).unwrap();
        let v = timer.time(|| 5);
        assert_eq!(v, 5);
        assert_eq!(timer.count(), 1);
    }
}
