/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

mod counter;
pub use counter::Counter;

mod gauge;
pub use gauge::{FnGauge, GaugeError, GaugeValue};

mod ewma;

mod meter;
pub use meter::Meter;

mod histogram;
pub use histogram::{Histogram, Snapshot};

mod timer;
pub use timer::Timer;

pub trait CounterMetric: Send + Sync {
    fn count(&self) -> i64;
}

pub trait GaugeMetric: Send + Sync {
    fn value(&self) -> Result<GaugeValue, GaugeError>;
}

/// A metric counting events and exposing per second rates.
pub trait MeteredMetric: Send + Sync {
    fn event_type(&self) -> &str;
    fn count(&self) -> i64;
    fn mean_rate(&self) -> f64;
    fn one_minute_rate(&self) -> f64;
    fn five_minute_rate(&self) -> f64;
    fn fifteen_minute_rate(&self) -> f64;
}

/// A metric exposing a value distribution.
pub trait SampledMetric: Send + Sync {
    fn max(&self) -> f64;
    fn min(&self) -> f64;
    fn mean(&self) -> f64;
    fn std_dev(&self) -> f64;
    fn sum(&self) -> f64;
    fn snapshot(&self) -> Snapshot;
}

pub trait TimerMetric: MeteredMetric + SampledMetric {}

impl<T: MeteredMetric + SampledMetric> TimerMetric for T {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Meter,
    Histogram,
    Timer,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Meter => "meter",
            MetricKind::Histogram => "histogram",
            MetricKind::Timer => "timer",
        }
    }
}

/// Opaque handle to one registered metric.
#[derive(Clone)]
pub enum MetricHandle {
    Counter(Arc<dyn CounterMetric>),
    Gauge(Arc<dyn GaugeMetric>),
    Meter(Arc<dyn MeteredMetric>),
    Histogram(Arc<dyn SampledMetric>),
    Timer(Arc<dyn TimerMetric>),
}

impl MetricHandle {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricHandle::Counter(_) => MetricKind::Counter,
            MetricHandle::Gauge(_) => MetricKind::Gauge,
            MetricHandle::Meter(_) => MetricKind::Meter,
            MetricHandle::Histogram(_) => MetricKind::Histogram,
            MetricHandle::Timer(_) => MetricKind::Timer,
        }
    }
}
