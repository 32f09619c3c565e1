/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod clock;
pub use clock::{Clock, SystemClock};

mod name;
pub use name::MetricName;

pub mod metric;
pub use metric::{
    Counter, CounterMetric, FnGauge, GaugeError, GaugeMetric, GaugeValue, Histogram, Meter,
    MeteredMetric, MetricHandle, MetricKind, SampledMetric, Snapshot, Timer, TimerMetric,
};

mod registry;
pub use registry::{GroupedMetrics, MetricRegistry, Registry, RegistryError};

pub mod resource;
pub use resource::{FixedResourceSource, GcStats, ResourceSnapshot, ResourceSource};
