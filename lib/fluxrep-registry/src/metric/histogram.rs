/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::{Mutex, MutexGuard};

use hdrhistogram::CreationError;

use super::SampledMetric;

/// Percentiles of a distribution at one instant.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub median: f64,
    pub p75: f64,
    pub p95: f64,
    pub p98: f64,
    pub p99: f64,
    pub p999: f64,
}

impl Snapshot {
    pub(super) fn scaled(self, divisor: f64) -> Self {
        Snapshot {
            median: self.median / divisor,
            p75: self.p75 / divisor,
            p95: self.p95 / divisor,
            p98: self.p98 / divisor,
            p99: self.p99 / divisor,
            p999: self.p999 / divisor,
        }
    }
}

struct HistogramInner {
    samples: hdrhistogram::Histogram<u64>,
    count: u64,
    sum: f64,
    min: u64,
    max: u64,
    // Welford running mean and sum of squared deltas
    mean: f64,
    m2: f64,
}

pub struct Histogram {
    inner: Mutex<HistogramInner>,
}

const DEFAULT_SIGFIG: u8 = 3;

impl Histogram {
    /// A histogram keeping 3 significant figures of its samples.
    pub fn new() -> Result<Self, CreationError> {
        Histogram::with_sigfig(DEFAULT_SIGFIG)
    }

    pub fn with_sigfig(sigfig: u8) -> Result<Self, CreationError> {
        let samples = hdrhistogram::Histogram::new(sigfig)?;
        Ok(Histogram {
            inner: Mutex::new(HistogramInner {
                samples,
                count: 0,
                sum: 0.0,
                min: 0,
                max: 0,
                mean: 0.0,
                m2: 0.0,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HistogramInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn update(&self, value: u64) {
        let mut inner = self.lock();
        let _ = inner.samples.record(value);

        if inner.count == 0 {
            inner.min = value;
            inner.max = value;
        } else {
            inner.min = inner.min.min(value);
            inner.max = inner.max.max(value);
        }
        inner.count += 1;
        inner.sum += value as f64;

        let delta = value as f64 - inner.mean;
        inner.mean += delta / inner.count as f64;
        inner.m2 += delta * (value as f64 - inner.mean);
    }

    pub fn count(&self) -> u64 {
        self.lock().count
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.samples.reset();
        inner.count = 0;
        inner.sum = 0.0;
        inner.min = 0;
        inner.max = 0;
        inner.mean = 0.0;
        inner.m2 = 0.0;
    }
}

impl SampledMetric for Histogram {
    fn max(&self) -> f64 {
        self.lock().max as f64
    }

    fn min(&self) -> f64 {
        self.lock().min as f64
    }

    fn mean(&self) -> f64 {
        self.lock().mean
    }

    fn std_dev(&self) -> f64 {
        let inner = self.lock();
        if inner.count > 1 {
            (inner.m2 / (inner.count - 1) as f64).sqrt()
        } else {
            0.0
        }
    }

    fn sum(&self) -> f64 {
        self.lock().sum
    }

    fn snapshot(&self) -> Snapshot {
        let inner = self.lock();
        let samples = &inner.samples;
        Snapshot {
            median: samples.value_at_quantile(0.5) as f64,
            p75: samples.value_at_quantile(0.75) as f64,
            p95: samples.value_at_quantile(0.95) as f64,
            p98: samples.value_at_quantile(0.98) as f64,
            p99: samples.value_at_quantile(0.99) as f64,
            p999: samples.value_at_quantile(0.999) as f64,
        }
    }
}
