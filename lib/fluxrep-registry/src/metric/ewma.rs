/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use portable_atomic::AtomicF64;

pub(super) const TICK_INTERVAL_NANOS: u64 = 5_000_000_000;
const TICK_INTERVAL_SECS: f64 = 5.0;

/// Exponentially weighted moving average of an event rate, fed in fixed
/// 5 second ticks.
pub(super) struct Ewma {
    alpha: f64,
    uncounted: AtomicI64,
    rate: AtomicF64,
    initialized: AtomicBool,
}

impl Ewma {
    pub(super) fn with_minutes(minutes: f64) -> Self {
        Ewma {
            alpha: 1.0 - (-TICK_INTERVAL_SECS / 60.0 / minutes).exp(),
            uncounted: AtomicI64::new(0),
            rate: AtomicF64::new(0.0),
            initialized: AtomicBool::new(false),
        }
    }

    pub(super) fn one_minute() -> Self {
        Ewma::with_minutes(1.0)
    }

    pub(super) fn five_minutes() -> Self {
        Ewma::with_minutes(5.0)
    }

    pub(super) fn fifteen_minutes() -> Self {
        Ewma::with_minutes(15.0)
    }

    pub(super) fn update(&self, n: i64) {
        self.uncounted.fetch_add(n, Ordering::Relaxed);
    }

    /// Must only be called by one thread at a time.
    pub(super) fn tick(&self) {
        let count = self.uncounted.swap(0, Ordering::Relaxed);
        let instant_rate = count as f64 / TICK_INTERVAL_SECS;
        if self.initialized.load(Ordering::Relaxed) {
            let rate = self.rate.load(Ordering::Relaxed);
            self.rate
                .store(rate + self.alpha * (instant_rate - rate), Ordering::Relaxed);
        } else {
            self.rate.store(instant_rate, Ordering::Relaxed);
            self.initialized.store(true, Ordering::Relaxed);
        }
    }

    /// Events per second.
    pub(super) fn rate(&self) -> f64 {
        self.rate.load(Ordering::Relaxed)
    }
}
