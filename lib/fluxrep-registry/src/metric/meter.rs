/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use super::MeteredMetric;
use super::ewma::{Ewma, TICK_INTERVAL_NANOS};
use crate::Clock;

pub struct Meter {
    event_type: String,
    clock: Arc<dyn Clock>,
    count: AtomicI64,
    start_tick: u64,
    last_tick: AtomicU64,
    m1_rate: Ewma,
    m5_rate: Ewma,
    m15_rate: Ewma,
}

impl Meter {
    pub fn new(event_type: &str, clock: Arc<dyn Clock>) -> Self {
        let start_tick = clock.tick();
        Meter {
            event_type: event_type.to_string(),
            clock,
            count: AtomicI64::new(0),
            start_tick,
            last_tick: AtomicU64::new(start_tick),
            m1_rate: Ewma::one_minute(),
            m5_rate: Ewma::five_minutes(),
            m15_rate: Ewma::fifteen_minutes(),
        }
    }

    pub fn mark(&self) {
        self.mark_n(1);
    }

    pub fn mark_n(&self, n: i64) {
        self.tick_if_necessary();
        self.count.fetch_add(n, Ordering::Relaxed);
        self.m1_rate.update(n);
        self.m5_rate.update(n);
        self.m15_rate.update(n);
    }

    fn tick_if_necessary(&self) {
        let old_tick = self.last_tick.load(Ordering::Acquire);
        let new_tick = self.clock.tick();
        let age = new_tick.saturating_sub(old_tick);
        if age <= TICK_INTERVAL_NANOS {
            return;
        }

        let new_interval_start = new_tick - age % TICK_INTERVAL_NANOS;
        // only the thread winning the swap replays the missed ticks
        if self
            .last_tick
            .compare_exchange(
                old_tick,
                new_interval_start,
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_ok()
        {
            let required_ticks = age / TICK_INTERVAL_NANOS;
            for _ in 0..required_ticks {
                self.m1_rate.tick();
                self.m5_rate.tick();
                self.m15_rate.tick();
            }
        }
    }
}

impl MeteredMetric for Meter {
    fn event_type(&self) -> &str {
        &self.event_type
    }

    fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }

    fn mean_rate(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }
        let elapsed = self.clock.tick().saturating_sub(self.start_tick);
        if elapsed == 0 {
            return 0.0;
        }
        count as f64 / (elapsed as f64 / 1e9)
    }

    fn one_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m1_rate.rate()
    }

    fn five_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m5_rate.rate()
    }

    fn fifteen_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m15_rate.rate()
    }
}
