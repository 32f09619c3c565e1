/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::atomic::{AtomicI64, Ordering};

use super::CounterMetric;

#[derive(Default)]
pub struct Counter {
    value: AtomicI64,
}

impl Counter {
    pub fn new() -> Self {
        Counter::default()
    }

    pub fn inc(&self) {
        self.add(1);
    }

    pub fn add(&self, n: i64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

impl CounterMetric for Counter {
    fn count(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}
