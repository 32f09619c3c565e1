/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::time::Instant;

use chrono::Utc;

/// Time source shared by meters and the reporter.
///
/// `tick` is a monotonic nanosecond counter used for rate math, `time_millis`
/// is the wall clock used to stamp points.
pub trait Clock: Send + Sync {
    fn tick(&self) -> u64;
    fn time_millis(&self) -> i64;
}

pub struct SystemClock {
    anchor: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            anchor: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        SystemClock::new()
    }
}

impl Clock for SystemClock {
    fn tick(&self) -> u64 {
        // u64 nanoseconds cover more than 500 years of process lifetime
        self.anchor.elapsed().as_nanos() as u64
    }

    fn time_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}
