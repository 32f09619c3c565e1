/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::ProcessResourceSource;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GcStats {
    pub time_ms: i64,
    pub runs: i64,
}

/// Process level resource usage at one instant.
///
/// Usage values are ratios in `0.0..=1.0`, thread states are the share of
/// threads in each state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceSnapshot {
    pub heap_usage: f64,
    pub non_heap_usage: f64,
    pub memory_pool_usage: Vec<(String, f64)>,
    pub daemon_thread_count: i64,
    pub thread_count: i64,
    pub uptime_secs: i64,
    pub fd_usage: f64,
    pub thread_states: Vec<(String, f64)>,
    pub garbage_collectors: Vec<(String, GcStats)>,
}

pub trait ResourceSource: Send + Sync {
    fn snapshot(&self) -> io::Result<ResourceSnapshot>;
}

/// A source returning the same snapshot every time.
pub struct FixedResourceSource {
    snapshot: ResourceSnapshot,
}

impl FixedResourceSource {
    pub fn new(snapshot: ResourceSnapshot) -> Self {
        FixedResourceSource { snapshot }
    }
}

impl ResourceSource for FixedResourceSource {
    fn snapshot(&self) -> io::Result<ResourceSnapshot> {
        Ok(self.snapshot.clone())
    }
}
