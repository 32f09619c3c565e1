/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use hdrhistogram::CreationError;
use log::debug;
use thiserror::Error;

use crate::metric::{
    Counter, FnGauge, GaugeError, GaugeValue, Histogram, Meter, MetricHandle, MetricKind, Timer,
};
use crate::{Clock, MetricName, SystemClock};

/// Metrics grouped by category (see [`MetricName::category`]), both levels
/// sorted.
pub type GroupedMetrics = BTreeMap<String, BTreeMap<MetricName, MetricHandle>>;

/// Read side of a metrics registry, as seen by a reporter.
pub trait MetricRegistry: Send + Sync {
    /// A weakly consistent point in time view of every registered metric.
    fn grouped_metrics(&self) -> GroupedMetrics;
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("metric {name} is already registered as a {}", existing.as_str())]
    KindMismatch {
        name: String,
        existing: MetricKind,
    },
    #[error("failed to create sample storage: {0}")]
    Create(#[from] CreationError),
}

enum Entry {
    Counter(Arc<Counter>),
    Meter(Arc<Meter>),
    Histogram(Arc<Histogram>),
    Timer(Arc<Timer>),
    External(MetricHandle),
}

impl Entry {
    fn handle(&self) -> MetricHandle {
        match self {
            Entry::Counter(c) => MetricHandle::Counter(c.clone()),
            Entry::Meter(m) => MetricHandle::Meter(m.clone()),
            Entry::Histogram(h) => MetricHandle::Histogram(h.clone()),
            Entry::Timer(t) => MetricHandle::Timer(t.clone()),
            Entry::External(h) => h.clone(),
        }
    }

    fn kind(&self) -> MetricKind {
        match self {
            Entry::Counter(_) => MetricKind::Counter,
            Entry::Meter(_) => MetricKind::Meter,
            Entry::Histogram(_) => MetricKind::Histogram,
            Entry::Timer(_) => MetricKind::Timer,
            Entry::External(h) => h.kind(),
        }
    }
}

/// A thread safe registry of named metrics.
///
/// The typed accessors return the already registered metric for a name, or
/// create it on first use.
pub struct Registry {
    clock: Arc<dyn Clock>,
    entries: RwLock<BTreeMap<MetricName, Entry>>,
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

macro_rules! get_or_create {
    ($fn_name:ident, $ty:ty, $variant:ident, |$reg:ident| $create:expr) => {
        pub fn $fn_name(&self, name: MetricName) -> Result<Arc<$ty>, RegistryError> {
            if let Some(entry) = self.read().get(&name) {
                return match entry {
                    Entry::$variant(m) => Ok(m.clone()),
                    other => Err(RegistryError::KindMismatch {
                        name: name.to_string(),
                        existing: other.kind(),
                    }),
                };
            }

            let $reg = self;
            let mut entries = self.write();
            match entries.get(&name) {
                Some(Entry::$variant(m)) => Ok(m.clone()),
                Some(other) => Err(RegistryError::KindMismatch {
                    name: name.to_string(),
                    existing: other.kind(),
                }),
                None => {
                    let m: Arc<$ty> = Arc::new($create?);
                    debug!("registered {} {name}", MetricKind::$variant.as_str());
                    entries.insert(name, Entry::$variant(m.clone()));
                    Ok(m)
                }
            }
        }
    };
}

impl Registry {
    pub fn new() -> Self {
        Registry::with_clock(Arc::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Registry {
            clock,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<MetricName, Entry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<MetricName, Entry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    get_or_create!(counter, Counter, Counter, |_r| Ok::<_, CreationError>(Counter::new()));
    get_or_create!(histogram, Histogram, Histogram, |_r| Histogram::new());
    get_or_create!(timer, Timer, Timer, |r| Timer::new(r.clock.clone()));

    pub fn meter(&self, name: MetricName, event_type: &str) -> Result<Arc<Meter>, RegistryError> {
        let mut entries = self.write();
        match entries.get(&name) {
            Some(Entry::Meter(m)) => Ok(m.clone()),
            Some(other) => Err(RegistryError::KindMismatch {
                name: name.to_string(),
                existing: other.kind(),
            }),
            None => {
                let m = Arc::new(Meter::new(event_type, self.clock.clone()));
                debug!("registered meter {name}");
                entries.insert(name, Entry::Meter(m.clone()));
                Ok(m)
            }
        }
    }

    /// Register a gauge reading its value through `f`, replacing any metric
    /// already registered under `name`.
    pub fn gauge<F>(&self, name: MetricName, f: F)
    where
        F: Fn() -> Result<GaugeValue, GaugeError> + Send + Sync + 'static,
    {
        self.register(name, MetricHandle::Gauge(Arc::new(FnGauge::new(f))));
    }

    /// Register an externally implemented metric, returning the one it
    /// replaces.
    pub fn register(&self, name: MetricName, handle: MetricHandle) -> Option<MetricHandle> {
        debug!("registered {} {name}", handle.kind().as_str());
        self.write()
            .insert(name, Entry::External(handle))
            .map(|old| old.handle())
    }

    pub fn remove(&self, name: &MetricName) -> bool {
        let removed = self.write().remove(name).is_some();
        if removed {
            debug!("removed metric {name}");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl MetricRegistry for Registry {
    fn grouped_metrics(&self) -> GroupedMetrics {
        let entries = self.read();
        let mut groups = GroupedMetrics::new();
        for (name, entry) in entries.iter() {
            groups
                .entry(name.category())
                .or_default()
                .insert(name.clone(), entry.handle());
        }
        groups
    }
}
