/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, error, info, trace, warn};

use fluxrep_influxdb::{BatchSink, TagSet, WriteError};
use fluxrep_registry::{Clock, MetricName, MetricRegistry, ResourceSource, SystemClock};

use crate::batch::{Batch, WriteTarget};
use crate::dimension::DimensionSet;
use crate::error::{ReporterError, TranslateError};
use crate::translate::PointBuilder;

const POLL_THREAD_NAME: &str = "reporter-poll";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReporterState {
    /// Built, no periodic ticking yet.
    Created,
    /// Waiting for the next tick.
    Idle,
    /// A tick is in progress.
    Running,
    Stopped,
}

/// Outcome of one polling cycle.
#[derive(Debug)]
pub struct TickReport {
    /// The single wall clock read shared by every point of the cycle.
    pub timestamp_ms: i64,
    /// Points handed to the sink.
    pub points: usize,
    /// Metrics silently left out, such as gauges of an unsupported type.
    pub skipped: usize,
    /// Metrics, or the resource snapshot, that failed to translate.
    pub failed: usize,
    /// Full names, scope included, of gauges whose source is gone. The
    /// registry owner may prune exactly these.
    pub invalid_gauges: Vec<MetricName>,
    pub write_error: Option<WriteError>,
}

impl TickReport {
    fn new(timestamp_ms: i64) -> Self {
        TickReport {
            timestamp_ms,
            points: 0,
            skipped: 0,
            failed: 0,
            invalid_gauges: Vec::new(),
            write_error: None,
        }
    }

    #[inline]
    pub fn is_written(&self) -> bool {
        self.write_error.is_none()
    }
}

pub struct ReporterBuilder {
    registry: Arc<dyn MetricRegistry>,
    sink: Arc<dyn BatchSink>,
    target: WriteTarget,
    base_tags: TagSet,
    dimensions: DimensionSet,
    clock: Option<Arc<dyn Clock>>,
    resources: Option<Arc<dyn ResourceSource>>,
}

impl ReporterBuilder {
    pub fn new(
        registry: Arc<dyn MetricRegistry>,
        sink: Arc<dyn BatchSink>,
        target: WriteTarget,
    ) -> Self {
        ReporterBuilder {
            registry,
            sink,
            target,
            base_tags: TagSet::new(),
            dimensions: DimensionSet::all(),
            clock: None,
            resources: None,
        }
    }

    pub fn base_tags(mut self, tags: TagSet) -> Self {
        self.base_tags = tags;
        self
    }

    pub fn dimensions(mut self, dimensions: DimensionSet) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Emit the process resource points from `source` in every cycle.
    pub fn resource_source(mut self, source: Arc<dyn ResourceSource>) -> Self {
        self.resources = Some(source);
        self
    }

    pub fn build(self) -> Reporter {
        debug!(
            "the following metric dimensions will be sent: {:?}",
            self.dimensions
        );
        let inner = ReporterInner {
            registry: self.registry,
            sink: self.sink,
            resources: self.resources,
            clock: self
                .clock
                .unwrap_or_else(|| Arc::new(SystemClock::new())),
            target: self.target,
            builder: PointBuilder::new(self.base_tags, self.dimensions),
            state: Mutex::new(ReporterState::Created),
            state_changed: Condvar::new(),
        };
        Reporter {
            inner: Arc::new(inner),
            worker: Mutex::new(None),
        }
    }
}

struct ReporterInner {
    registry: Arc<dyn MetricRegistry>,
    sink: Arc<dyn BatchSink>,
    resources: Option<Arc<dyn ResourceSource>>,
    clock: Arc<dyn Clock>,
    target: WriteTarget,
    builder: PointBuilder,
    state: Mutex<ReporterState>,
    state_changed: Condvar,
}

/// Puts the state back when a tick ends, even by unwinding.
struct RunningGuard<'a> {
    inner: &'a ReporterInner,
    resume: ReporterState,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.inner.lock_state();
        if *state == ReporterState::Running {
            *state = self.resume;
        }
        self.inner.state_changed.notify_all();
    }
}

impl ReporterInner {
    fn lock_state(&self) -> MutexGuard<'_, ReporterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wait_state<'a>(
        &self,
        guard: MutexGuard<'a, ReporterState>,
    ) -> MutexGuard<'a, ReporterState> {
        self.state_changed
            .wait(guard)
            .unwrap_or_else(|e| e.into_inner())
    }

    fn run(&self) -> Result<TickReport, ReporterError> {
        let mut state = self.lock_state();
        let resume = loop {
            match *state {
                ReporterState::Stopped => return Err(ReporterError::Stopped),
                ReporterState::Running => {}
                current => break current,
            }
            state = self.wait_state(state);
        };
        *state = ReporterState::Running;
        drop(state);

        let _guard = RunningGuard {
            inner: self,
            resume,
        };
        Ok(self.tick())
    }

    fn tick(&self) -> TickReport {
        let timestamp_ms = self.clock.time_millis();
        let mut report = TickReport::new(timestamp_ms);
        let mut batch = Batch::for_target(self.target.clone());

        for (_category, metrics) in self.registry.grouped_metrics() {
            for (name, metric) in metrics {
                match self.builder.translate(&name, &metric, timestamp_ms) {
                    Ok(Some(point)) => batch.append(point),
                    Ok(None) => {
                        trace!(
                            "skipped {} {name} with an unsupported value type",
                            metric.kind().as_str()
                        );
                        report.skipped += 1;
                    }
                    Err(TranslateError::InvalidGauge { name }) => {
                        warn!("gauge {name} is no longer valid");
                        report.failed += 1;
                        report.invalid_gauges.push(name);
                    }
                    Err(e) => {
                        warn!("error translating metric {name}: {e}");
                        report.failed += 1;
                    }
                }
            }
        }

        if let Some(source) = &self.resources {
            match source.snapshot() {
                Ok(snapshot) => {
                    batch.extend(self.builder.resource_points(&snapshot, timestamp_ms))
                }
                Err(e) => {
                    warn!("failed to read process resource usage: {e}");
                    report.failed += 1;
                }
            }
        }

        report.points = batch.len();
        if let Err(e) = self.sink.write(batch.seal()) {
            error!(
                "cannot send {} points to database {}: {e}",
                report.points, self.target.database
            );
            report.write_error = Some(e);
        }

        debug!(
            "tick at {timestamp_ms}: {} points, {} skipped, {} failed",
            report.points, report.skipped, report.failed
        );
        report
    }

    fn poll_loop(&self, interval: Duration) {
        let mut next_tick = next_instant(Instant::now(), interval);
        loop {
            let mut state = self.lock_state();
            loop {
                if *state == ReporterState::Stopped {
                    return;
                }
                let now = Instant::now();
                let Some(wait) = next_tick.checked_duration_since(now).filter(|d| !d.is_zero())
                else {
                    break;
                };
                state = self
                    .state_changed
                    .wait_timeout(state, wait)
                    .map(|(guard, _)| guard)
                    .unwrap_or_else(|e| e.into_inner().0);
            }
            drop(state);

            if let Err(ReporterError::Stopped) = self.run() {
                return;
            }

            // skip the ticks missed by a slow cycle instead of bursting
            next_tick = next_instant(next_tick, interval);
            let now = Instant::now();
            if next_tick < now {
                next_tick = next_instant(now, interval);
            }
        }
    }
}

/// `from + interval`, or the farthest instant the monotonic clock can hold.
fn next_instant(from: Instant, interval: Duration) -> Instant {
    let mut step = interval;
    while !step.is_zero() {
        if let Some(next) = from.checked_add(step) {
            return next;
        }
        step /= 2;
    }
    from
}

/// Periodically sends every metric of a registry to a sink.
///
/// The first periodic tick fires one interval after [`Reporter::start`].
/// Ticks, [`Reporter::start`] and [`Reporter::stop`] never overlap.
pub struct Reporter {
    inner: Arc<ReporterInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Reporter {
    pub fn builder(
        registry: Arc<dyn MetricRegistry>,
        sink: Arc<dyn BatchSink>,
        target: WriteTarget,
    ) -> ReporterBuilder {
        ReporterBuilder::new(registry, sink, target)
    }

    pub fn state(&self) -> ReporterState {
        *self.inner.lock_state()
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Begin ticking every `interval` on a dedicated thread.
    ///
    /// Starting an already started reporter does nothing.
    pub fn start(&self, interval: Duration) -> Result<(), ReporterError> {
        if interval.is_zero() {
            return Err(ReporterError::ZeroInterval);
        }

        let mut worker = self.lock_worker();
        let mut state = self.inner.lock_state();
        if *state == ReporterState::Stopped {
            return Err(ReporterError::Stopped);
        }
        if worker.is_some() {
            debug!("reporter has already been started");
            return Ok(());
        }

        let inner = self.inner.clone();
        let handle = std::thread::Builder::new()
            .name(POLL_THREAD_NAME.to_string())
            .spawn(move || inner.poll_loop(interval))?;
        if *state == ReporterState::Created {
            *state = ReporterState::Idle;
        }
        *worker = Some(handle);
        info!(
            "started metrics reporter to database {} with polling interval {interval:?}",
            self.inner.target.database
        );
        Ok(())
    }

    /// Run exactly one tick on the calling thread.
    pub fn run(&self) -> Result<TickReport, ReporterError> {
        self.inner.run()
    }

    /// Halt future ticks, waiting for the one in progress if any.
    ///
    /// Stopping is final, later calls do nothing.
    pub fn stop(&self) {
        let mut worker = self.lock_worker();
        {
            let mut state = self.inner.lock_state();
            if *state == ReporterState::Stopped {
                return;
            }
            while *state == ReporterState::Running {
                state = self.inner.wait_state(state);
            }
            *state = ReporterState::Stopped;
            self.inner.state_changed.notify_all();
        }

        if let Some(handle) = worker.take()
            && handle.join().is_err()
        {
            error!("metrics reporter poll thread panicked");
        }
        info!("stopped metrics reporter");
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use fluxrep_influxdb::{ConsistencyLevel, WriteRequest};
    use fluxrep_registry::{MetricName, Registry};

    #[derive(Default)]
    struct CountingSink {
        writes: AtomicUsize,
    }

    impl BatchSink for CountingSink {
        fn write(&self, _request: WriteRequest) -> Result<(), WriteError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn target() -> WriteTarget {
        WriteTarget {
            database: "kafka".to_string(),
            retention_policy: "autogen".to_string(),
            consistency: ConsistencyLevel::All,
        }
    }

    fn reporter(sink: Arc<CountingSink>) -> Reporter {
        let registry = Arc::new(Registry::new());
        registry
            .counter(MetricName::new("g", "t", "n"))
            .unwrap()
            .add(1);
        Reporter::builder(registry, sink, target()).build()
    }

    #[test]
    fn state_machine() {
        let sink = Arc::new(CountingSink::default());
        let reporter = reporter(sink.clone());
        assert_eq!(reporter.state(), ReporterState::Created);

        let report = reporter.run().unwrap();
        assert_eq!(report.points, 1);
        assert_eq!(reporter.state(), ReporterState::Created);

        reporter.start(Duration::from_secs(3600)).unwrap();
        assert_eq!(reporter.state(), ReporterState::Idle);
        reporter.start(Duration::from_secs(1)).unwrap();

        reporter.run().unwrap();
        assert_eq!(reporter.state(), ReporterState::Idle);

        reporter.stop();
        assert_eq!(reporter.state(), ReporterState::Stopped);
        reporter.stop();
        assert!(matches!(reporter.run(), Err(ReporterError::Stopped)));
        assert!(matches!(
            reporter.start(Duration::from_secs(1)),
            Err(ReporterError::Stopped)
        ));
        assert_eq!(sink.writes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn zero_interval() {
        let reporter = reporter(Arc::new(CountingSink::default()));
        assert!(matches!(
            reporter.start(Duration::ZERO),
            Err(ReporterError::ZeroInterval)
        ));
    }

    #[test]
    fn periodic() {
        let sink = Arc::new(CountingSink::default());
        let reporter = reporter(sink.clone());
        reporter.start(Duration::from_millis(20)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);
        while sink.writes.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        reporter.stop();
        let writes = sink.writes.load(Ordering::SeqCst);
        assert!(writes >= 2);

        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(sink.writes.load(Ordering::SeqCst), writes);
    }

    #[test]
    fn next_tick() {
        let now = Instant::now();
        assert_eq!(
            next_instant(now, Duration::from_secs(10)),
            now + Duration::from_secs(10)
        );

        let far = next_instant(now, Duration::MAX);
        assert!(far > now + Duration::from_secs(86400 * 365));
        assert!(next_instant(far, Duration::MAX) >= far);
    }
}
