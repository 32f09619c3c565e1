/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use fluxrep::{Dimension, DimensionSet, Reporter, ReporterError, ReporterState, WriteTarget};
use fluxrep_influxdb::{
    BatchSink, ConsistencyLevel, FieldValue, Point, TagSet, WriteError, WriteRequest,
};
use fluxrep_registry::{
    Clock, FixedResourceSource, GaugeError, GaugeValue, GcStats, MetricName, Registry,
    ResourceSnapshot,
};

const NOW_MS: i64 = 1_700_000_000_000;

struct FixedClock;

impl Clock for FixedClock {
    fn tick(&self) -> u64 {
        0
    }

    fn time_millis(&self) -> i64 {
        NOW_MS
    }
}

#[derive(Default)]
struct RecordingSink {
    requests: Mutex<Vec<WriteRequest>>,
}

impl RecordingSink {
    fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn last_points(&self) -> Vec<Point> {
        self.requests
            .lock()
            .unwrap()
            .last()
            .map(|r| r.points.clone())
            .unwrap_or_default()
    }
}

impl BatchSink for RecordingSink {
    fn write(&self, request: WriteRequest) -> Result<(), WriteError> {
        self.requests.lock().unwrap().push(request);
        Ok(())
    }
}

struct FailingSink {
    attempts: AtomicUsize,
}

impl BatchSink for FailingSink {
    fn write(&self, _request: WriteRequest) -> Result<(), WriteError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(WriteError::Response {
            status: 500,
            body: "internal error".to_string(),
        })
    }
}

#[derive(Default)]
struct Gate {
    entered: bool,
    released: bool,
}

/// Blocks every write until released.
#[derive(Default)]
struct GatedSink {
    gate: Mutex<Gate>,
    changed: Condvar,
    writes: AtomicUsize,
}

impl GatedSink {
    fn wait_entered(&self) {
        let gate = self.gate.lock().unwrap();
        let (_gate, timeout) = self
            .changed
            .wait_timeout_while(gate, Duration::from_secs(10), |g| !g.entered)
            .unwrap();
        assert!(!timeout.timed_out());
    }

    fn release(&self) {
        self.gate.lock().unwrap().released = true;
        self.changed.notify_all();
    }
}

impl BatchSink for GatedSink {
    fn write(&self, _request: WriteRequest) -> Result<(), WriteError> {
        let mut gate = self.gate.lock().unwrap();
        gate.entered = true;
        self.changed.notify_all();
        let _gate = self.changed.wait_while(gate, |g| !g.released).unwrap();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn target() -> WriteTarget {
    WriteTarget {
        database: "kafka".to_string(),
        retention_policy: "autogen".to_string(),
        consistency: ConsistencyLevel::One,
    }
}

fn base_tags() -> TagSet {
    let mut tags = TagSet::new();
    tags.insert("hostname".to_string(), "broker1".to_string());
    tags
}

fn wait_until<F: Fn() -> bool>(f: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if f() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn counter_and_histogram() {
    let registry = Arc::new(Registry::new());
    registry
        .counter(MetricName::new("kafka.server", "BrokerTopicMetrics", "Requests"))
        .unwrap()
        .add(5);
    let h = registry
        .histogram(MetricName::with_scope(
            "kafka.network",
            "RequestMetrics",
            "RequestBytes",
            "request.Produce",
        ))
        .unwrap();
    for v in 1..=9 {
        h.update(v);
    }

    let sink = Arc::new(RecordingSink::default());
    let reporter = Reporter::builder(registry, sink.clone(), target())
        .base_tags(base_tags())
        .clock(Arc::new(FixedClock))
        .build();

    let report = reporter.run().unwrap();
    assert_eq!(report.timestamp_ms, NOW_MS);
    assert_eq!(report.points, 2);
    assert_eq!(report.failed, 0);
    assert!(report.is_written());

    let requests = sink.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.database, "kafka");
    assert_eq!(request.retention_policy, "autogen");
    assert_eq!(request.consistency, ConsistencyLevel::One);
    assert!(request.points.iter().all(|p| p.timestamp_ms() == NOW_MS));
    assert!(request.points.iter().all(|p| p.tag("hostname") == Some("broker1")));

    let counter = request
        .points
        .iter()
        .find(|p| p.measurement() == "Requests")
        .unwrap();
    assert_eq!(counter.tag("metric_type"), Some("counter"));
    assert_eq!(counter.field("count"), Some(&FieldValue::Integer(5)));

    let histogram = request
        .points
        .iter()
        .find(|p| p.measurement() == "RequestBytes")
        .unwrap();
    assert_eq!(histogram.tag("metric_type"), Some("histogram"));
    assert_eq!(histogram.tag("request"), Some("Produce"));
    assert_eq!(histogram.tag("type"), Some("RequestMetrics"));
    assert_eq!(histogram.fields().len(), 11);
    assert_eq!(histogram.field("min"), Some(&FieldValue::Float(1.0)));
    assert_eq!(histogram.field("max"), Some(&FieldValue::Float(9.0)));
    assert_eq!(histogram.field("sum"), Some(&FieldValue::Float(45.0)));
    assert_eq!(histogram.field("median"), Some(&FieldValue::Float(5.0)));
    assert_eq!(histogram.field("p999"), Some(&FieldValue::Float(9.0)));
    match histogram.field("mean") {
        Some(FieldValue::Float(mean)) => assert!((mean - 5.0).abs() < 1e-9),
        v => panic!("unexpected mean {v:?}"),
    }
    match histogram.field("stddev") {
        Some(FieldValue::Float(stddev)) => assert!((stddev - 7.5f64.sqrt()).abs() < 1e-9),
        v => panic!("unexpected stddev {v:?}"),
    }
}

#[test]
fn timer_dimension_filter() {
    let registry = Arc::new(Registry::new());
    let timer = registry
        .timer(MetricName::new("kafka.network", "RequestMetrics", "TotalTimeMs"))
        .unwrap();
    timer.update(Duration::from_millis(4));

    let sink = Arc::new(RecordingSink::default());
    let dimensions: DimensionSet = [Dimension::Count, Dimension::P99].into_iter().collect();
    let reporter = Reporter::builder(registry, sink.clone(), target())
        .dimensions(dimensions)
        .clock(Arc::new(FixedClock))
        .build();
    reporter.run().unwrap();

    let points = sink.last_points();
    assert_eq!(points.len(), 1);
    let keys: Vec<&str> = points[0].fields().keys().map(|k| k.as_str()).collect();
    assert_eq!(keys, ["count", "p99"]);
    assert_eq!(points[0].field("count"), Some(&FieldValue::Integer(1)));
}

#[test]
fn failing_metric_isolated() {
    let registry = Arc::new(Registry::new());
    registry
        .counter(MetricName::new("a", "t", "first"))
        .unwrap()
        .inc();
    registry.gauge(MetricName::new("b", "t", "broken"), || {
        Err(GaugeError::Read("socket closed".to_string()))
    });
    registry.gauge(MetricName::new("c", "t", "gone"), || {
        Err(GaugeError::Unavailable)
    });
    registry.gauge(MetricName::new("d", "t", "flag"), || Ok(GaugeValue::Bool(true)));
    registry.gauge(MetricName::new("e", "t", "ratio"), || Ok(GaugeValue::Double(0.5)));

    let sink = Arc::new(RecordingSink::default());
    let reporter = Reporter::builder(registry.clone(), sink.clone(), target()).build();
    let report = reporter.run().unwrap();

    assert_eq!(report.points, 2);
    assert_eq!(report.failed, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.invalid_gauges, [MetricName::new("c", "t", "gone")]);

    let mut names: Vec<String> = sink
        .last_points()
        .iter()
        .map(|p| p.measurement().to_string())
        .collect();
    names.sort();
    assert_eq!(names, ["first", "ratio"]);

    // the owner may prune what the tick reported
    for name in &report.invalid_gauges {
        assert!(registry.remove(name));
    }
    let report = reporter.run().unwrap();
    assert!(report.invalid_gauges.is_empty());
    assert_eq!(report.failed, 1);
}

#[test]
fn invalid_scoped_gauge_pruned_alone() {
    let registry = Arc::new(Registry::new());
    let gone = MetricName::with_scope("kafka.log", "Log", "Size", "topic.a.partition.0");
    let kept = MetricName::with_scope("kafka.log", "Log", "Size", "topic.a.partition.1");
    registry.gauge(gone.clone(), || Err(GaugeError::Unavailable));
    registry.gauge(kept, || Ok(GaugeValue::Double(1024.0)));

    let sink = Arc::new(RecordingSink::default());
    let reporter = Reporter::builder(registry.clone(), sink.clone(), target()).build();
    let report = reporter.run().unwrap();
    assert_eq!(report.points, 1);
    assert_eq!(report.invalid_gauges, [gone]);

    for name in &report.invalid_gauges {
        assert!(registry.remove(name));
    }
    assert_eq!(registry.len(), 1);

    let report = reporter.run().unwrap();
    assert_eq!(report.points, 1);
    assert_eq!(report.failed, 0);
    assert!(report.invalid_gauges.is_empty());
    let points = sink.last_points();
    assert_eq!(points[0].tag("partition"), Some("1"));
    assert_eq!(points[0].field("value"), Some(&FieldValue::Float(1024.0)));
}

#[test]
fn write_failure_reported() {
    let registry = Arc::new(Registry::new());
    registry.counter(MetricName::new("a", "t", "n")).unwrap();

    let sink = Arc::new(FailingSink {
        attempts: AtomicUsize::new(0),
    });
    let reporter = Reporter::builder(registry, sink.clone(), target()).build();

    let report = reporter.run().unwrap();
    assert_eq!(report.points, 1);
    assert!(matches!(
        report.write_error,
        Some(WriteError::Response { status: 500, .. })
    ));
    // no retry within the tick
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 1);

    // the next tick still runs
    reporter.run().unwrap();
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn resource_points() {
    let snapshot = ResourceSnapshot {
        heap_usage: 0.25,
        non_heap_usage: 0.05,
        memory_pool_usage: vec![("rss_anon".to_string(), 0.8), ("swap".to_string(), 0.0)],
        daemon_thread_count: 0,
        thread_count: 3,
        uptime_secs: 120,
        fd_usage: 0.001,
        thread_states: vec![("RUNNABLE".to_string(), 1.0 / 3.0)],
        garbage_collectors: vec![(
            "young".to_string(),
            GcStats {
                time_ms: 5,
                runs: 2,
            },
        )],
    };

    let sink = Arc::new(RecordingSink::default());
    let reporter = Reporter::builder(Arc::new(Registry::new()), sink.clone(), target())
        .base_tags(base_tags())
        .clock(Arc::new(FixedClock))
        .resource_source(Arc::new(FixedResourceSource::new(snapshot)))
        .build();
    let report = reporter.run().unwrap();
    assert_eq!(report.points, 10);

    let points = sink.last_points();
    assert!(points.iter().all(|p| p.tag("hostname") == Some("broker1")));
    assert!(points.iter().all(|p| p.tag("metric_type").is_none()));
    assert_eq!(
        points
            .iter()
            .filter(|p| p.measurement() == "jvm.memory.memory_pool_usages")
            .count(),
        2
    );
    let uptime = points
        .iter()
        .find(|p| p.measurement() == "jvm.uptime")
        .unwrap();
    assert_eq!(uptime.field("value"), Some(&FieldValue::Integer(120)));
}

#[test]
fn empty_registry_still_writes() {
    let sink = Arc::new(RecordingSink::default());
    let reporter = Reporter::builder(Arc::new(Registry::new()), sink.clone(), target()).build();
    let report = reporter.run().unwrap();
    assert_eq!(report.points, 0);
    assert_eq!(sink.count(), 1);
}

#[test]
fn periodic_ticks_and_stop() {
    let registry = Arc::new(Registry::new());
    registry.counter(MetricName::new("a", "t", "n")).unwrap();

    let sink = Arc::new(RecordingSink::default());
    let reporter = Reporter::builder(registry, sink.clone(), target()).build();
    reporter.start(Duration::from_millis(10)).unwrap();
    assert!(wait_until(|| sink.count() >= 3));

    reporter.stop();
    assert_eq!(reporter.state(), ReporterState::Stopped);
    let count = sink.count();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(sink.count(), count);

    reporter.stop();
    assert!(matches!(reporter.run(), Err(ReporterError::Stopped)));
}

#[test]
fn first_tick_after_one_interval() {
    let registry = Arc::new(Registry::new());
    registry.counter(MetricName::new("a", "t", "n")).unwrap();

    let sink = Arc::new(RecordingSink::default());
    let reporter = Reporter::builder(registry, sink.clone(), target()).build();
    let started = Instant::now();
    reporter.start(Duration::from_millis(300)).unwrap();

    thread::sleep(Duration::from_millis(100));
    assert_eq!(sink.count(), 0);

    assert!(wait_until(|| sink.count() >= 1));
    assert!(started.elapsed() >= Duration::from_millis(300));
    reporter.stop();
}

#[test]
fn stop_waits_for_tick_in_progress() {
    let registry = Arc::new(Registry::new());
    registry.counter(MetricName::new("a", "t", "n")).unwrap();

    let sink = Arc::new(GatedSink::default());
    let reporter = Arc::new(Reporter::builder(registry, sink.clone(), target()).build());

    let runner = {
        let reporter = reporter.clone();
        thread::spawn(move || reporter.run().map(|r| r.points))
    };
    sink.wait_entered();
    assert_eq!(reporter.state(), ReporterState::Running);

    let stopper = {
        let reporter = reporter.clone();
        thread::spawn(move || reporter.stop())
    };
    thread::sleep(Duration::from_millis(30));
    // the in-flight tick is not interrupted
    assert_eq!(reporter.state(), ReporterState::Running);

    sink.release();
    stopper.join().unwrap();
    assert_eq!(runner.join().unwrap().unwrap(), 1);
    assert_eq!(sink.writes.load(Ordering::SeqCst), 1);
    assert_eq!(reporter.state(), ReporterState::Stopped);
}
