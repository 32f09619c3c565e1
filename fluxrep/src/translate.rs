/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use fluxrep_influxdb::{FieldValue, Point, TagSet};
use fluxrep_registry::{
    CounterMetric, GaugeError, GaugeMetric, GaugeValue, MeteredMetric, MetricHandle, MetricName,
    ResourceSnapshot, SampledMetric,
};

use crate::dimension::{Dimension, DimensionSet};
use crate::error::TranslateError;
use crate::tags;

pub const TAG_KEY_METRIC_TYPE: &str = "metric_type";
pub const TAG_KEY_EVENT_TYPE: &str = "eventType";

pub const METRIC_TYPE_COUNTER: &str = "counter";
// the misspelling is part of the published schema
pub const METRIC_TYPE_GAUGE: &str = "gague";
pub const METRIC_TYPE_METER: &str = "meter";
pub const METRIC_TYPE_HISTOGRAM: &str = "histogram";
pub const METRIC_TYPE_TIMER: &str = "timer";

const FIELD_COUNT: &str = "count";
const FIELD_VALUE: &str = "value";

/// Translates registry metrics into points.
///
/// Every point carries the base tags, overwritten by the tags decomposed
/// from the metric name. Meter, histogram and timer fields are limited to
/// the enabled dimensions.
pub struct PointBuilder {
    base_tags: TagSet,
    dimensions: DimensionSet,
}

impl PointBuilder {
    pub fn new(base_tags: TagSet, dimensions: DimensionSet) -> Self {
        PointBuilder {
            base_tags,
            dimensions,
        }
    }

    #[inline]
    pub fn dimensions(&self) -> DimensionSet {
        self.dimensions
    }

    #[inline]
    pub fn base_tags(&self) -> &TagSet {
        &self.base_tags
    }

    fn measurement_point(&self, measurement: &str, timestamp_ms: i64) -> Point {
        let mut point = Point::new(measurement, timestamp_ms);
        point.extend_tags(&self.base_tags);
        point
    }

    fn metric_point(&self, name: &MetricName, metric_type: &str, timestamp_ms: i64) -> Point {
        let mut point = self.measurement_point(name.name(), timestamp_ms);
        point.extend_tags(&tags::decompose(name));
        point.add_tag(TAG_KEY_METRIC_TYPE, metric_type);
        point
    }

    /// Build the point of one metric.
    ///
    /// `Ok(None)` means the metric is silently skipped, which happens for
    /// gauges of a type that can not be reported.
    pub fn translate(
        &self,
        name: &MetricName,
        metric: &MetricHandle,
        timestamp_ms: i64,
    ) -> Result<Option<Point>, TranslateError> {
        match metric {
            MetricHandle::Counter(c) => Ok(Some(self.counter(name, c.as_ref(), timestamp_ms))),
            MetricHandle::Gauge(g) => self.gauge(name, g.as_ref(), timestamp_ms),
            MetricHandle::Meter(m) => self.meter(name, m.as_ref(), timestamp_ms).map(Some),
            MetricHandle::Histogram(h) => {
                self.histogram(name, h.as_ref(), timestamp_ms).map(Some)
            }
            MetricHandle::Timer(t) => self.timer(name, t.as_ref(), timestamp_ms).map(Some),
        }
    }

    pub fn counter<C>(&self, name: &MetricName, counter: &C, timestamp_ms: i64) -> Point
    where
        C: CounterMetric + ?Sized,
    {
        let mut point = self.metric_point(name, METRIC_TYPE_COUNTER, timestamp_ms);
        point.add_field(FIELD_COUNT, counter.count());
        point
    }

    pub fn gauge<G>(
        &self,
        name: &MetricName,
        gauge: &G,
        timestamp_ms: i64,
    ) -> Result<Option<Point>, TranslateError>
    where
        G: GaugeMetric + ?Sized,
    {
        let value = match gauge.value() {
            Ok(v) => v,
            Err(GaugeError::Unavailable) => {
                return Err(TranslateError::InvalidGauge { name: name.clone() });
            }
            Err(e) => {
                return Err(TranslateError::GaugeRead {
                    name: name.to_string(),
                    source: e,
                });
            }
        };
        let Some(value) = coerce_gauge_value(value) else {
            return Ok(None);
        };

        let mut point = self.metric_point(name, METRIC_TYPE_GAUGE, timestamp_ms);
        point.add_field(FIELD_VALUE, value);
        Ok(Some(point))
    }

    pub fn meter<M>(
        &self,
        name: &MetricName,
        meter: &M,
        timestamp_ms: i64,
    ) -> Result<Point, TranslateError>
    where
        M: MeteredMetric + ?Sized,
    {
        let mut point = self.metric_point(name, METRIC_TYPE_METER, timestamp_ms);
        point.add_tag(TAG_KEY_EVENT_TYPE, meter.event_type());
        self.add_metered_fields(&mut point, meter);
        self.check_fields(name, point)
    }

    pub fn histogram<H>(
        &self,
        name: &MetricName,
        histogram: &H,
        timestamp_ms: i64,
    ) -> Result<Point, TranslateError>
    where
        H: SampledMetric + ?Sized,
    {
        let mut point = self.metric_point(name, METRIC_TYPE_HISTOGRAM, timestamp_ms);
        self.add_sampled_fields(&mut point, histogram);
        self.check_fields(name, point)
    }

    pub fn timer<T>(
        &self,
        name: &MetricName,
        timer: &T,
        timestamp_ms: i64,
    ) -> Result<Point, TranslateError>
    where
        T: MeteredMetric + SampledMetric + ?Sized,
    {
        let mut point = self.metric_point(name, METRIC_TYPE_TIMER, timestamp_ms);
        self.add_metered_fields(&mut point, timer);
        self.add_sampled_fields(&mut point, timer);
        self.check_fields(name, point)
    }

    fn check_fields(&self, name: &MetricName, point: Point) -> Result<Point, TranslateError> {
        if point.has_fields() {
            Ok(point)
        } else {
            Err(TranslateError::NoFields {
                name: name.to_string(),
            })
        }
    }

    fn add_field<F>(&self, point: &mut Point, dimension: Dimension, value: F)
    where
        F: FnOnce() -> FieldValue,
    {
        if self.dimensions.contains(dimension) {
            point.add_field(dimension.display_name(), value());
        }
    }

    fn add_metered_fields<M>(&self, point: &mut Point, meter: &M)
    where
        M: MeteredMetric + ?Sized,
    {
        self.add_field(point, Dimension::Count, || meter.count().into());
        self.add_field(point, Dimension::MeanRate, || meter.mean_rate().into());
        self.add_field(point, Dimension::Rate1m, || meter.one_minute_rate().into());
        self.add_field(point, Dimension::Rate5m, || meter.five_minute_rate().into());
        self.add_field(point, Dimension::Rate15m, || {
            meter.fifteen_minute_rate().into()
        });
    }

    fn add_sampled_fields<S>(&self, point: &mut Point, sampled: &S)
    where
        S: SampledMetric + ?Sized,
    {
        self.add_field(point, Dimension::Max, || sampled.max().into());
        self.add_field(point, Dimension::Mean, || sampled.mean().into());
        self.add_field(point, Dimension::Min, || sampled.min().into());
        self.add_field(point, Dimension::StdDev, || sampled.std_dev().into());
        self.add_field(point, Dimension::Sum, || sampled.sum().into());

        const PERCENTILES: [Dimension; 6] = [
            Dimension::Median,
            Dimension::P75,
            Dimension::P95,
            Dimension::P98,
            Dimension::P99,
            Dimension::P999,
        ];
        if !PERCENTILES.iter().any(|d| self.dimensions.contains(*d)) {
            return;
        }
        let snapshot = sampled.snapshot();
        self.add_field(point, Dimension::Median, || snapshot.median.into());
        self.add_field(point, Dimension::P75, || snapshot.p75.into());
        self.add_field(point, Dimension::P95, || snapshot.p95.into());
        self.add_field(point, Dimension::P98, || snapshot.p98.into());
        self.add_field(point, Dimension::P99, || snapshot.p99.into());
        self.add_field(point, Dimension::P999, || snapshot.p999.into());
    }

    /// Build the fixed set of process resource points.
    pub fn resource_points(&self, snapshot: &ResourceSnapshot, timestamp_ms: i64) -> Vec<Point> {
        let mut points = Vec::with_capacity(
            7 + snapshot.memory_pool_usage.len()
                + snapshot.thread_states.len()
                + snapshot.garbage_collectors.len(),
        );

        let mut single = |measurement: &str, value: FieldValue| {
            let mut point = self.measurement_point(measurement, timestamp_ms);
            point.add_field(FIELD_VALUE, value);
            points.push(point);
        };
        single("jvm.memory.heap_usage", snapshot.heap_usage.into());
        single("jvm.memory.non_heap_usage", snapshot.non_heap_usage.into());
        single(
            "jvm.daemon_thread_count",
            snapshot.daemon_thread_count.into(),
        );
        single("jvm.thread_count", snapshot.thread_count.into());
        single("jvm.uptime", snapshot.uptime_secs.into());
        single("jvm.fd_usage", snapshot.fd_usage.into());

        for (pool, usage) in &snapshot.memory_pool_usage {
            let mut point = self.measurement_point("jvm.memory.memory_pool_usages", timestamp_ms);
            point.add_tag("pool", pool);
            point.add_field(FIELD_VALUE, *usage);
            points.push(point);
        }

        for (state, share) in &snapshot.thread_states {
            let mut point = self.measurement_point("jvm.memory.thread_states", timestamp_ms);
            point.add_tag("state", &state.to_lowercase());
            point.add_field(FIELD_VALUE, *share);
            points.push(point);
        }

        for (gc_name, stats) in &snapshot.garbage_collectors {
            let mut point = self.measurement_point("jvm.gc", timestamp_ms);
            point.add_tag("gcName", gc_name);
            point.add_field("time", stats.time_ms);
            point.add_field("runs", stats.runs);
            points.push(point);
        }

        points
    }
}

/// Map a gauge reading to a field value.
///
/// Integers are reported as single precision floats, with the same loss of
/// precision existing consumers of the output have always seen.
fn coerce_gauge_value(value: GaugeValue) -> Option<FieldValue> {
    match value {
        GaugeValue::Float(f) => Some(FieldValue::Float(f as f64)),
        GaugeValue::Double(d) => Some(FieldValue::Float(d)),
        GaugeValue::Long(l) => Some(FieldValue::Float(l as f32 as f64)),
        GaugeValue::Int(i) => Some(FieldValue::Float(i as f32 as f64)),
        GaugeValue::Text(s) => Some(FieldValue::Text(s)),
        GaugeValue::Bool(_) | GaugeValue::Other(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use fluxrep_registry::{
        Counter, FnGauge, GcStats, Histogram, Meter, SystemClock, Timer,
    };

    fn builder(dimensions: DimensionSet) -> PointBuilder {
        let mut base = TagSet::new();
        base.insert("hostname".to_string(), "host1".to_string());
        base.insert("type".to_string(), "base".to_string());
        PointBuilder::new(base, dimensions)
    }

    fn field_keys(point: &Point) -> Vec<&str> {
        point.fields().keys().map(|k| k.as_str()).collect()
    }

    #[test]
    fn counter() {
        let c = Counter::new();
        c.add(5);
        let name = MetricName::with_scope("kafka.server", "Broker", "Requests", "topic.t1");
        let point = builder(DimensionSet::empty()).counter(&name, &c, 1000);
        assert_eq!(point.measurement(), "Requests");
        assert_eq!(point.timestamp_ms(), 1000);
        assert_eq!(point.tag("hostname"), Some("host1"));
        // metric tags overwrite base tags
        assert_eq!(point.tag("type"), Some("Broker"));
        assert_eq!(point.tag("group"), Some("kafka.server"));
        assert_eq!(point.tag("topic"), Some("t1"));
        assert_eq!(point.tag(TAG_KEY_METRIC_TYPE), Some("counter"));
        assert_eq!(point.field("count"), Some(&FieldValue::Integer(5)));
    }

    #[test]
    fn gauge_coercion() {
        let b = builder(DimensionSet::all());
        let name = MetricName::new("g", "t", "n");

        let gauge = FnGauge::new(|| Ok(GaugeValue::Long(16_777_217)));
        let point = b.gauge(&name, &gauge, 1).unwrap().unwrap();
        assert_eq!(point.tag(TAG_KEY_METRIC_TYPE), Some("gague"));
        // goes through f32
        assert_eq!(point.field("value"), Some(&FieldValue::Float(16_777_216.0)));

        let gauge = FnGauge::new(|| Ok(GaugeValue::Int(3)));
        let point = b.gauge(&name, &gauge, 1).unwrap().unwrap();
        assert_eq!(point.field("value"), Some(&FieldValue::Float(3.0)));

        let gauge = FnGauge::new(|| Ok(GaugeValue::Text("up".to_string())));
        let point = b.gauge(&name, &gauge, 1).unwrap().unwrap();
        assert_eq!(point.field("value"), Some(&FieldValue::Text("up".to_string())));
    }

    #[test]
    fn gauge_unsupported() {
        let b = builder(DimensionSet::all());
        let name = MetricName::new("g", "t", "n");
        let gauge = FnGauge::new(|| Ok(GaugeValue::Bool(true)));
        assert!(b.gauge(&name, &gauge, 1).unwrap().is_none());
    }

    #[test]
    fn gauge_invalid() {
        let b = builder(DimensionSet::all());
        let name = MetricName::new("g", "t", "n");
        let gauge = FnGauge::new(|| Err(GaugeError::Unavailable));
        match b.gauge(&name, &gauge, 1) {
            Err(TranslateError::InvalidGauge { name: invalid }) => assert_eq!(invalid, name),
            r => panic!("unexpected result {r:?}"),
        }

        // the scope is kept so the exact metric can be pruned
        let scoped = MetricName::with_scope("g", "t", "n", "partition.1");
        match b.gauge(&scoped, &gauge, 1) {
            Err(TranslateError::InvalidGauge { name: invalid }) => {
                assert_eq!(invalid.scope(), Some("partition.1"));
                assert_eq!(invalid, scoped);
            }
            r => panic!("unexpected result {r:?}"),
        }

        let gauge = FnGauge::new(|| Err(GaugeError::Read("closed".to_string())));
        assert!(matches!(
            b.gauge(&name, &gauge, 1),
            Err(TranslateError::GaugeRead { .. })
        ));
    }

    #[test]
    fn meter_fields() {
        let meter = Meter::new("bytes", Arc::new(SystemClock::new()));
        meter.mark_n(3);
        let name = MetricName::new("g", "t", "n");

        let point = builder(DimensionSet::all()).meter(&name, &meter, 1).unwrap();
        assert_eq!(point.tag(TAG_KEY_EVENT_TYPE), Some("bytes"));
        assert_eq!(
            field_keys(&point),
            [
                "count",
                "meanRate",
                "1MinuteRate",
                "5MinuteRate",
                "15MinuteRate"
            ]
        );
        assert_eq!(point.field("count"), Some(&FieldValue::Integer(3)));

        let dims: DimensionSet = [Dimension::Rate5m, Dimension::P99].into_iter().collect();
        let point = builder(dims).meter(&name, &meter, 1).unwrap();
        assert_eq!(field_keys(&point), ["5MinuteRate"]);
    }

    #[test]
    fn histogram_fields() {
        let h = Histogram::new().unwrap();
        for v in 1..=9 {
            h.update(v);
        }
        let name = MetricName::new("g", "t", "n");
        let point = builder(DimensionSet::all()).histogram(&name, &h, 1).unwrap();
        assert_eq!(
            field_keys(&point),
            [
                "max", "mean", "min", "stddev", "sum", "median", "p75", "p95", "p98", "p99",
                "p999"
            ]
        );
        assert_eq!(point.field("min"), Some(&FieldValue::Float(1.0)));
        assert_eq!(point.field("max"), Some(&FieldValue::Float(9.0)));
        assert_eq!(point.field("mean"), Some(&FieldValue::Float(5.0)));
        // the real deviation, not the max
        let stddev = point.field("stddev").and_then(|v| v.as_f64()).unwrap();
        assert!((stddev - 7.5f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn timer_filtered() {
        let timer = Timer::new(Arc::new(SystemClock::new())).unwrap();
        timer.update(std::time::Duration::from_millis(3));
        let name = MetricName::new("g", "t", "n");
        let dims: DimensionSet = [Dimension::Count, Dimension::P99].into_iter().collect();
        let point = builder(dims).timer(&name, &timer, 1).unwrap();
        assert_eq!(field_keys(&point), ["count", "p99"]);
        assert_eq!(point.tag(TAG_KEY_METRIC_TYPE), Some("timer"));
    }

    #[test]
    fn no_fields() {
        let h = Histogram::new().unwrap();
        let name = MetricName::new("g", "t", "n");
        let dims: DimensionSet = [Dimension::Count].into_iter().collect();
        assert!(matches!(
            builder(dims).histogram(&name, &h, 1),
            Err(TranslateError::NoFields { .. })
        ));
    }

    #[test]
    fn resources() {
        let snapshot = ResourceSnapshot {
            heap_usage: 0.5,
            non_heap_usage: 0.1,
            memory_pool_usage: vec![("rss_anon".to_string(), 0.7)],
            daemon_thread_count: 1,
            thread_count: 4,
            uptime_secs: 60,
            fd_usage: 0.01,
            thread_states: vec![("RUNNABLE".to_string(), 0.25)],
            garbage_collectors: vec![(
                "young".to_string(),
                GcStats {
                    time_ms: 12,
                    runs: 3,
                },
            )],
        };
        let points = builder(DimensionSet::all()).resource_points(&snapshot, 7);
        assert_eq!(points.len(), 9);
        assert!(points.iter().all(|p| p.timestamp_ms() == 7));
        assert!(points.iter().all(|p| p.tag("hostname") == Some("host1")));

        let find = |m: &str| points.iter().find(|p| p.measurement() == m).unwrap();
        assert_eq!(
            find("jvm.thread_count").field("value"),
            Some(&FieldValue::Integer(4))
        );
        assert_eq!(
            find("jvm.memory.thread_states").tag("state"),
            Some("runnable")
        );
        let gc = find("jvm.gc");
        assert_eq!(gc.tag("gcName"), Some("young"));
        assert_eq!(gc.field("time"), Some(&FieldValue::Integer(12)));
        assert_eq!(gc.field("runs"), Some(&FieldValue::Integer(3)));
        assert_eq!(
            find("jvm.memory.memory_pool_usages").tag("pool"),
            Some("rss_anon")
        );
    }
}
