/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use thiserror::Error;

use super::GaugeMetric;

/// The value read from a gauge at one instant.
///
/// Only the numeric and text variants can be reported, the others exist so
/// that a gauge over some unrelated value type can still be registered.
#[derive(Debug, Clone, PartialEq)]
pub enum GaugeValue {
    Float(f32),
    Double(f64),
    Long(i64),
    Int(i32),
    Text(String),
    Bool(bool),
    Other(String),
}

impl From<f32> for GaugeValue {
    fn from(v: f32) -> Self {
        GaugeValue::Float(v)
    }
}

impl From<f64> for GaugeValue {
    fn from(v: f64) -> Self {
        GaugeValue::Double(v)
    }
}

impl From<i64> for GaugeValue {
    fn from(v: i64) -> Self {
        GaugeValue::Long(v)
    }
}

impl From<i32> for GaugeValue {
    fn from(v: i32) -> Self {
        GaugeValue::Int(v)
    }
}

impl From<String> for GaugeValue {
    fn from(v: String) -> Self {
        GaugeValue::Text(v)
    }
}

impl From<&str> for GaugeValue {
    fn from(v: &str) -> Self {
        GaugeValue::Text(v.to_string())
    }
}

impl From<bool> for GaugeValue {
    fn from(v: bool) -> Self {
        GaugeValue::Bool(v)
    }
}

#[derive(Debug, Error)]
pub enum GaugeError {
    /// The resource behind the gauge is gone and the gauge should be pruned.
    #[error("gauge source is no longer available")]
    Unavailable,
    #[error("failed to read gauge: {0}")]
    Read(String),
}

pub struct FnGauge<F> {
    f: F,
}

impl<F> FnGauge<F>
where
    F: Fn() -> Result<GaugeValue, GaugeError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        FnGauge { f }
    }
}

impl<F> GaugeMetric for FnGauge<F>
where
    F: Fn() -> Result<GaugeValue, GaugeError> + Send + Sync,
{
    fn value(&self) -> Result<GaugeValue, GaugeError> {
        (self.f)()
    }
}
