/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use indexmap::IndexMap;

/// Tag key to value, in insertion order. Inserting an existing key
/// overwrites its value in place.
pub type TagSet = IndexMap<String, String>;

pub type FieldSet = IndexMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Text(_) => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

/// One measurement at one millisecond timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    timestamp_ms: i64,
    tags: TagSet,
    fields: FieldSet,
}

impl Point {
    pub fn new(measurement: &str, timestamp_ms: i64) -> Self {
        Point {
            measurement: measurement.to_string(),
            timestamp_ms,
            tags: TagSet::new(),
            fields: FieldSet::new(),
        }
    }

    #[inline]
    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    #[inline]
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    #[inline]
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    #[inline]
    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(|v| v.as_str())
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn add_tag(&mut self, key: &str, value: &str) {
        self.tags.insert(key.to_string(), value.to_string());
    }

    pub fn extend_tags(&mut self, tags: &TagSet) {
        for (k, v) in tags {
            self.tags.insert(k.clone(), v.clone());
        }
    }

    pub fn add_field<V: Into<FieldValue>>(&mut self, key: &str, value: V) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub fn has_fields(&self) -> bool {
        !self.fields.is_empty()
    }
}
