/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

//! InfluxDB line protocol encoding.
//!
//! See <https://docs.influxdata.com/influxdb/v1/write_protocols/line_protocol_reference/>

use crate::{FieldValue, Point};

fn write_escaped(buf: &mut Vec<u8>, s: &str, special: &[u8]) {
    for b in s.bytes() {
        if special.contains(&b) {
            buf.push(b'\\');
        }
        buf.push(b);
    }
}

#[inline]
fn write_measurement(buf: &mut Vec<u8>, s: &str) {
    write_escaped(buf, s, b", ");
}

#[inline]
fn write_key(buf: &mut Vec<u8>, s: &str) {
    write_escaped(buf, s, b",= ");
}

fn write_field_value(buf: &mut Vec<u8>, value: &FieldValue) {
    match value {
        FieldValue::Float(f) => {
            let mut b = ryu::Buffer::new();
            buf.extend_from_slice(b.format_finite(*f).as_bytes());
        }
        FieldValue::Integer(i) => {
            let mut b = itoa::Buffer::new();
            buf.extend_from_slice(b.format(*i).as_bytes());
            buf.push(b'i');
        }
        FieldValue::Text(s) => {
            buf.push(b'"');
            write_escaped(buf, s, b"\"\\");
            buf.push(b'"');
        }
    }
}

fn is_writable(value: &FieldValue) -> bool {
    match value {
        FieldValue::Float(f) => f.is_finite(),
        _ => true,
    }
}

/// Append the line for `point` to `buf`, with a trailing newline.
///
/// Tags are written sorted by key and tags with an empty key or value are
/// left out. Non-finite float fields are dropped, and nothing is written if
/// no field is left, in which case false is returned.
pub fn encode_point(buf: &mut Vec<u8>, point: &Point) -> bool {
    if !point.fields().values().any(is_writable) {
        return false;
    }

    write_measurement(buf, point.measurement());

    let mut tags: Vec<(&String, &String)> = point
        .tags()
        .iter()
        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
        .collect();
    tags.sort_unstable_by(|a, b| a.0.cmp(b.0));
    for (k, v) in tags {
        buf.push(b',');
        write_key(buf, k);
        buf.push(b'=');
        write_key(buf, v);
    }

    let mut sep = b' ';
    for (k, v) in point.fields() {
        if !is_writable(v) {
            continue;
        }
        buf.push(sep);
        write_key(buf, k);
        buf.push(b'=');
        write_field_value(buf, v);
        sep = b',';
    }

    buf.push(b' ');
    let mut ts = itoa::Buffer::new();
    buf.extend_from_slice(ts.format(point.timestamp_ms()).as_bytes());
    buf.push(b'\n');
    true
}

/// Encode all points into `buf`, returning the number of lines written.
pub fn encode_points<'a, I>(buf: &mut Vec<u8>, points: I) -> usize
where
    I: IntoIterator<Item = &'a Point>,
{
    points
        .into_iter()
        .filter(|p| encode_point(buf, p))
        .count()
}
