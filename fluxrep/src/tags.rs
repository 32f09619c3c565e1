/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use fluxrep_influxdb::TagSet;
use fluxrep_registry::MetricName;

use crate::error::ConfigError;

pub const TAG_KEY_GROUP: &str = "group";
pub const TAG_KEY_TYPE: &str = "type";
pub const TAG_KEY_SCOPE: &str = "scope";

/// Flatten the identifier of a metric into tags.
///
/// `group` and `type` are always set. A scope with an even number of
/// `.`-separated tokens is read as consecutive key/value pairs, so
/// `topic.orders.partition.3` gives `topic=orders` and `partition=3`.
/// Any other non-empty scope is kept whole in a single `scope` tag.
pub fn decompose(name: &MetricName) -> TagSet {
    let mut tags = TagSet::with_capacity(4);
    tags.insert(TAG_KEY_GROUP.to_string(), name.group().to_string());
    tags.insert(TAG_KEY_TYPE.to_string(), name.r#type().to_string());
    if let Some(scope) = name.scope() {
        add_scope_tags(&mut tags, scope);
    }
    tags
}

pub fn add_scope_tags(tags: &mut TagSet, scope: &str) {
    if scope.is_empty() {
        return;
    }

    let tokens: Vec<&str> = scope.split('.').collect();
    if tokens.len() % 2 == 0 {
        for pair in tokens.chunks_exact(2) {
            tags.insert(pair[0].to_string(), pair[1].to_string());
        }
    } else {
        tags.insert(TAG_KEY_SCOPE.to_string(), scope.to_string());
    }
}

/// Parse the `key:value[,key:value...]` base tag string.
///
/// An empty string gives no tags. Every other segment must contain exactly
/// one `:`, surrounding spaces are trimmed.
pub fn parse_base_tags(s: &str) -> Result<TagSet, ConfigError> {
    let mut tags = TagSet::new();
    if s.trim().is_empty() {
        return Ok(tags);
    }

    for segment in s.split(',') {
        let mut parts = segment.split(':');
        let (Some(k), Some(v), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ConfigError::InvalidTag(segment.to_string()));
        };
        let k = k.trim();
        if k.is_empty() {
            return Err(ConfigError::EmptyTagKey(segment.to_string()));
        }
        tags.insert(k.to_string(), v.trim().to_string());
    }
    Ok(tags)
}
