/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;

/// Hierarchical identifier of one measurement source.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MetricName {
    group: String,
    r#type: String,
    name: String,
    scope: Option<String>,
}

impl MetricName {
    pub fn new(group: &str, r#type: &str, name: &str) -> Self {
        MetricName {
            group: group.to_string(),
            r#type: r#type.to_string(),
            name: name.to_string(),
            scope: None,
        }
    }

    pub fn with_scope(group: &str, r#type: &str, name: &str, scope: &str) -> Self {
        MetricName {
            group: group.to_string(),
            r#type: r#type.to_string(),
            name: name.to_string(),
            scope: Some(scope.to_string()),
        }
    }

    #[inline]
    pub fn group(&self) -> &str {
        &self.group
    }

    #[inline]
    pub fn r#type(&self) -> &str {
        &self.r#type
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn has_scope(&self) -> bool {
        self.scope.is_some()
    }

    /// The registry category this metric is listed under:
    /// `<group>.<type>` followed by `.<scope>` when a scope is set.
    pub fn category(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{}.{}.{scope}", self.group, self.r#type),
            None => format!("{}.{}", self.group, self.r#type),
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.group, self.r#type, self.name)
    }
}
