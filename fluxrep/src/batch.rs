/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use fluxrep_influxdb::{ConsistencyLevel, Point, WriteRequest};

/// Where every batch is written to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteTarget {
    pub database: String,
    pub retention_policy: String,
    pub consistency: ConsistencyLevel,
}

/// Points collected during one polling cycle.
///
/// Sealing consumes the batch, so no point can be appended afterwards.
pub struct Batch {
    target: WriteTarget,
    points: Vec<Point>,
}

impl Batch {
    pub fn open(database: &str, retention_policy: &str, consistency: ConsistencyLevel) -> Self {
        Batch::for_target(WriteTarget {
            database: database.to_string(),
            retention_policy: retention_policy.to_string(),
            consistency,
        })
    }

    pub fn for_target(target: WriteTarget) -> Self {
        Batch {
            target,
            points: Vec::new(),
        }
    }

    pub fn append(&mut self, point: Point) {
        self.points.push(point);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn seal(self) -> WriteRequest {
        WriteRequest {
            database: self.target.database,
            retention_policy: self.target.retention_policy,
            consistency: self.target.consistency,
            points: self.points,
        }
    }
}

impl Extend<Point> for Batch {
    fn extend<T: IntoIterator<Item = Point>>(&mut self, iter: T) {
        self.points.extend(iter);
    }
}
