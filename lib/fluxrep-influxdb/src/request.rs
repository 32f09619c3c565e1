/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use crate::{ConsistencyLevel, Point};

/// All points of one write, sharing the same target.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub database: String,
    pub retention_policy: String,
    pub consistency: ConsistencyLevel,
    pub points: Vec<Point>,
}

impl WriteRequest {
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
