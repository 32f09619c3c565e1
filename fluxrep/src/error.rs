/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use thiserror::Error;

use fluxrep_influxdb::{ClientConfigError, ParseConsistencyError};
use fluxrep_registry::{GaugeError, MetricName};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid tag segment {0:?}, expected exactly one ':' between key and value")]
    InvalidTag(String),
    #[error("empty tag key in segment {0:?}")]
    EmptyTagKey(String),
    #[error(transparent)]
    InvalidConsistency(#[from] ParseConsistencyError),
    #[error("invalid sink config: {0}")]
    InvalidSink(#[from] ClientConfigError),
    #[error("polling interval should not be zero")]
    ZeroInterval,
}

/// Why one metric produced no point.
#[derive(Debug, Error)]
pub enum TranslateError {
    /// The gauge source is gone, the registry owner may prune the metric.
    #[error("invalid gauge {name}")]
    InvalidGauge { name: MetricName },
    #[error("failed to read gauge {name}: {source}")]
    GaugeRead { name: String, source: GaugeError },
    #[error("no field left for {name} after dimension filtering")]
    NoFields { name: String },
}

#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("reporter has been stopped")]
    Stopped,
    #[error("polling interval should not be zero")]
    ZeroInterval,
    #[error("failed to spawn poll thread: {0}")]
    Spawn(#[from] std::io::Error),
}
