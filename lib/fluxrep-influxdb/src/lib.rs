/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod point;
pub use point::{FieldSet, FieldValue, Point, TagSet};

mod consistency;
pub use consistency::{ConsistencyLevel, ParseConsistencyError};

mod request;
pub use request::WriteRequest;

pub mod line;

mod sink;
pub use sink::{BatchSink, WriteError};

mod client;
pub use client::{ClientConfigError, InfluxdbClient};
