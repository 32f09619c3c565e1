/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod batch;
pub use batch::{Batch, WriteTarget};

mod dimension;
pub use dimension::{DIMENSION_FLAG_PREFIX, Dimension, DimensionSet};

mod error;
pub use error::{ConfigError, ReporterError, TranslateError};

pub mod tags;

pub mod translate;
pub use translate::PointBuilder;

mod reporter;
pub use reporter::{Reporter, ReporterBuilder, ReporterState, TickReport};

pub mod config;

pub mod build;
pub mod log;
pub mod opts;
