/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::WriteRequest;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to connect to {peer}: {source}")]
    Connect {
        peer: String,
        source: reqwest::Error,
    },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to read response body: {0}")]
    Io(#[from] io::Error),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("error response: {status} {body}")]
    Response { status: u16, body: String },
}

/// Destination of one sealed batch per polling cycle.
pub trait BatchSink: Send + Sync {
    fn write(&self, request: WriteRequest) -> Result<(), WriteError>;
}

impl<T: BatchSink + ?Sized> BatchSink for Arc<T> {
    fn write(&self, request: WriteRequest) -> Result<(), WriteError> {
        (**self).write(request)
    }
}

impl<T: BatchSink + ?Sized> BatchSink for Box<T> {
    fn write(&self, request: WriteRequest) -> Result<(), WriteError> {
        (**self).write(request)
    }
}
