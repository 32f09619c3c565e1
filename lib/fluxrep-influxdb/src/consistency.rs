/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Write acknowledgement policy requested from a clustered server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConsistencyLevel {
    One,
    Any,
    #[default]
    All,
    Quorum,
}

#[derive(Debug, Error)]
#[error("unknown consistency level {0}, expected one of one|any|all|quorum")]
pub struct ParseConsistencyError(String);

impl ConsistencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyLevel::One => "one",
            ConsistencyLevel::Any => "any",
            ConsistencyLevel::All => "all",
            ConsistencyLevel::Quorum => "quorum",
        }
    }
}

impl FromStr for ConsistencyLevel {
    type Err = ParseConsistencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one" => Ok(ConsistencyLevel::One),
            "any" => Ok(ConsistencyLevel::Any),
            "all" => Ok(ConsistencyLevel::All),
            "quorum" => Ok(ConsistencyLevel::Quorum),
            _ => Err(ParseConsistencyError(s.to_string())),
        }
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
