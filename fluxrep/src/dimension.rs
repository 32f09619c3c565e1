/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;

/// Prefix of the flat `<prefix><facet key> = <bool>` dimension flags.
pub const DIMENSION_FLAG_PREFIX: &str = "dimension.enabled.";

/// One selectable numeric facet of a meter, histogram or timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dimension {
    Count,
    MeanRate,
    Rate1m,
    Rate5m,
    Rate15m,
    Min,
    Max,
    Mean,
    StdDev,
    Sum,
    Median,
    P75,
    P95,
    P98,
    P99,
    P999,
}

impl Dimension {
    pub const ALL: [Dimension; 16] = [
        Dimension::Count,
        Dimension::MeanRate,
        Dimension::Rate1m,
        Dimension::Rate5m,
        Dimension::Rate15m,
        Dimension::Min,
        Dimension::Max,
        Dimension::Mean,
        Dimension::StdDev,
        Dimension::Sum,
        Dimension::Median,
        Dimension::P75,
        Dimension::P95,
        Dimension::P98,
        Dimension::P99,
        Dimension::P999,
    ];

    /// The key used in configuration flags.
    pub const fn key(&self) -> &'static str {
        match self {
            Dimension::Count => "count",
            Dimension::MeanRate => "meanRate",
            Dimension::Rate1m => "rate1m",
            Dimension::Rate5m => "rate5m",
            Dimension::Rate15m => "rate15m",
            Dimension::Min => "min",
            Dimension::Max => "max",
            Dimension::Mean => "mean",
            Dimension::StdDev => "stddev",
            Dimension::Sum => "sum",
            Dimension::Median => "median",
            Dimension::P75 => "p75",
            Dimension::P95 => "p95",
            Dimension::P98 => "p98",
            Dimension::P99 => "p99",
            Dimension::P999 => "p999",
        }
    }

    /// The field name used in emitted points.
    pub const fn display_name(&self) -> &'static str {
        match self {
            Dimension::Rate1m => "1MinuteRate",
            Dimension::Rate5m => "5MinuteRate",
            Dimension::Rate15m => "15MinuteRate",
            _ => self.key(),
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Dimension::ALL
            .into_iter()
            .find(|d| d.key().eq_ignore_ascii_case(key))
    }

    #[inline]
    const fn bit(self) -> u32 {
        1 << self as u32
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DimensionSet(u32);

impl Default for DimensionSet {
    fn default() -> Self {
        DimensionSet::all()
    }
}

impl DimensionSet {
    pub const fn all() -> Self {
        DimensionSet((1 << Dimension::ALL.len()) - 1)
    }

    pub const fn empty() -> Self {
        DimensionSet(0)
    }

    /// Derive the enabled set from flat key/value flags.
    ///
    /// Every facet is enabled unless `<prefix><facet key>` is present with
    /// the value `false` (case insensitive). Any other value, including a
    /// malformed boolean, leaves the facet enabled. Unknown keys are ignored.
    pub fn from_flags<I, K, V>(prefix: &str, flags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut set = DimensionSet::all();
        for (k, v) in flags {
            let Some(key) = k.as_ref().strip_prefix(prefix) else {
                continue;
            };
            let Some(dimension) = Dimension::from_key(key) else {
                continue;
            };
            if v.as_ref().trim().eq_ignore_ascii_case("false") {
                set.remove(dimension);
            }
        }
        set
    }

    #[inline]
    pub fn contains(&self, dimension: Dimension) -> bool {
        self.0 & dimension.bit() != 0
    }

    pub fn insert(&mut self, dimension: Dimension) {
        self.0 |= dimension.bit();
    }

    pub fn remove(&mut self, dimension: Dimension) {
        self.0 &= !dimension.bit();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Dimension> + '_ {
        Dimension::ALL.into_iter().filter(|d| self.contains(*d))
    }
}

impl FromIterator<Dimension> for DimensionSet {
    fn from_iter<T: IntoIterator<Item = Dimension>>(iter: T) -> Self {
        let mut set = DimensionSet::empty();
        for d in iter {
            set.insert(d);
        }
        set
    }
}

impl fmt::Debug for DimensionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|d| d.key())).finish()
    }
}
