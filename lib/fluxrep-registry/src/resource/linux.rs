/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fs;
use std::io;
use std::path::PathBuf;

use log::trace;
use rustix::process::Resource;

use super::{ResourceSnapshot, ResourceSource};

const THREAD_STATES: &[(&str, &[u8])] = &[
    ("runnable", b"R"),
    ("waiting", b"S"),
    ("blocked", b"D"),
    ("stopped", b"Tt"),
    ("idle", b"I"),
    ("terminated", b"ZX"),
];

/// Resource usage of the current process read from procfs.
///
/// Native processes have no heap/non-heap split or collectors: the heap
/// maps to anonymous resident memory, the non-heap part to file backed and
/// shared resident memory, and the collector list is always empty. There is
/// no daemon thread notion either, so that count is always 0.
pub struct ProcessResourceSource {
    proc_dir: PathBuf,
}

impl Default for ProcessResourceSource {
    fn default() -> Self {
        ProcessResourceSource::new()
    }
}

impl ProcessResourceSource {
    pub fn new() -> Self {
        ProcessResourceSource {
            proc_dir: PathBuf::from("/proc"),
        }
    }

    fn read_self(&self, file: &str) -> io::Result<String> {
        fs::read_to_string(self.proc_dir.join("self").join(file))
    }

    fn uptime_secs(&self, stat: &str) -> io::Result<i64> {
        let start_ticks = parse_stat_field(stat, 22)
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| io::Error::other("invalid starttime in stat"))?;
        let uptime = fs::read_to_string(self.proc_dir.join("uptime"))?;
        let system_uptime = uptime
            .split_whitespace()
            .next()
            .and_then(|v| v.parse::<f64>().ok())
            .ok_or_else(|| io::Error::other("invalid /proc/uptime content"))?;
        let hz = rustix::param::clock_ticks_per_second().max(1);
        let started = start_ticks as f64 / hz as f64;
        Ok((system_uptime - started).max(0.0) as i64)
    }

    fn fd_usage(&self) -> io::Result<f64> {
        let opened = fs::read_dir(self.proc_dir.join("self").join("fd"))?
            .filter(|e| e.is_ok())
            .count();
        match rustix::process::getrlimit(Resource::Nofile).current {
            Some(limit) if limit > 0 => Ok(opened as f64 / limit as f64),
            _ => Ok(0.0),
        }
    }

    fn thread_states(&self) -> io::Result<Vec<(String, f64)>> {
        let mut counts = [0usize; THREAD_STATES.len()];
        let mut total = 0usize;
        for entry in fs::read_dir(self.proc_dir.join("self").join("task"))? {
            let Ok(entry) = entry else {
                continue;
            };
            // threads may exit while we are iterating
            let Ok(stat) = fs::read_to_string(entry.path().join("stat")) else {
                continue;
            };
            let Some(state) = parse_stat_field(&stat, 3).and_then(|s| s.bytes().next()) else {
                continue;
            };
            total += 1;
            if let Some(i) = THREAD_STATES.iter().position(|(_, c)| c.contains(&state)) {
                counts[i] += 1;
            }
        }

        Ok(THREAD_STATES
            .iter()
            .zip(counts)
            .map(|((name, _), count)| {
                let share = if total > 0 {
                    count as f64 / total as f64
                } else {
                    0.0
                };
                (name.to_string(), share)
            })
            .collect())
    }
}

impl ResourceSource for ProcessResourceSource {
    fn snapshot(&self) -> io::Result<ResourceSnapshot> {
        let status = self.read_self("status")?;
        let stat = self.read_self("stat")?;
        let meminfo = fs::read_to_string(self.proc_dir.join("meminfo"))?;

        let mem_total = parse_kb(&meminfo, "MemTotal:").unwrap_or(0);
        let rss = parse_kb(&status, "VmRSS:").unwrap_or(0);
        let rss_anon = parse_kb(&status, "RssAnon:").unwrap_or(0);
        let rss_file = parse_kb(&status, "RssFile:").unwrap_or(0);
        let rss_shmem = parse_kb(&status, "RssShmem:").unwrap_or(0);
        let swap = parse_kb(&status, "VmSwap:").unwrap_or(0);

        let ratio = |v: u64, total: u64| {
            if total > 0 {
                v as f64 / total as f64
            } else {
                0.0
            }
        };

        let snapshot = ResourceSnapshot {
            heap_usage: ratio(rss_anon, mem_total),
            non_heap_usage: ratio(rss_file + rss_shmem, mem_total),
            memory_pool_usage: vec![
                ("rss_anon".to_string(), ratio(rss_anon, rss)),
                ("rss_file".to_string(), ratio(rss_file, rss)),
                ("rss_shmem".to_string(), ratio(rss_shmem, rss)),
                ("swap".to_string(), ratio(swap, mem_total)),
            ],
            daemon_thread_count: 0,
            thread_count: parse_kb(&status, "Threads:").unwrap_or(0) as i64,
            uptime_secs: self.uptime_secs(&stat)?,
            fd_usage: self.fd_usage()?,
            thread_states: self.thread_states()?,
            garbage_collectors: Vec::new(),
        };
        trace!("read process resource snapshot: {snapshot:?}");
        Ok(snapshot)
    }
}

/// Parse the first number after `key` in a `/proc` key/value file.
fn parse_kb(content: &str, key: &str) -> Option<u64> {
    content
        .lines()
        .find_map(|line| line.strip_prefix(key))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|v| v.parse::<u64>().ok())
}

/// Get the 1-based field `n` of a `/proc/<pid>/stat` line.
///
/// The command name in field 2 may contain spaces and parentheses, so the
/// fields after it are located from the last `)`.
fn parse_stat_field(stat: &str, n: usize) -> Option<&str> {
    if n < 3 {
        return None;
    }
    let (_, rest) = stat.rsplit_once(')')?;
    rest.split_whitespace().nth(n - 3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stat_fields() {
        let stat = "1234 (my (odd) proc) S 1 1234 1234 0 -1 4194560 100 0 0 0 \
                    5 3 0 0 20 0 4 0 98765 1000000 200";
        assert_eq!(parse_stat_field(stat, 3), Some("S"));
        assert_eq!(parse_stat_field(stat, 4), Some("1"));
        assert_eq!(parse_stat_field(stat, 22), Some("98765"));
        assert_eq!(parse_stat_field(stat, 1), None);
    }

    #[test]
    fn status_values() {
        let status = "Name:\tfluxrep\nVmRSS:\t   2048 kB\nThreads:\t5\n";
        assert_eq!(parse_kb(status, "VmRSS:"), Some(2048));
        assert_eq!(parse_kb(status, "Threads:"), Some(5));
        assert_eq!(parse_kb(status, "VmSwap:"), None);
    }

    #[test]
    fn current_process() {
        let snapshot = ProcessResourceSource::new().snapshot().unwrap();
        assert!(snapshot.thread_count >= 1);
        assert!(snapshot.uptime_secs >= 0);
        assert!(snapshot.fd_usage > 0.0);
        let total: f64 = snapshot.thread_states.iter().map(|(_, v)| v).sum();
        assert!(total <= 1.0 + 1e-9);
        assert_eq!(snapshot.thread_states.len(), THREAD_STATES.len());
    }
}
