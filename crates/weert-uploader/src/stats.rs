// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Upload statistics.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters updated by the upload worker.
#[derive(Debug)]
pub struct UploadStats {
    /// Records accepted by the server.
    pub published: AtomicU64,

    /// Records given up on after exhausting their attempts.
    pub failed: AtomicU64,

    /// Records the server refused.
    pub rejected: AtomicU64,

    /// Records dropped for being too old at dequeue time.
    pub stale: AtomicU64,

    /// Records still queued when the worker stopped.
    pub discarded: AtomicU64,

    /// Creation time.
    pub created: Instant,
}

impl Default for UploadStats {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadStats {
    pub fn new() -> Self {
        Self {
            published: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            stale: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            created: Instant::now(),
        }
    }

    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale(&self) {
        self.stale.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self, count: u64) {
        self.discarded.fetch_add(count, Ordering::Relaxed);
    }

    /// Get snapshot of current stats. Evictions are counted by the queue and
    /// passed in.
    pub fn snapshot(&self, evicted: u64) -> UploadStatsSnapshot {
        UploadStatsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            evicted,
            discarded: self.discarded.load(Ordering::Relaxed),
            uptime_secs: self.created.elapsed().as_secs(),
        }
    }
}

/// Snapshot of upload statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadStatsSnapshot {
    pub published: u64,
    pub failed: u64,
    pub rejected: u64,
    pub stale: u64,
    pub evicted: u64,
    pub discarded: u64,
    pub uptime_secs: u64,
}

impl UploadStatsSnapshot {
    /// Records the worker has finished with, whatever the outcome.
    pub fn settled(&self) -> u64 {
        self.published + self.failed + self.rejected + self.stale
    }

    /// Records that never reached the server.
    pub fn dropped(&self) -> u64 {
        self.failed + self.rejected + self.stale + self.evicted + self.discarded
    }

    /// Published records per second of uptime.
    pub fn published_per_second(&self) -> f64 {
        if self.uptime_secs > 0 {
            self.published as f64 / self.uptime_secs as f64
        } else {
            0.0
        }
    }
}

impl fmt::Display for UploadStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "published={} failed={} rejected={} stale={} evicted={} discarded={}",
            self.published, self.failed, self.rejected, self.stale, self.evicted, self.discarded
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_snapshot() {
        let stats = UploadStats::new();
        stats.record_published();
        stats.record_published();
        stats.record_failed();
        stats.record_rejected();
        stats.record_stale();
        stats.record_discarded(4);

        let snap = stats.snapshot(3);
        assert_eq!(snap.published, 2);
        assert_eq!(snap.settled(), 5);
        assert_eq!(snap.dropped(), 1 + 1 + 1 + 3 + 4);
        assert_eq!(
            snap.to_string(),
            "published=2 failed=1 rejected=1 stale=1 evicted=3 discarded=4"
        );
    }

    #[test]
    fn test_rate_without_uptime() {
        let snap = UploadStatsSnapshot {
            published: 10,
            ..Default::default()
        };
        assert_eq!(snap.published_per_second(), 0.0);
    }
}
