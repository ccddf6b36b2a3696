// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded ingestion queue between the producer and the upload worker.
//!
//! `enqueue` never blocks and never fails: when the queue is full the oldest
//! entry is evicted. `dequeue` waits until an entry arrives or the queue is
//! closed.

use crate::record::Record;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Notify;
use tokio::time::Instant;

/// A queued record and the moment it was queued.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub record: Record,
    pub enqueued_at: Instant,
}

impl QueueEntry {
    pub fn new(record: Record) -> Self {
        Self {
            record,
            enqueued_at: Instant::now(),
        }
    }
}

/// Bounded FIFO with oldest-first eviction.
pub struct IngestQueue {
    entries: Mutex<VecDeque<QueueEntry>>,
    capacity: usize,
    notify: Notify,
    closed: AtomicBool,
    evicted: AtomicU64,
}

impl IngestQueue {
    /// Create a queue holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            evicted: AtomicU64::new(0),
        }
    }

    /// Append a record, evicting the oldest entries if the queue is full.
    ///
    /// Records offered after [`close`](Self::close) are dropped and `false`
    /// is returned.
    pub fn enqueue(&self, record: Record) -> bool {
        let mut evicted = 0u64;
        {
            let mut entries = self.entries.lock();
            // Checked under the lock so nothing lands after close + drain.
            if self.is_closed() {
                return false;
            }
            while entries.len() >= self.capacity {
                entries.pop_front();
                evicted += 1;
            }
            entries.push_back(QueueEntry::new(record));
        }
        if evicted > 0 {
            let total = self.evicted.fetch_add(evicted, Ordering::Relaxed) + evicted;
            tracing::debug!(evicted, total, "backlog full, dropped oldest record");
        }
        self.notify.notify_one();
        true
    }

    /// Wait for the next entry.
    ///
    /// Returns `None` once the queue is closed, even if entries remain.
    pub async fn dequeue(&self) -> Option<QueueEntry> {
        loop {
            if self.is_closed() {
                return None;
            }
            if let Some(entry) = self.try_dequeue() {
                return Some(entry);
            }
            self.notify.notified().await;
        }
    }

    /// Take the next entry without waiting.
    pub fn try_dequeue(&self) -> Option<QueueEntry> {
        self.entries.lock().pop_front()
    }

    /// Stop handing out entries and wake a waiting consumer.
    pub fn close(&self) {
        {
            let _entries = self.entries.lock();
            self.closed.store(true, Ordering::Release);
        }
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Discard every queued entry, returning how many were dropped.
    pub fn drain(&self) -> usize {
        let mut entries = self.entries.lock();
        let n = entries.len();
        entries.clear();
        n
    }

    /// Total entries evicted because the queue was full.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
