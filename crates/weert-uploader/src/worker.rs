// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Upload worker state machine.
//!
//! ```text
//!  STARTING ──resolve ok──► RUNNING ──queue closed──► STOPPING ──► STOPPED
//!     │                                                              ▲
//!     └──────────────────────resolve failed──────────────────────────┘
//! ```
//!
//! While RUNNING the worker loops over {dequeue, staleness check, transform,
//! publish}, one record at a time. A stop request is observed between
//! records; a publish already in flight runs to completion (retries
//! included). Whatever is still queued once the loop exits is discarded.

use crate::config::Destination;
use crate::publisher::Publish;
use crate::queue::{IngestQueue, QueueEntry};
use crate::resolver::{ResolutionError, ResolvedEndpoint, Resolve};
use crate::stats::UploadStats;
use crate::transform::RecordTransformer;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle of an upload worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Starting = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => WorkerState::Starting,
            1 => WorkerState::Running,
            2 => WorkerState::Stopping,
            _ => WorkerState::Stopped,
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Starting => "STARTING",
            WorkerState::Running => "RUNNING",
            WorkerState::Stopping => "STOPPING",
            WorkerState::Stopped => "STOPPED",
        };
        f.write_str(s)
    }
}

/// Shared, observable worker state.
#[derive(Debug, Clone)]
pub struct StateCell(Arc<AtomicU8>);

impl Default for StateCell {
    fn default() -> Self {
        Self(Arc::new(AtomicU8::new(WorkerState::Starting as u8)))
    }
}

impl StateCell {
    pub fn get(&self) -> WorkerState {
        WorkerState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: WorkerState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// RUNNING -> STOPPING. Other states are left alone.
    pub fn begin_stop(&self) {
        let _ = self.0.compare_exchange(
            WorkerState::Running as u8,
            WorkerState::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

/// Background worker draining one queue into one destination.
pub struct UploadWorker<R: Resolve, P: Publish> {
    destination: Destination,
    queue: Arc<IngestQueue>,
    resolver: R,
    transformer: RecordTransformer,
    publisher: P,
    stale: Option<Duration>,
    log_failure: bool,
    stats: Arc<UploadStats>,
    state: StateCell,
    endpoint: Option<ResolvedEndpoint>,
}

impl<R: Resolve, P: Publish> UploadWorker<R, P> {
    pub fn new(
        destination: Destination,
        queue: Arc<IngestQueue>,
        resolver: R,
        transformer: RecordTransformer,
        publisher: P,
    ) -> Self {
        Self {
            destination,
            queue,
            resolver,
            transformer,
            publisher,
            stale: None,
            log_failure: true,
            stats: Arc::new(UploadStats::new()),
            state: StateCell::default(),
            endpoint: None,
        }
    }

    /// Drop records older than `limit` at dequeue time. `None` disables.
    pub fn with_stale(mut self, limit: Option<Duration>) -> Self {
        self.stale = limit;
        self
    }

    /// Log stale drops.
    pub fn with_failure_logging(mut self, enabled: bool) -> Self {
        self.log_failure = enabled;
        self
    }

    pub fn queue(&self) -> Arc<IngestQueue> {
        Arc::clone(&self.queue)
    }

    pub fn stats(&self) -> Arc<UploadStats> {
        Arc::clone(&self.stats)
    }

    pub fn state_cell(&self) -> StateCell {
        self.state.clone()
    }

    pub fn state(&self) -> WorkerState {
        self.state.get()
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Endpoint resolved by [`start`](Self::start).
    pub fn endpoint(&self) -> Option<&ResolvedEndpoint> {
        self.endpoint.as_ref()
    }

    /// STARTING: resolve the destination once.
    ///
    /// On failure the worker goes straight to STOPPED without touching the
    /// queue.
    pub async fn start(&mut self) -> Result<ResolvedEndpoint, ResolutionError> {
        self.state.set(WorkerState::Starting);
        match self.resolver.resolve(&self.destination).await {
            Ok(endpoint) => {
                tracing::info!(destination = %self.destination, "publishing to {}", endpoint);
                self.endpoint = Some(endpoint.clone());
                self.state.set(WorkerState::Running);
                Ok(endpoint)
            }
            Err(e) => {
                tracing::error!(destination = %self.destination, "unable to resolve: {}", e);
                self.state.set(WorkerState::Stopped);
                Err(e)
            }
        }
    }

    /// RUNNING until the queue is closed, then STOPPING and STOPPED.
    pub async fn run(&mut self) {
        let Some(endpoint) = self.endpoint.clone() else {
            self.state.set(WorkerState::Stopped);
            return;
        };

        while let Some(entry) = self.queue.dequeue().await {
            self.process(&endpoint, entry).await;
        }

        self.state.set(WorkerState::Stopping);
        let discarded = self.queue.drain() as u64;
        self.stats.record_discarded(discarded);
        self.state.set(WorkerState::Stopped);
        tracing::info!(discarded, "upload worker stopped");
    }

    async fn process(&self, endpoint: &ResolvedEndpoint, entry: QueueEntry) {
        if let Some(limit) = self.stale {
            let age = entry.enqueued_at.elapsed();
            if age > limit {
                self.stats.record_stale();
                if self.log_failure {
                    tracing::debug!(
                        timestamp = entry.record.timestamp,
                        age_secs = age.as_secs(),
                        limit_secs = limit.as_secs(),
                        "record is stale, discarded"
                    );
                }
                return;
            }
        }

        let payload = self.transformer.transform(&entry.record);
        match self.publisher.publish(endpoint, &payload).await {
            Ok(()) => self.stats.record_published(),
            Err(e) if e.is_rejection() => self.stats.record_rejected(),
            Err(_) => self.stats.record_failed(),
        }
    }
}
