// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Synchronous handle around a background upload worker.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              Host thread (sync)              │
//! │   Uploader::enqueue ──► IngestQueue (Arc)    │
//! └──────────────────────────────┬───────────────┘
//!                                │
//!                                ▼
//! ┌──────────────────────────────────────────────┐
//! │          "weert-uploader" OS thread          │
//! │   tokio runtime (current_thread)             │
//! │   UploadWorker: resolve once, then           │
//! │   dequeue ─► stale? ─► transform ─► publish  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The host never blocks on the network: `enqueue` only touches the queue.

use crate::config::{ConfigError, UploaderConfig};
use crate::http::{ReqwestTransport, TransportError};
use crate::publisher::{Publish, RetryingPublisher};
use crate::queue::IngestQueue;
use crate::record::Record;
use crate::resolver::{ResolutionError, ResolvedEndpoint, Resolve, StreamResolver};
use crate::stats::{UploadStats, UploadStatsSnapshot};
use crate::transform::RecordTransformer;
use crate::worker::{StateCell, UploadWorker, WorkerState};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors starting an uploader.
#[derive(Debug, Error)]
pub enum UploaderError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Transport(#[from] TransportError),

    #[error("unable to resolve destination: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("failed to start upload thread: {0}")]
    Spawn(std::io::Error),

    #[error("upload thread exited before reporting readiness")]
    WorkerExited,
}

/// Handle to a running upload worker.
pub struct Uploader {
    queue: Arc<IngestQueue>,
    stats: Arc<UploadStats>,
    state: StateCell,
    endpoint: ResolvedEndpoint,
    submitted: AtomicU64,
    thread: Option<JoinHandle<()>>,
}

impl Uploader {
    /// Validate `config`, resolve its destination and start uploading.
    ///
    /// Blocks until resolution finished.
    pub fn spawn(config: UploaderConfig) -> Result<Self, UploaderError> {
        config.validate()?;
        let destination = config
            .destination()
            .ok_or_else(|| ConfigError::Invalid("No destination configured".into()))?;

        let transport =
            ReqwestTransport::new(Duration::from_secs(config.timeout), &config.user_agent)?;
        let resolver = StreamResolver::new(
            transport.clone(),
            config.streams_url()?,
            config.stream_metadata(),
        );
        let publisher = RetryingPublisher::new(transport, config.publish_policy());

        let worker = UploadWorker::new(
            destination,
            Arc::new(IngestQueue::new(config.max_backlog)),
            resolver,
            RecordTransformer::new(config.transform_config()),
            publisher,
        )
        .with_stale(config.stale_limit())
        .with_failure_logging(config.log_failure);

        Self::spawn_worker(worker)
    }

    /// Run a pre-built worker on its own thread.
    pub fn spawn_worker<R, P>(mut worker: UploadWorker<R, P>) -> Result<Self, UploaderError>
    where
        R: Resolve + 'static,
        P: Publish + 'static,
    {
        let queue = worker.queue();
        let stats = worker.stats();
        let state = worker.state_cell();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<ResolvedEndpoint, UploaderError>>();

        let thread = thread::Builder::new()
            .name("weert-uploader".to_string())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        worker.state_cell().set(WorkerState::Stopped);
                        let _ = ready_tx.send(Err(UploaderError::Spawn(e)));
                        return;
                    }
                };

                rt.block_on(async move {
                    match worker.start().await {
                        Ok(endpoint) => {
                            let _ = ready_tx.send(Ok(endpoint));
                            worker.run().await;
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(e.into()));
                        }
                    }
                });
            })
            .map_err(UploaderError::Spawn)?;

        match ready_rx.recv() {
            Ok(Ok(endpoint)) => Ok(Self {
                queue,
                stats,
                state,
                endpoint,
                submitted: AtomicU64::new(0),
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(UploaderError::WorkerExited)
            }
        }
    }

    /// Queue a record for upload. Never blocks on the network.
    ///
    /// Returns `false` if the uploader is stopping and the record was dropped.
    pub fn enqueue(&self, record: Record) -> bool {
        let accepted = self.queue.enqueue(record);
        if accepted {
            self.submitted.fetch_add(1, Ordering::Relaxed);
        }
        accepted
    }

    /// Request a cooperative stop. The in-flight publish, if any, completes.
    pub fn stop(&self) {
        self.queue.close();
        self.state.begin_stop();
    }

    /// Stop and wait for the worker thread, returning the final statistics.
    pub fn shutdown(mut self) -> UploadStatsSnapshot {
        self.stop();
        self.join();
        self.stats()
    }

    /// Wait until every accepted record has been settled or evicted.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub fn flush(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_idle() {
                return true;
            }
            if self.state() == WorkerState::Stopped || Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn is_idle(&self) -> bool {
        let snap = self.stats();
        self.queue.is_empty()
            && snap.settled() + snap.evicted >= self.submitted.load(Ordering::Relaxed)
    }

    fn join(&mut self) {
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::error!("upload thread panicked");
            }
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state.get()
    }

    pub fn endpoint(&self) -> &ResolvedEndpoint {
        &self.endpoint
    }

    pub fn stats(&self) -> UploadStatsSnapshot {
        self.stats.snapshot(self.queue.evicted())
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }
}

impl Drop for Uploader {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop();
            self.join();
        }
    }
}
