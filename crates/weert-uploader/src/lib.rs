// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WeeRT Uploader
//!
//! Ships weather-station records to a WeeRT-style time-series server from a
//! background worker, without ever blocking the producing host.
//!
//! # Features
//!
//! - **Bounded Backlog**: oldest records are evicted when the queue is full
//! - **Stream Resolution**: a stream name is looked up, or created, once
//! - **Unit Conversion**: values are converted to one target unit system
//! - **Retries**: bounded attempts with a fixed wait, logical rejections
//!   are never retried
//! - **Staleness**: records that waited too long in the queue are dropped
//!
//! # Quick Start
//!
//! ```no_run
//! use weert_uploader::{Record, Uploader, UploaderConfig, UnitSystem};
//!
//! let config = UploaderConfig::for_stream_name("http://localhost:3000", "backyard");
//! let uploader = Uploader::spawn(config)?;
//!
//! uploader.enqueue(Record::new(1_455_000_000, UnitSystem::Us).with("outTemp", 41.2));
//!
//! let stats = uploader.shutdown();
//! println!("{}", stats);
//! # Ok::<(), weert_uploader::UploaderError>(())
//! ```
//!
//! # Configuration File
//!
//! ```yaml
//! stream_name: backyard
//! server_url: http://localhost:3000
//! obs_types: [outTemp, outHumidity, barometer]
//! max_tries: 3
//! retry_wait: 5
//! stale: 60
//! ```

pub mod config;
pub mod http;
pub mod publisher;
pub mod queue;
pub mod record;
pub mod resolver;
pub mod stats;
pub mod transform;
pub mod units;
pub mod uploader;
pub mod worker;

pub use config::{ConfigError, Destination, UploaderConfig};
pub use http::{HttpResponse, HttpTransport, ReqwestTransport, TransportError};
pub use publisher::{Publish, PublishError, PublishPolicy, RetryingPublisher};
pub use queue::{IngestQueue, QueueEntry};
pub use record::{Record, RecordError};
pub use resolver::{ResolutionError, ResolvedEndpoint, Resolve, StreamMetadata, StreamResolver};
pub use stats::{UploadStats, UploadStatsSnapshot};
pub use transform::{transform, Payload, RecordTransformer, TransformConfig};
pub use units::{convert, UnitGroup, UnitSystem};
pub use uploader::{Uploader, UploaderError};
pub use worker::{StateCell, UploadWorker, WorkerState};
