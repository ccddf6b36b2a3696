// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Packet publishing with bounded retries.
//!
//! Response classification:
//!
//! - the configured success code: delivered, stop
//! - any other code whose body has a line starting with the error marker:
//!   rejected by the server, stop without retrying
//! - any other code, transport errors, timeouts: transient, retry after
//!   `retry_wait` until `max_tries` attempts have been made

use crate::http::{HttpResponse, HttpTransport};
use crate::resolver::ResolvedEndpoint;
use crate::transform::Payload;
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Why a packet was not delivered.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PublishError {
    #[error("server rejected packet (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("giving up after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: String },
}

impl PublishError {
    /// True when the server refused the packet itself.
    pub fn is_rejection(&self) -> bool {
        matches!(self, PublishError::Rejected { .. })
    }
}

/// Retry, classification and logging policy.
#[derive(Debug, Clone)]
pub struct PublishPolicy {
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Total attempts per packet, at least 1.
    pub max_tries: u32,
    /// Pause between attempts.
    pub retry_wait: Duration,
    /// Status meaning "accepted" (201 for current servers, 200 for older ones).
    pub success_code: u16,
    /// Body line prefix signalling a logical error.
    pub error_marker: String,
    /// Wrap the payload as `{ <envelope>: payload }`.
    pub envelope: Option<String>,
    pub log_success: bool,
    pub log_failure: bool,
}

impl Default for PublishPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_tries: 1,
            retry_wait: Duration::from_secs(5),
            success_code: 201,
            error_marker: "Error".to_string(),
            envelope: None,
            log_success: true,
            log_failure: true,
        }
    }
}

/// Delivery of one payload to one endpoint.
pub trait Publish: Send {
    fn publish(
        &self,
        endpoint: &ResolvedEndpoint,
        payload: &Payload,
    ) -> impl Future<Output = Result<(), PublishError>> + Send;
}

/// [`Publish`] implementation that retries over an [`HttpTransport`].
pub struct RetryingPublisher<T: HttpTransport> {
    transport: T,
    policy: PublishPolicy,
}

enum Attempt {
    Delivered,
    Rejected { status: u16, message: String },
    Transient(String),
}

impl<T: HttpTransport> RetryingPublisher<T> {
    pub fn new(transport: T, policy: PublishPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &PublishPolicy {
        &self.policy
    }

    fn body(&self, payload: &Payload) -> Value {
        match &self.policy.envelope {
            Some(key) => {
                let mut wrapper = Map::with_capacity(1);
                wrapper.insert(key.clone(), payload.to_value());
                Value::Object(wrapper)
            }
            None => payload.to_value(),
        }
    }

    fn classify(&self, response: &HttpResponse) -> Attempt {
        if response.status == self.policy.success_code {
            return Attempt::Delivered;
        }
        let marker = self.policy.error_marker.as_str();
        let rejection = (!marker.is_empty())
            .then(|| {
                response
                    .body
                    .lines()
                    .find(|line| line.starts_with(marker))
            })
            .flatten();
        match rejection {
            Some(line) => Attempt::Rejected {
                status: response.status,
                message: line.trim_end().to_string(),
            },
            None => Attempt::Transient(format!("unexpected HTTP status {}", response.status)),
        }
    }

    async fn attempt(&self, url: &reqwest::Url, body: &Value) -> Attempt {
        match tokio::time::timeout(self.policy.timeout, self.transport.post_json(url, body)).await
        {
            Err(_) => Attempt::Transient(format!("timed out after {:?}", self.policy.timeout)),
            Ok(Err(e)) => Attempt::Transient(e.to_string()),
            Ok(Ok(response)) => self.classify(&response),
        }
    }
}

impl<T: HttpTransport> Publish for RetryingPublisher<T> {
    async fn publish(&self, endpoint: &ResolvedEndpoint, payload: &Payload) -> Result<(), PublishError> {
        let body = self.body(payload);
        let max_tries = self.policy.max_tries.max(1);
        let mut last = String::new();

        for attempt in 1..=max_tries {
            match self.attempt(&endpoint.packets_url, &body).await {
                Attempt::Delivered => {
                    if self.policy.log_success {
                        tracing::info!(
                            timestamp = payload.timestamp_ms().unwrap_or_default(),
                            attempt,
                            "published packet to {}",
                            endpoint
                        );
                    }
                    return Ok(());
                }
                Attempt::Rejected { status, message } => {
                    if self.policy.log_failure {
                        tracing::warn!(status, "server rejected packet: {}", message);
                    }
                    return Err(PublishError::Rejected { status, message });
                }
                Attempt::Transient(reason) => {
                    tracing::debug!(attempt, max_tries, "publish attempt failed: {}", reason);
                    last = reason;
                }
            }
            if attempt < max_tries {
                tokio::time::sleep(self.policy.retry_wait).await;
            }
        }

        if self.policy.log_failure {
            tracing::warn!(
                attempts = max_tries,
                "failed to publish packet to {}: {}",
                endpoint,
                last
            );
        }
        Err(PublishError::Exhausted {
            attempts: max_tries,
            last,
        })
    }
}
