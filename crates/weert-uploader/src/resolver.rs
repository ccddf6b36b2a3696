// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stream resolution.
//!
//! Turns a [`Destination`] into the packet endpoint of a remote stream:
//!
//! ```text
//! Destination::Id(id)     --> <streams>/<id>/packets                 (no I/O)
//! Destination::Name(name) --> GET  <streams>?query={"name":{"$eq":name}}
//!                             [] --> POST <streams> {name, description, unit_group}
//!                                    --> Location header (or body `_id`)
//! ```
//!
//! Lookup-then-create is not atomic. Two resolvers racing on the same name
//! can create two streams; one uploader per stream name is assumed.

use crate::config::Destination;
use crate::http::{HttpTransport, TransportError};
use reqwest::Url;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::SystemTime;
use thiserror::Error;

/// Why a destination could not be resolved.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolutionError {
    #[error("stream collection request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("{action} returned HTTP {status}")]
    Status { action: &'static str, status: u16 },

    #[error("invalid response from server: {0}")]
    InvalidResponse(String),

    #[error("invalid stream URL '{0}'")]
    InvalidUrl(String),
}

/// Where packets for a destination are posted.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEndpoint {
    /// URL of the stream resource.
    pub stream_url: Url,
    /// URL packets are POSTed to.
    pub packets_url: Url,
    /// When the resolution happened.
    pub resolved_at: SystemTime,
}

impl ResolvedEndpoint {
    /// Build an endpoint from a stream URL (`<stream>/packets`).
    pub fn from_stream_url(stream_url: &str) -> Result<Self, ResolutionError> {
        let trimmed = stream_url.trim_end_matches([' ', '/']);
        let stream_url =
            Url::parse(trimmed).map_err(|_| ResolutionError::InvalidUrl(stream_url.to_string()))?;
        let packets_url = Url::parse(&format!("{}/packets", trimmed))
            .map_err(|_| ResolutionError::InvalidUrl(stream_url.to_string()))?;
        Ok(Self {
            stream_url,
            packets_url,
            resolved_at: SystemTime::now(),
        })
    }
}

impl fmt::Display for ResolvedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.packets_url)
    }
}

/// Metadata sent when a stream has to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMetadata {
    pub description: String,
    pub unit_group: String,
}

impl Default for StreamMetadata {
    fn default() -> Self {
        Self {
            description: "Stream for weewx".to_string(),
            unit_group: "METRICWX".to_string(),
        }
    }
}

/// Destination resolution.
pub trait Resolve: Send {
    fn resolve(
        &mut self,
        destination: &Destination,
    ) -> impl Future<Output = Result<ResolvedEndpoint, ResolutionError>> + Send;
}

/// Resolves destinations against a stream collection, creating streams on
/// demand. Results are cached for the lifetime of the resolver.
pub struct StreamResolver<T: HttpTransport> {
    transport: T,
    streams_url: Url,
    metadata: StreamMetadata,
    cache: HashMap<Destination, ResolvedEndpoint>,
}

impl<T: HttpTransport> StreamResolver<T> {
    /// `streams_url` is the collection endpoint, e.g.
    /// `http://localhost:3000/api/v1/streams`.
    pub fn new(transport: T, streams_url: Url, metadata: StreamMetadata) -> Self {
        Self {
            transport,
            streams_url,
            metadata,
            cache: HashMap::new(),
        }
    }

    pub fn streams_url(&self) -> &Url {
        &self.streams_url
    }

    /// Cached endpoint for a destination, if it was resolved already.
    pub fn cached(&self, destination: &Destination) -> Option<&ResolvedEndpoint> {
        self.cache.get(destination)
    }

    /// URL of the stream with the given identifier.
    fn stream_url_for_id(&self, id: &str) -> String {
        format!(
            "{}/{}",
            self.streams_url.as_str().trim_end_matches('/'),
            id.trim_matches('/')
        )
    }

    /// Turn a server-provided location into an absolute URL.
    fn absolute(&self, location: &str) -> Result<String, ResolutionError> {
        if Url::parse(location).is_ok() {
            return Ok(location.to_string());
        }
        // relative locations resolve against the collection, which needs a trailing slash
        let base = format!("{}/", self.streams_url.as_str().trim_end_matches('/'));
        Url::parse(&base)
            .and_then(|b| b.join(location))
            .map(|u| u.to_string())
            .map_err(|_| ResolutionError::InvalidUrl(location.to_string()))
    }

    /// Ask the server for a stream with this exact name.
    async fn lookup(&self, name: &str) -> Result<Option<String>, ResolutionError> {
        let query = json!({ "name": { "$eq": name } }).to_string();
        let mut url = self.streams_url.clone();
        url.query_pairs_mut().append_pair("query", &query);

        let response = self.transport.get(&url).await?;
        if !response.is_success() {
            return Err(ResolutionError::Status {
                action: "stream lookup",
                status: response.status,
            });
        }

        let matches: Vec<Value> = serde_json::from_str(&response.body)
            .map_err(|e| ResolutionError::InvalidResponse(format!("lookup body: {}", e)))?;

        if matches.len() > 1 {
            tracing::warn!(
                stream = name,
                matches = matches.len(),
                "stream name is not unique on the server, using the first match"
            );
        }

        match matches.first() {
            None => Ok(None),
            Some(Value::String(link)) => self.absolute(link).map(Some),
            Some(Value::Object(stream)) => match stream.get("_id") {
                Some(Value::String(id)) => Ok(Some(self.stream_url_for_id(id))),
                _ => Err(ResolutionError::InvalidResponse(
                    "lookup match has no '_id'".to_string(),
                )),
            },
            Some(other) => Err(ResolutionError::InvalidResponse(format!(
                "unexpected lookup match: {}",
                other
            ))),
        }
    }

    /// Ask the server to allocate a new stream.
    async fn create(&self, name: &str) -> Result<String, ResolutionError> {
        let body = json!({
            "name": name,
            "description": self.metadata.description,
            "unit_group": self.metadata.unit_group,
        });

        let response = self.transport.post_json(&self.streams_url, &body).await?;
        if !response.is_success() {
            return Err(ResolutionError::Status {
                action: "stream creation",
                status: response.status,
            });
        }

        let stream_id = serde_json::from_str::<Value>(&response.body)
            .ok()
            .and_then(|v| v.get("_id").and_then(Value::as_str).map(str::to_string));

        let stream_url = match (&response.location, &stream_id) {
            (Some(location), _) => self.absolute(location)?,
            (None, Some(id)) => self.stream_url_for_id(id),
            (None, None) => {
                return Err(ResolutionError::InvalidResponse(
                    "stream creation returned neither a Location header nor an '_id'".to_string(),
                ))
            }
        };

        tracing::info!(
            stream = name,
            stream_id = stream_id.as_deref().unwrap_or("N/A"),
            "server allocated a new stream"
        );
        Ok(stream_url)
    }

    async fn resolve_uncached(
        &self,
        destination: &Destination,
    ) -> Result<ResolvedEndpoint, ResolutionError> {
        let stream_url = match destination {
            Destination::Id(id) => self.stream_url_for_id(id),
            Destination::Name(name) => match self.lookup(name).await? {
                Some(url) => url,
                None => self.create(name).await?,
            },
        };
        ResolvedEndpoint::from_stream_url(&stream_url)
    }
}

impl<T: HttpTransport> Resolve for StreamResolver<T> {
    async fn resolve(
        &mut self,
        destination: &Destination,
    ) -> Result<ResolvedEndpoint, ResolutionError> {
        if let Some(endpoint) = self.cache.get(destination) {
            return Ok(endpoint.clone());
        }
        let endpoint = self.resolve_uncached(destination).await?;
        self.cache.insert(destination.clone(), endpoint.clone());
        Ok(endpoint)
    }
}
