// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP transport used by the resolver and the publisher.
//!
//! The [`HttpTransport`] trait is the only place network I/O happens, so the
//! resolver and publisher can be exercised against a scripted transport.

use reqwest::header::{ACCEPT, LOCATION};
use reqwest::{Client, Url};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Transport-level failures (no HTTP status was obtained).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

/// The parts of an HTTP response the uploader looks at.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// `Location` header, if any.
    pub location: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            location: None,
            body: body.into(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal JSON-over-HTTP client.
pub trait HttpTransport: Send + Sync {
    /// `GET url`.
    fn get(&self, url: &Url) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;

    /// `POST url` with a JSON body and `Content-Type: application/json`.
    fn post_json(
        &self,
        url: &Url,
        body: &serde_json::Value,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

/// [`HttpTransport`] backed by an async `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a client with a per-request `timeout` and `user_agent`.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    async fn read(response: reqwest::Response) -> Result<HttpResponse, TransportError> {
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;
        Ok(HttpResponse {
            status,
            location,
            body,
        })
    }
}

impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        Self::read(response).await
    }

    async fn post_json(
        &self,
        url: &Url,
        body: &serde_json::Value,
    ) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .post(url.clone())
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;
        Self::read(response).await
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    //! Scripted transport for resolver and publisher tests.

    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// One canned reaction to a request.
    #[derive(Debug, Clone)]
    pub enum Reply {
        Respond(HttpResponse),
        Fail(TransportError),
        /// Never answer; the caller's timeout has to fire.
        Hang,
    }

    /// A request as seen by the transport.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Call {
        pub method: &'static str,
        pub url: Url,
        pub body: Option<serde_json::Value>,
    }

    /// Answers requests from a queue of replies, recording every call.
    #[derive(Default)]
    pub struct ScriptedTransport {
        replies: Mutex<VecDeque<Reply>>,
        calls: Mutex<Vec<Call>>,
    }

    impl ScriptedTransport {
        pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }

        async fn answer(&self, call: Call) -> Result<HttpResponse, TransportError> {
            self.calls.lock().push(call);
            let next = self.replies.lock().pop_front();
            match next {
                Some(Reply::Respond(response)) => Ok(response),
                Some(Reply::Fail(err)) => Err(err),
                Some(Reply::Hang) => std::future::pending().await,
                None => Err(TransportError::Request("script exhausted".to_string())),
            }
        }
    }

    impl HttpTransport for ScriptedTransport {
        async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError> {
            self.answer(Call {
                method: "GET",
                url: url.clone(),
                body: None,
            })
            .await
        }

        async fn post_json(
            &self,
            url: &Url,
            body: &serde_json::Value,
        ) -> Result<HttpResponse, TransportError> {
            self.answer(Call {
                method: "POST",
                url: url.clone(),
                body: Some(body.clone()),
            })
            .await
        }
    }

    impl<T: HttpTransport> HttpTransport for std::sync::Arc<T> {
        async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError> {
            (**self).get(url).await
        }

        async fn post_json(
            &self,
            url: &Url,
            body: &serde_json::Value,
        ) -> Result<HttpResponse, TransportError> {
            (**self).post_json(url, body).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_success_range() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(201, "").is_success());
        assert!(!HttpResponse::new(301, "").is_success());
        assert!(!HttpResponse::new(500, "").is_success());
    }

    #[test]
    fn test_client_builds() {
        let transport = ReqwestTransport::new(Duration::from_secs(5), "weert-uploader/test");
        assert!(transport.is_ok());
    }
}
