//! Transport abstraction for Pulse.
//!
//! This module provides a pluggable HTTP layer that abstracts the
//! underlying client (reqwest, mock for testing).
//!
//! # Design
//!
//! The transport trait is request/response oriented:
//! - `send()` performs one HTTP exchange and returns the status and body
//! - Non-2xx statuses are **not** errors at this layer; classification
//!   belongs to the delivery client
//! - Errors are reserved for exchanges that produced no response at all
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! transport.push_status(503);
//! let response = transport.send(HttpRequest::get(url, timeout)).await?;
//! assert_eq!(response.status, 503);
//! ```

mod http;
mod mock;

pub use http::ReqwestTransport;
pub use mock::{MockReply, MockTransport};

use async_trait::async_trait;
use pulse_core::Method;
use std::time::Duration;
use thiserror::Error;

/// Media type of every request body.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The URL could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Plaintext HTTP refused by an HTTPS-only client.
    #[error("plaintext http blocked by transport policy: {0}")]
    PolicyBlocked(String),

    /// Could not reach the host.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The exchange started but failed.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// The HTTP client could not be constructed.
    #[error("client setup failed: {0}")]
    Setup(String),
}

/// One outgoing HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// JSON body, if any.
    pub body: Option<Vec<u8>>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl HttpRequest {
    /// A bodiless GET.
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            body: None,
            timeout,
        }
    }

    /// A request carrying a JSON body.
    pub fn json(method: Method, url: impl Into<String>, body: Vec<u8>, timeout: Duration) -> Self {
        Self {
            method,
            url: url.into(),
            body: Some(body),
            timeout,
        }
    }
}

/// Status and body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// A response with an empty body.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }
}

/// Transport trait for performing collector requests.
///
/// Implementations handle the underlying HTTP client
/// (reqwest, mock, etc).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one request.
    ///
    /// Returns `Ok` for any response the server produced, whatever its
    /// status.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}
