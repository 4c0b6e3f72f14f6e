//! DeliveryClient - submits batches and profile snapshots to the collector.
//!
//! Every submission goes through the same pipeline:
//!
//! ```text
//! body → snake_case JSON → Envelope (AES-CBC, base64) → {"payload": ...}
//!      → Transport → Disposition (pulse-core) → retry or report
//! ```
//!
//! Only server errors (5xx) are retried, once by default after a fixed
//! delay. The delay is cancellable: when the shared `CancellationToken`
//! fires during the wait, the submission ends with
//! [`DeliveryError::Cancelled`] instead of sending again.

use std::sync::Arc;
use std::time::Duration;

use pulse_core::{endpoint_url, snake_case_key, Disposition, Endpoint, RetryPolicy};
use pulse_types::{
    EncryptedPayload, EventsBatch, ProfileSnapshot, ValidationErrorBody, ValidationIssue,
};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::crypto::{CryptoError, Envelope};
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivery errors.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The request URL could not be built.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The body could not be encoded.
    #[error("failed to encode request data: {0}")]
    Encoding(String),

    /// The body could not be encrypted.
    #[error("failed to encrypt payload: {0}")]
    Encryption(#[from] CryptoError),

    /// The server answered with something that is not an HTTP status.
    #[error("invalid response from server (status {0})")]
    InvalidServerResponse(u16),

    /// 422 with field-level errors.
    #[error("validation error ({} issues)", .issues.len())]
    ValidationRejected {
        /// Parsed entries, empty when the body could not be read.
        issues: Vec<ValidationIssue>,
    },

    /// Non-success status after retries were exhausted or not applicable.
    #[error("server error with code: {0}")]
    ServerFault(u16),

    /// The request never produced a response.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// Shutdown happened while waiting to retry.
    #[error("delivery cancelled")]
    Cancelled,
}

impl DeliveryError {
    /// HTTP status behind this error, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            DeliveryError::ServerFault(code) | DeliveryError::InvalidServerResponse(code) => {
                Some(*code)
            }
            DeliveryError::ValidationRejected { .. } => Some(422),
            _ => None,
        }
    }
}

/// Configuration for DeliveryClient.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// `scheme://host/v1`.
    pub base_url: String,
    /// Timeout for each attempt.
    pub request_timeout: Duration,
    /// Retry policy for server errors.
    pub retry: RetryPolicy,
}

impl DeliveryConfig {
    /// Create a configuration for a collector host.
    pub fn new(host: &str, use_https: bool) -> Self {
        Self {
            base_url: pulse_core::base_url(host, use_https),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Encrypting, retrying client for the collector API.
///
/// Cheap to clone; clones share the transport and cancellation token.
pub struct DeliveryClient<T: Transport> {
    config: DeliveryConfig,
    transport: Arc<T>,
    envelope: Envelope,
    cancel: CancellationToken,
}

impl<T: Transport> Clone for DeliveryClient<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            transport: Arc::clone(&self.transport),
            envelope: self.envelope.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<T: Transport> DeliveryClient<T> {
    /// Create a new DeliveryClient with the built-in envelope key.
    pub fn new(config: DeliveryConfig, transport: Arc<T>) -> Self {
        Self {
            config,
            transport,
            envelope: Envelope::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use a different envelope.
    pub fn with_envelope(mut self, envelope: Envelope) -> Self {
        self.envelope = envelope;
        self
    }

    /// Share a cancellation token with the rest of the pipeline.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// `PATCH /users/{identity}` with the full snapshot.
    pub async fn submit_profile(
        &self,
        identity: &str,
        snapshot: &ProfileSnapshot,
    ) -> Result<(), DeliveryError> {
        self.submit(Endpoint::Profile(identity.to_string()), snapshot)
            .await?;
        debug!(identity, "profile delivered");
        Ok(())
    }

    /// `POST /users/{identity}/event` with one batch.
    pub async fn submit_events(
        &self,
        identity: &str,
        batch: &EventsBatch,
    ) -> Result<(), DeliveryError> {
        self.submit(Endpoint::Events(identity.to_string()), batch)
            .await?;
        debug!(identity, events = batch.len(), "events delivered");
        Ok(())
    }

    async fn submit<B: Serialize>(&self, endpoint: Endpoint, body: &B) -> Result<(), DeliveryError> {
        let url = endpoint_url(&self.config.base_url, &endpoint);
        reqwest::Url::parse(&url)
            .map_err(|e| DeliveryError::InvalidEndpoint(format!("{}: {}", url, e)))?;

        let plaintext = serde_json::to_value(body)
            .map(snake_case_keys)
            .and_then(|value| serde_json::to_string(&value))
            .map_err(|e| DeliveryError::Encoding(e.to_string()))?;
        let sealed = EncryptedPayload::new(self.envelope.encrypt(&plaintext)?)
            .to_json()
            .map_err(|e| DeliveryError::Encoding(e.to_string()))?;

        let mut attempt = 0;
        loop {
            let request = HttpRequest::json(
                endpoint.method(),
                url.clone(),
                sealed.clone(),
                self.config.request_timeout,
            );
            let response = self.transport.send(request).await.map_err(|e| {
                warn!(identity = endpoint.identity(), error = %e, "request failed");
                DeliveryError::TransportFailure(e.to_string())
            })?;

            if !(100..=599).contains(&response.status) {
                return Err(DeliveryError::InvalidServerResponse(response.status));
            }

            let disposition = Disposition::classify(response.status);
            match self.config.retry.next_delay(attempt, disposition) {
                Some(delay) => {
                    warn!(
                        identity = endpoint.identity(),
                        status = response.status,
                        retry_in_ms = delay.as_millis() as u64,
                        "server error, retrying"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            debug!(identity = endpoint.identity(), "retry cancelled");
                            return Err(DeliveryError::Cancelled);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                None => return conclude(&endpoint, disposition, &response),
            }
        }
    }
}

/// Rewrite every object key, at any depth, to snake_case.
fn snake_case_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(key, value)| (snake_case_key(&key), snake_case_keys(value)))
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(snake_case_keys).collect())
        }
        other => other,
    }
}

fn conclude(
    endpoint: &Endpoint,
    disposition: Disposition,
    response: &HttpResponse,
) -> Result<(), DeliveryError> {
    match disposition {
        Disposition::Delivered => Ok(()),
        Disposition::Rejected => {
            let issues = match ValidationErrorBody::from_json(&response.body) {
                Ok(body) => body.detail,
                Err(e) => {
                    warn!(error = %e, "failed to parse validation error");
                    Vec::new()
                }
            };
            for issue in &issues {
                warn!(
                    identity = endpoint.identity(),
                    field = %issue.field_path(),
                    message = %issue.msg,
                    "validation error"
                );
            }
            Err(DeliveryError::ValidationRejected { issues })
        }
        Disposition::Retryable(code) | Disposition::Failed(code) => {
            warn!(identity = endpoint.identity(), status = code, "delivery failed");
            Err(DeliveryError::ServerFault(code))
        }
    }
}
