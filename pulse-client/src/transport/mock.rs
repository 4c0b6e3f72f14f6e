//! Mock transport for testing.
//!
//! Allows scripting responses and capturing sent requests for verification.

use super::{HttpRequest, HttpResponse, Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// A scripted outcome for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Respond with this status and body.
    Respond(HttpResponse),
    /// Fail as if the connection broke.
    Fail(String),
}

/// Mock transport for testing.
///
/// Replies are consumed in order; once the script is exhausted every
/// request gets a bodiless 200.
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
    sent: Arc<Notify>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    requests: Vec<HttpRequest>,
    script: VecDeque<MockReply>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next unanswered request.
    pub fn push_reply(&self, reply: MockReply) {
        let mut inner = self.inner.lock().unwrap();
        inner.script.push_back(reply);
    }

    /// Queue a bodiless response with the given status.
    pub fn push_status(&self, status: u16) {
        self.push_reply(MockReply::Respond(HttpResponse::status(status)));
    }

    /// Queue a response with a body.
    pub fn push_response(&self, status: u16, body: &[u8]) {
        self.push_reply(MockReply::Respond(HttpResponse {
            status,
            body: body.to_vec(),
        }));
    }

    /// Cause the next request to fail with the given error.
    pub fn fail_next(&self, error: &str) {
        self.push_reply(MockReply::Fail(error.to_string()));
    }

    /// Get all requests that were sent.
    pub fn requests(&self) -> Vec<HttpRequest> {
        let inner = self.inner.lock().unwrap();
        inner.requests.clone()
    }

    /// Number of requests sent so far.
    pub fn request_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.requests.len()
    }

    /// Get the last request that was sent.
    pub fn last_request(&self) -> Option<HttpRequest> {
        let inner = self.inner.lock().unwrap();
        inner.requests.last().cloned()
    }

    /// Wait until at least `count` requests have been sent.
    pub async fn wait_for_requests(&self, count: usize) {
        loop {
            let notified = self.sent.notified();
            if self.request_count() >= count {
                return;
            }
            notified.await;
        }
    }

    /// Clear all state (requests and script).
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockTransportInner::default();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let reply = {
            let mut inner = self.inner.lock().unwrap();
            inner.requests.push(request);
            inner.script.pop_front()
        };
        self.sent.notify_waiters();

        match reply {
            Some(MockReply::Respond(response)) => Ok(response),
            Some(MockReply::Fail(error)) => Err(TransportError::ConnectionFailed(error)),
            None => Ok(HttpResponse::status(200)),
        }
    }
}
