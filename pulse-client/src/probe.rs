//! Collector reachability check.
//!
//! A single bodiless `GET scheme://host` (no API version) with a short
//! timeout. Any 2xx or a 404 proves something is listening.

use std::fmt;
use std::time::Duration;

use pulse_core::origin_url;

use crate::transport::{HttpRequest, Transport, TransportError};

/// Default probe timeout.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Message for a plaintext request refused by an HTTPS-only client.
pub const POLICY_BLOCKED_MESSAGE: &str =
    "Plaintext HTTP blocked by transport policy. Enable HTTPS or allow the host.";

/// Result of a reachability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    /// Whether the collector answered in an acceptable way.
    pub reachable: bool,
    /// Human-readable diagnostic.
    pub message: String,
    /// Status code, when the server answered.
    pub status: Option<u16>,
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Probe `scheme://host`.
pub async fn probe<T: Transport + ?Sized>(
    transport: &T,
    host: &str,
    use_https: bool,
    timeout: Duration,
) -> ProbeReport {
    let url = origin_url(host, use_https);
    tracing::debug!(%url, "probing collector");

    match transport.send(HttpRequest::get(url, timeout)).await {
        Ok(response) => {
            let status = response.status;
            let reachable = (200..=299).contains(&status) || status == 404;
            let message = if reachable {
                "Server reachable".to_string()
            } else {
                format!("Server returned status {}", status)
            };
            ProbeReport {
                reachable,
                message,
                status: Some(status),
            }
        }
        Err(TransportError::PolicyBlocked(_)) => ProbeReport {
            reachable: false,
            message: POLICY_BLOCKED_MESSAGE.to_string(),
            status: None,
        },
        Err(TransportError::InvalidUrl(_)) => ProbeReport {
            reachable: false,
            message: "Invalid URL".to_string(),
            status: None,
        },
        Err(e) => ProbeReport {
            reachable: false,
            message: e.to_string(),
            status: None,
        },
    }
}
