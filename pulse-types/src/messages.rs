//! Payloads submitted to the collector.
//!
//! These are the plaintext documents that get encrypted before being
//! wrapped in an [`EncryptedPayload`](crate::EncryptedPayload). Field names
//! are snake_case on the wire, and absent profile attributes are sent as
//! explicit `null` rather than omitted.

use serde::{Deserialize, Serialize};

use crate::ids::{now_millis, EventId};
use crate::value::Parameters;

/// One user action.
///
/// Immutable once created: the id and timestamp are captured in
/// [`Event::new`] and there are no setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    uuid: EventId,
    timestamp: i64,
    name: String,
    parameters: Parameters,
}

impl Event {
    /// Create an event stamped with a fresh id and the current time.
    pub fn new(name: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            uuid: EventId::new(),
            timestamp: now_millis(),
            name: name.into(),
            parameters,
        }
    }

    /// Create an event with no parameters.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, Parameters::new())
    }

    /// Unique id assigned at creation.
    pub fn uuid(&self) -> EventId {
        self.uuid
    }

    /// Creation time in milliseconds since the Unix epoch.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Event name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Event parameters.
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }
}

/// Body of `POST /users/{identity}/event`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventsBatch {
    /// Events in insertion order.
    pub events: Vec<Event>,
}

impl EventsBatch {
    /// Wrap a flushed batch.
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    /// Number of events in the batch.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Full set of user and device attributes, the body of
/// `PATCH /users/{identity}`.
///
/// Always submitted whole; the collector keys snapshots by identity and
/// keeps the latest.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    /// Library-assigned id (unused by this client, always null).
    pub lib_id: Option<String>,
    /// Host application package / bundle identifier.
    pub package: Option<String>,
    /// First time this installation built a profile (ms). Written once.
    pub app_first_open_timestamp: Option<i64>,
    /// Time of this snapshot (ms).
    pub app_last_update_timestamp: Option<i64>,
    /// Uninstall time (ms), reported by other channels.
    pub app_delete_timestamp: Option<i64>,
    /// Push notification token.
    #[serde(rename = "firebase_token")]
    pub push_token: Option<String>,
    /// Country code, upper-case.
    pub geo: Option<String>,
    /// Operating system version string.
    pub os_version: Option<String>,
    /// Device identifier.
    pub device: Option<String>,
    /// Device model.
    pub device_model: Option<String>,
    /// Host application version.
    pub app_version: Option<String>,
    /// Install referrer.
    pub referrer: Option<String>,
    /// Installation id from the attribution SDK.
    #[serde(rename = "tenjin_analytics_installation_id")]
    pub attribution_installation_id: Option<String>,
    /// Whether the user limited ad tracking.
    pub is_limited_ad_tracking: Option<bool>,
    /// Advertising identifier (or vendor identifier fallback).
    pub advertising_id: Option<String>,
    /// Numeric OS version.
    pub os_version_int: Option<i64>,
    /// Numeric application build.
    pub app_version_code: Option<i64>,
    /// OS build identifier.
    pub build_id: Option<String>,
    /// Locale identifier, e.g. `en_US`.
    pub locale: Option<String>,
    /// Server-side merge hints.
    pub hints: Option<ProfileHints>,
    /// Affiliate click id.
    #[serde(rename = "affise_clickid")]
    pub affiliate_id: Option<String>,
    /// Affiliate promo code.
    #[serde(rename = "affise_promo_code")]
    pub promo_code: Option<String>,
}

/// Hints attached to a profile snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProfileHints {
    /// Set on the first update sent by a fresh app instance.
    pub first_app_instance_update: Option<bool>,
    /// Attributes carried over from a previous identity.
    pub old_data: Option<Parameters>,
    /// Device clock at snapshot time (ms).
    pub device_timestamp_millis: Option<i64>,
}
