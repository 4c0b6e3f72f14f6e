//! Identity and timing types for Pulse.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A unique identifier for an analytics event.
///
/// UUID v4, rendered upper-case and hyphenated on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(uuid::Uuid);

impl EventId {
    /// Create a new random EventId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Create an EventId from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        uuid::Uuid::from_slice(bytes).ok().map(Self)
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for EventId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated().encode_upper(&mut uuid::Uuid::encode_buffer()))
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self)
    }
}

impl Serialize for EventId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Current wall-clock time as milliseconds since the Unix epoch.
///
/// Returns 0 if the system clock is set before 1970.
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_id_is_uuid_v4() {
        let id = EventId::new();
        assert_eq!(id.as_uuid().get_version_num(), 4);
    }

    #[test]
    fn event_id_displays_upper_case() {
        let id = EventId::new();
        let display = id.to_string();
        assert_eq!(display.len(), 36);
        assert_eq!(display, display.to_uppercase());
    }

    #[test]
    fn event_id_parses_either_case() {
        let id = EventId::new();
        let upper: EventId = id.to_string().parse().unwrap();
        let lower: EventId = id.to_string().to_lowercase().parse().unwrap();
        assert_eq!(upper, id);
        assert_eq!(lower, id);
    }

    #[test]
    fn event_id_serializes_as_string() {
        let id = EventId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: EventId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn event_id_rejects_garbage() {
        assert!(serde_json::from_str::<EventId>("\"not-a-uuid\"").is_err());
        assert!(EventId::from_bytes(&[0u8; 3]).is_none());
    }

    #[test]
    fn now_millis_is_positive() {
        assert!(now_millis() > 1_600_000_000_000);
    }
}
