//! Outer wire documents: the encrypted request body and the collector's
//! validation error response.

use serde::{Deserialize, Serialize};

use crate::WireError;

/// Request body sent to the collector.
///
/// The collector only ever sees this wrapper; `payload` is the base64
/// encoding of `IV || AES-CBC(plaintext JSON)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Base64 (standard alphabet, padded) envelope.
    pub payload: String,
}

impl EncryptedPayload {
    /// Wrap an already-encrypted payload.
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Serialize to the JSON request body.
    pub fn to_json(&self) -> Result<Vec<u8>, WireError> {
        crate::error::to_json(self)
    }
}

/// Body of a 422 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorBody {
    /// One entry per rejected field.
    pub detail: Vec<ValidationIssue>,
}

impl ValidationErrorBody {
    /// Parse a response body.
    pub fn from_json(bytes: &[u8]) -> Result<Self, WireError> {
        crate::error::from_json(bytes)
    }
}

/// A single field-level rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Path to the offending field, e.g. `["body", "events", 0, "name"]`.
    pub loc: Vec<LocSegment>,
    /// Human-readable message.
    pub msg: String,
    /// Machine-readable error kind.
    #[serde(rename = "type")]
    pub kind: String,
}

impl ValidationIssue {
    /// The location rendered as a dotted path (`body.events.0.name`).
    pub fn field_path(&self) -> String {
        self.loc
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// One segment of a validation location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocSegment {
    /// Named field.
    Field(String),
    /// Array index.
    Index(u64),
}

impl std::fmt::Display for LocSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocSegment::Field(name) => f.write_str(name),
            LocSegment::Index(i) => write!(f, "{}", i),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_wire_shape() {
        let body = EncryptedPayload::new("AAAA");
        let bytes = body.to_json().unwrap();
        assert_eq!(bytes, br#"{"payload":"AAAA"}"#);
    }

    #[test]
    fn validation_body_parses_mixed_loc() {
        let raw = br#"{
            "detail": [
                {"loc": ["body", "events", 0, "name"], "msg": "field required", "type": "value_error.missing"}
            ]
        }"#;

        let body = ValidationErrorBody::from_json(raw).unwrap();
        assert_eq!(body.detail.len(), 1);

        let issue = &body.detail[0];
        assert_eq!(issue.msg, "field required");
        assert_eq!(issue.kind, "value_error.missing");
        assert_eq!(issue.loc[2], LocSegment::Index(0));
        assert_eq!(issue.field_path(), "body.events.0.name");
    }

    #[test]
    fn validation_body_rejects_other_shapes() {
        assert!(ValidationErrorBody::from_json(b"not json").is_err());
        assert!(ValidationErrorBody::from_json(br#"{"error":"bad"}"#).is_err());
    }

    #[test]
    fn validation_issue_serializes_type_key() {
        let issue = ValidationIssue {
            loc: vec![LocSegment::Field("geo".into())],
            msg: "too long".into(),
            kind: "value_error".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["type"], "value_error");
        assert_eq!(json["loc"][0], "geo");
    }
}
