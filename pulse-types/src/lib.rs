//! # pulse-types
//!
//! Wire format types for the Pulse telemetry pipeline.
//!
//! This crate provides the documents exchanged with the collector:
//! - [`Event`], [`EventsBatch`] - Analytics events and their batch wrapper
//! - [`ParamValue`], [`Parameters`] - Closed set of event parameter values
//! - [`ProfileSnapshot`], [`ProfileHints`] - User/device attributes
//! - [`EncryptedPayload`], [`ValidationErrorBody`] - Outer request/response bodies
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod envelope;
mod error;
mod ids;
mod messages;
mod value;

pub use envelope::{EncryptedPayload, LocSegment, ValidationErrorBody, ValidationIssue};
pub use error::{from_json, to_json, WireError};
pub use ids::{now_millis, EventId};
pub use messages::{Event, EventsBatch, ProfileHints, ProfileSnapshot};
pub use value::{ParamValue, Parameters};
