//! # pulse-core
//!
//! Pure logic for Pulse (no I/O, instant tests).
//!
//! This crate implements the batching and delivery decisions of the
//! telemetry pipeline without any network access, timers or threads.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. Clocks are passed in as arguments and status codes are
//! classified into plain enums, so tests run instantly without mocks.
//!
//! The actual I/O (HTTP, timers, tasks) is performed by `pulse-client`, which
//! acts on the decisions made here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod endpoint;
pub mod naming;
pub mod outcome;

pub use buffer::{
    EventBuffer, FlushPolicy, DEFAULT_CHECK_INTERVAL, DEFAULT_MAX_AGE, DEFAULT_MAX_EVENTS,
};
pub use endpoint::{
    base_url, clean_host, endpoint_url, host_name, is_local_host, origin_url, Endpoint, Method,
    API_VERSION,
};
pub use naming::snake_case_key;
pub use outcome::{Disposition, RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
