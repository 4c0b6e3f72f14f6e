//! # pulse-client
//!
//! Client library for the Pulse telemetry pipeline.
//!
//! Host applications record named events and keep a user profile current;
//! the library batches, encrypts and delivers both to a collector.
//!
//! ## Features
//!
//! - **Batching**: Events flush at a count threshold, an age threshold, on
//!   demand, or on lifecycle transitions
//! - **Envelope Encryption**: AES-CBC with the collector's pre-shared key
//! - **Transport Abstraction**: Pluggable transport layer (reqwest, mock)
//! - **Pure Batching Logic**: Uses pulse-core for side-effect-free decisions
//!
//! ## Example
//!
//! ```ignore
//! use pulse_client::{Pipeline, ReqwestTransport};
//! use pulse_types::params;
//!
//! let pipeline = Pipeline::new(ReqwestTransport::new()?);
//! pipeline.configure("collector.example.com", true, Some("user-1"));
//!
//! pipeline.log_event("purchase", params! { "price" => 9.99 });
//! pipeline.shutdown().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod crypto;
pub mod delivery;
pub mod pipeline;
pub mod probe;
pub mod profile;
pub mod queue;
pub mod store;
pub mod transport;

pub use config::{CollectorConfig, ConfigError, PipelineConfig, QueueConfig, RetryConfig};
pub use crypto::{CryptoError, Envelope, BLOCK_SIZE, KEY_SIZE};
pub use delivery::{DeliveryClient, DeliveryConfig, DeliveryError, DEFAULT_REQUEST_TIMEOUT};
pub use pipeline::{Pipeline, PipelineError};
pub use probe::{probe, ProbeReport, POLICY_BLOCKED_MESSAGE, PROBE_TIMEOUT};
pub use profile::{build_snapshot, HostProfile, ProfileFields, ProfileProvider, StaticProfile};
pub use queue::{BatchSink, EventQueue, EventQueueHandle, LifecycleSignal, TaskSet};
pub use store::{first_open_or_init, FileStore, FirstOpenStore, MemoryStore, StoreError};
pub use transport::{
    HttpRequest, HttpResponse, MockReply, MockTransport, ReqwestTransport, Transport,
    TransportError,
};
