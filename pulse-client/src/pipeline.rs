//! Pipeline - the host-facing facade.
//!
//! This module provides [`Pipeline`], the entry point host applications
//! use to record events and keep the user profile current.
//!
//! # Architecture
//!
//! ```text
//! log_event ─▶ EventQueue ─batch─▶ DeliverySink ─▶ DeliveryClient ─▶ Transport
//! set_*     ─▶ ProfileFields ─snapshot (spawned)──▶ DeliveryClient ─▶ Transport
//! ```
//!
//! Nothing on the facade blocks: setters and `log_event` return
//! immediately and the network work runs on tracked tasks. Batches flushed
//! while no identity or no collector is configured are dropped.
//!
//! # Example
//!
//! ```ignore
//! use pulse_client::{Pipeline, ReqwestTransport};
//! use pulse_types::params;
//!
//! let pipeline = Pipeline::new(ReqwestTransport::new()?);
//! pipeline.configure("collector.example.com", true, Some("user-1"));
//! pipeline.log_event("purchase", params! { "price" => 9.99 });
//! pipeline.flush();
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use pulse_core::{host_name, is_local_host, FlushPolicy};
use pulse_types::{now_millis, Event, EventsBatch, Parameters};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::delivery::{DeliveryClient, DeliveryConfig, DeliveryError};
use crate::probe::{probe, ProbeReport, PROBE_TIMEOUT};
use crate::profile::{build_snapshot, HostProfile, ProfileFields, ProfileProvider, StaticProfile};
use crate::queue::{BatchSink, EventQueue, EventQueueHandle, LifecycleSignal};
use crate::store::{first_open_or_init, FirstOpenStore, MemoryStore, StoreError};
use crate::transport::Transport;

/// Pipeline errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// `configure` has not been called.
    #[error("pipeline not configured")]
    NotConfigured,

    /// No user identity has been set.
    #[error("no user identity set")]
    NoIdentity,

    /// First-open store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Delivery error.
    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),
}

struct PipelineState<T: Transport> {
    fields: ProfileFields,
    delivery: Option<DeliveryClient<T>>,
}

struct Shared<T: Transport> {
    transport: Arc<T>,
    provider: Arc<dyn ProfileProvider>,
    store: Arc<dyn FirstOpenStore>,
    cancel: CancellationToken,
    state: Mutex<PipelineState<T>>,
}

impl<T: Transport> Shared<T> {
    fn state(&self) -> MutexGuard<'_, PipelineState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Identity and delivery, if both are set.
    fn target(&self) -> Result<(String, DeliveryClient<T>), PipelineError> {
        let state = self.state();
        let delivery = state.delivery.clone().ok_or(PipelineError::NotConfigured)?;
        let identity = state.fields.identity.clone().ok_or(PipelineError::NoIdentity)?;
        Ok((identity, delivery))
    }

    async fn sync_profile(&self) -> Result<(), PipelineError> {
        let (identity, delivery) = self.target()?;
        let now = now_millis();
        let first_open = first_open_or_init(self.store.as_ref(), now).await?;
        let fields = self.state().fields.clone();
        let snapshot = build_snapshot(self.provider.as_ref(), &fields, first_open, now);

        delivery.submit_profile(&identity, &snapshot).await?;
        Ok(())
    }
}

/// Forwards flushed batches to the configured collector.
struct DeliverySink<T: Transport> {
    shared: Arc<Shared<T>>,
}

#[async_trait]
impl<T: Transport + 'static> BatchSink for DeliverySink<T> {
    async fn deliver(&self, events: Vec<Event>) {
        let count = events.len();
        let (identity, delivery) = match self.shared.target() {
            Ok(target) => target,
            Err(reason) => {
                debug!(events = count, %reason, "batch dropped");
                return;
            }
        };

        let batch = EventsBatch::new(events);
        match delivery.submit_events(&identity, &batch).await {
            Ok(()) => info!(events = count, "sent events"),
            Err(e) => warn!(events = count, error = %e, "failed to send events"),
        }
    }
}

/// The host-facing pipeline.
///
/// Must be created inside a tokio runtime; the queue actor is spawned on
/// construction.
pub struct Pipeline<T: Transport + 'static> {
    shared: Arc<Shared<T>>,
    queue: EventQueueHandle,
    probe_timeout: Duration,
}

impl<T: Transport + 'static> Pipeline<T> {
    /// Pipeline with default batching, a host-detected profile and an
    /// in-memory first-open store.
    pub fn new(transport: T) -> Self {
        Self::with_parts(
            Arc::new(transport),
            FlushPolicy::default(),
            Arc::new(HostProfile::detect(StaticProfile::default())),
            Arc::new(MemoryStore::new()),
        )
    }

    /// Pipeline from explicit parts.
    pub fn with_parts(
        transport: Arc<T>,
        policy: FlushPolicy,
        provider: Arc<dyn ProfileProvider>,
        store: Arc<dyn FirstOpenStore>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let shared = Arc::new(Shared {
            transport,
            provider,
            store,
            cancel: cancel.clone(),
            state: Mutex::new(PipelineState {
                fields: ProfileFields::default(),
                delivery: None,
            }),
        });

        let sink = Arc::new(DeliverySink {
            shared: Arc::clone(&shared),
        });
        let queue = EventQueue::spawn(policy, sink, cancel);

        Self {
            shared,
            queue,
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    /// Pipeline built and configured from a [`PipelineConfig`].
    ///
    /// The `[profile]` section overrides host detection; the identity, if
    /// present, is applied (which schedules a profile sync).
    pub fn from_config(
        config: &PipelineConfig,
        transport: Arc<T>,
        store: Arc<dyn FirstOpenStore>,
    ) -> Self {
        let provider = Arc::new(HostProfile::detect(config.profile.clone()));
        let mut pipeline = Self::with_parts(transport, config.flush_policy(), provider, store);
        pipeline.probe_timeout = config.probe_timeout();
        pipeline.configure_delivery(
            config.delivery_config(),
            config.collector.use_https,
            &config.collector.host,
            config.collector.identity.as_deref(),
        );
        pipeline
    }

    /// Set the probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Point the pipeline at a collector.
    ///
    /// Plaintext HTTP to a host outside the local network logs a warning.
    /// When `identity` is given it is applied as by [`Pipeline::set_identity`].
    pub fn configure(&self, host: &str, use_https: bool, identity: Option<&str>) {
        self.configure_delivery(
            DeliveryConfig::new(host, use_https),
            use_https,
            host,
            identity,
        );
    }

    fn configure_delivery(
        &self,
        config: DeliveryConfig,
        use_https: bool,
        host: &str,
        identity: Option<&str>,
    ) {
        if !use_https && !is_local_host(host) {
            warn!(
                host = %host_name(host),
                "plaintext HTTP to a non-local host; enable HTTPS or allow the host explicitly"
            );
        }

        info!(base_url = %config.base_url, "pipeline configured");
        let delivery = DeliveryClient::new(config, Arc::clone(&self.shared.transport))
            .with_cancellation(self.shared.cancel.clone());
        self.shared.state().delivery = Some(delivery);

        match identity {
            Some(identity) => self.set_identity(identity),
            None => info!("waiting for user identity"),
        }
    }

    /// Whether `configure` has been called.
    pub fn is_configured(&self) -> bool {
        self.shared.state().delivery.is_some()
    }

    /// Current user identity.
    pub fn identity(&self) -> Option<String> {
        self.shared.state().fields.identity.clone()
    }

    /// Set the user identity and resubmit the profile.
    pub fn set_identity(&self, identity: &str) {
        self.shared.state().fields.identity = Some(identity.to_string());
        info!(identity, "user identity set");
        self.spawn_profile_sync();
    }

    /// Set the push notification token and resubmit the profile.
    pub fn set_push_token(&self, token: &str) {
        self.shared.state().fields.push_token = Some(token.to_string());
        self.spawn_profile_sync();
    }

    /// Set the affiliate click id and resubmit the profile.
    pub fn set_affiliate_id(&self, id: &str) {
        self.shared.state().fields.affiliate_id = Some(id.to_string());
        debug!(affiliate_id = id, "affiliate id set");
        self.spawn_profile_sync();
    }

    /// Set the promo code and resubmit the profile.
    pub fn set_promo_code(&self, code: &str) {
        self.shared.state().fields.promo_code = Some(code.to_string());
        self.spawn_profile_sync();
    }

    fn spawn_profile_sync(&self) {
        let shared = Arc::clone(&self.shared);
        self.queue.tasks().spawn(async move {
            match shared.sync_profile().await {
                Ok(()) => info!("profile updated"),
                Err(e @ (PipelineError::NotConfigured | PipelineError::NoIdentity)) => {
                    debug!(reason = %e, "profile sync skipped")
                }
                Err(e) => warn!(error = %e, "failed to update profile"),
            }
        });
    }

    /// Build and submit a profile snapshot, waiting for the outcome.
    pub async fn sync_profile(&self) -> Result<(), PipelineError> {
        self.shared.sync_profile().await
    }

    /// Record an event. Dropped if the pipeline is not configured.
    pub fn log_event(&self, name: &str, parameters: Parameters) {
        if !self.is_configured() {
            debug!(event = name, "pipeline not configured, event dropped");
            return;
        }
        self.queue.add(Event::new(name, parameters));
        debug!(event = name, "event logged");
    }

    /// Send everything buffered now.
    pub fn flush(&self) {
        self.queue.flush();
    }

    /// Drain the queue and deliver it in one batch, waiting for the outcome.
    ///
    /// Returns the number of events delivered. Drained events are dropped on
    /// any error, as with a background flush.
    pub async fn deliver_now(&self) -> Result<usize, PipelineError> {
        let events = self.queue.drain().await;
        if events.is_empty() {
            return Ok(0);
        }
        let count = events.len();
        let (identity, delivery) = self.shared.target()?;
        delivery
            .submit_events(&identity, &EventsBatch::new(events))
            .await?;
        Ok(count)
    }

    /// Discard everything buffered.
    pub fn clear_queue(&self) {
        self.queue.clear();
    }

    /// Remove and return everything buffered without sending it.
    pub async fn drain(&self) -> Vec<Event> {
        self.queue.drain().await
    }

    /// Put drained events back into the queue.
    pub fn requeue(&self, events: Vec<Event>) {
        self.queue.requeue(events);
    }

    /// Number of buffered events.
    pub async fn buffered(&self) -> usize {
        self.queue.buffered().await
    }

    /// Forward a host lifecycle transition.
    pub fn notify_lifecycle(&self, signal: LifecycleSignal) {
        self.queue.notify(signal);
    }

    /// Check whether a collector host answers.
    pub async fn probe(&self, host: &str, use_https: bool) -> ProbeReport {
        probe(
            self.shared.transport.as_ref(),
            host,
            use_https,
            self.probe_timeout,
        )
        .await
    }

    /// Wait until every pending flush and profile submission has finished.
    pub async fn wait_idle(&self) {
        self.queue.settle().await;
    }

    /// Flush, stop the queue and wait for in-flight submissions.
    ///
    /// Submissions waiting to retry end with [`DeliveryError::Cancelled`].
    pub async fn shutdown(&self) {
        self.queue.notify(LifecycleSignal::WillTerminate);
        self.queue.buffered().await;
        self.shared.cancel.cancel();
        self.queue.tasks().close_and_wait().await;
        info!("pipeline shut down");
    }
}

impl<T: Transport + 'static> Drop for Pipeline<T> {
    /// Stops the queue and turns any pending retry into [`DeliveryError::Cancelled`].
    /// Buffered events are not flushed; call [`Pipeline::shutdown`] for that.
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}
