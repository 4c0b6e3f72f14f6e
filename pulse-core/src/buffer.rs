//! Event buffer for Pulse.
//!
//! This module provides the batching policy for outgoing events:
//! - FIFO ordering inside a batch
//! - Size trigger: reaching `max_events` hands back a full batch
//! - Age trigger: the oldest buffered event expiring after `max_age`
//!
//! The buffer never reads a clock. Callers pass `now` in, which keeps the
//! policy deterministic and lets `pulse-client` drive it from a tokio timer.

use std::time::{Duration, Instant};

use pulse_types::Event;

/// Default number of events that forces a flush.
pub const DEFAULT_MAX_EVENTS: usize = 10;

/// Default age of the oldest event that forces a flush.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(10);

/// Default cadence of the expiry check.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Flush thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    /// Buffer size that triggers an immediate flush.
    pub max_events: usize,
    /// Age of the oldest event that triggers a timed flush.
    pub max_age: Duration,
    /// How often the owner should call [`EventBuffer::is_expired`].
    pub check_interval: Duration,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            max_events: DEFAULT_MAX_EVENTS,
            max_age: DEFAULT_MAX_AGE,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }
}

impl FlushPolicy {
    /// Set the size trigger. Values below 1 are raised to 1.
    pub fn with_max_events(mut self, max_events: usize) -> Self {
        self.max_events = max_events.max(1);
        self
    }

    /// Set the age trigger.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Set the expiry check cadence.
    pub fn with_check_interval(mut self, check_interval: Duration) -> Self {
        self.check_interval = check_interval;
        self
    }
}

/// In-memory event buffer.
///
/// Events flow through the buffer in this order:
/// 1. `push()` / `extend()` - append; may return a full batch
/// 2. `is_expired()` - polled by the owner on a fixed cadence
/// 3. `take()` - swap the contents out as one batch
///
/// `clear()` and `drain()` empty the buffer without producing a batch for
/// delivery.
#[derive(Debug)]
pub struct EventBuffer {
    policy: FlushPolicy,
    events: Vec<Event>,
    /// Set on the empty -> non-empty transition, reset on every swap.
    oldest: Option<Instant>,
}

impl EventBuffer {
    /// Create an empty buffer with the given policy.
    pub fn new(policy: FlushPolicy) -> Self {
        Self {
            policy,
            events: Vec::with_capacity(policy.max_events),
            oldest: None,
        }
    }

    /// The active flush policy.
    pub fn policy(&self) -> &FlushPolicy {
        &self.policy
    }

    /// Append one event.
    ///
    /// Returns the full batch when this push brings the buffer to
    /// `max_events`.
    pub fn push(&mut self, event: Event, now: Instant) -> Option<Vec<Event>> {
        self.arm(now);
        self.events.push(event);
        self.take_if_full()
    }

    /// Append several events, e.g. ones previously returned by `drain()`.
    ///
    /// Same anchor and threshold rules as `push()`. When the buffer holds
    /// more than `max_events` afterwards, everything is returned as one
    /// batch so the buffer is left empty.
    pub fn extend<I>(&mut self, events: I, now: Instant) -> Option<Vec<Event>>
    where
        I: IntoIterator<Item = Event>,
    {
        let before = self.events.len();
        self.events.extend(events);
        if self.events.len() == before {
            return None;
        }
        if before == 0 {
            self.oldest = Some(now);
        }
        self.take_if_full()
    }

    /// Swap the buffer for an empty one.
    ///
    /// Returns `None` when there is nothing to flush.
    pub fn take(&mut self) -> Option<Vec<Event>> {
        if self.events.is_empty() {
            return None;
        }
        self.oldest = None;
        let capacity = self.policy.max_events;
        Some(std::mem::replace(
            &mut self.events,
            Vec::with_capacity(capacity),
        ))
    }

    /// Remove and return every buffered event.
    pub fn drain(&mut self) -> Vec<Event> {
        self.take().unwrap_or_default()
    }

    /// Discard everything. Returns how many events were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.events.len();
        self.events.clear();
        self.oldest = None;
        dropped
    }

    /// Check whether the oldest buffered event has reached `max_age`.
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.oldest {
            Some(oldest) => now.saturating_duration_since(oldest) >= self.policy.max_age,
            None => false,
        }
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// When the current oldest event was buffered.
    pub fn oldest(&self) -> Option<Instant> {
        self.oldest
    }

    fn arm(&mut self, now: Instant) {
        if self.events.is_empty() {
            self.oldest = Some(now);
        }
    }

    fn take_if_full(&mut self) -> Option<Vec<Event>> {
        if self.events.len() >= self.policy.max_events {
            self.take()
        } else {
            None
        }
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new(FlushPolicy::default())
    }
}
