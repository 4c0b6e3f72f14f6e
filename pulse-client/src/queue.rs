//! EventQueue - the single-writer actor that owns the event buffer.
//!
//! ```text
//! EventQueueHandle ──commands──▶ EventQueue (owns EventBuffer, 1 s ticker)
//!                                    │
//!                                    └─ batch ─▶ spawned task ─▶ BatchSink
//! ```
//!
//! Every buffer mutation happens on the actor task. A flush swaps the
//! buffer out and hands the batch to the sink on a freshly spawned task,
//! so a slow sink never holds up `add`.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pulse_core::{EventBuffer, FlushPolicy};
use pulse_types::Event;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

/// Lower bound on the expiry check cadence.
const MIN_CHECK_INTERVAL: std::time::Duration = std::time::Duration::from_millis(10);

/// Host lifecycle transitions that force a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// The host moved to the background.
    EnteredBackground,
    /// The host is about to exit.
    WillTerminate,
}

/// Receiver of flushed batches.
#[async_trait]
pub trait BatchSink: Send + Sync + 'static {
    /// Take ownership of one non-empty batch.
    async fn deliver(&self, events: Vec<Event>);
}

#[async_trait]
impl BatchSink for mpsc::UnboundedSender<Vec<Event>> {
    async fn deliver(&self, events: Vec<Event>) {
        if self.send(events).is_err() {
            debug!("batch receiver dropped");
        }
    }
}

#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Background work spawned on behalf of a queue: sink deliveries and any
/// task the owner adds.
///
/// Closing is one-way and only used on shutdown; [`TaskSet::idle`] never
/// changes it.
#[derive(Debug, Clone, Default)]
pub struct TaskSet {
    tracker: TaskTracker,
    in_flight: Arc<InFlight>,
}

impl TaskSet {
    /// Spawn a tracked task on the current runtime.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.in_flight.count.fetch_add(1, Ordering::AcqRel);
        let guard = InFlightGuard(Arc::clone(&self.in_flight));
        self.tracker.spawn(async move {
            let _guard = guard;
            task.await;
        });
    }

    /// Number of tasks still running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::Acquire)
    }

    /// Wait until no task is running.
    pub async fn idle(&self) {
        loop {
            let notified = self.in_flight.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Close the set and wait for the running tasks.
    pub async fn close_and_wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Whether [`TaskSet::close_and_wait`] has been called.
    pub fn is_closed(&self) -> bool {
        self.tracker.is_closed()
    }
}

#[derive(Debug)]
enum QueueCommand {
    Add(Event),
    Flush,
    Clear,
    Drain(oneshot::Sender<Vec<Event>>),
    Requeue(Vec<Event>),
    Lifecycle(LifecycleSignal),
    Len(oneshot::Sender<usize>),
}

/// Cheap, cloneable handle to a running [`EventQueue`].
///
/// Every method returns immediately except the ones that report back
/// (`drain`, `len`). Once the actor has stopped, commands are dropped.
#[derive(Debug, Clone)]
pub struct EventQueueHandle {
    tx: mpsc::UnboundedSender<QueueCommand>,
    tasks: TaskSet,
}

impl EventQueueHandle {
    fn send(&self, command: QueueCommand) {
        if self.tx.send(command).is_err() {
            debug!("event queue stopped, command dropped");
        }
    }

    /// Enqueue one event.
    pub fn add(&self, event: Event) {
        self.send(QueueCommand::Add(event));
    }

    /// Hand everything buffered to the sink. No-op when empty.
    pub fn flush(&self) {
        self.send(QueueCommand::Flush);
    }

    /// Discard everything buffered without delivering it.
    pub fn clear(&self) {
        self.send(QueueCommand::Clear);
    }

    /// Put previously drained events back.
    pub fn requeue(&self, events: Vec<Event>) {
        self.send(QueueCommand::Requeue(events));
    }

    /// React to a host lifecycle transition.
    pub fn notify(&self, signal: LifecycleSignal) {
        self.send(QueueCommand::Lifecycle(signal));
    }

    /// Remove and return everything buffered, bypassing the sink.
    pub async fn drain(&self) -> Vec<Event> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(QueueCommand::Drain(response_tx));
        response_rx.await.unwrap_or_default()
    }

    /// Number of buffered events (0 once the actor has stopped).
    pub async fn buffered(&self) -> usize {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(QueueCommand::Len(response_tx));
        response_rx.await.unwrap_or_default()
    }

    /// Check whether the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Tasks that own every sink call this queue makes.
    pub fn tasks(&self) -> &TaskSet {
        &self.tasks
    }

    /// Wait until every command sent so far has been processed and every
    /// tracked task has finished.
    pub async fn settle(&self) {
        // Commands are processed in order, so this round trip is a barrier.
        self.buffered().await;
        self.tasks.idle().await;
    }
}

/// The queue actor.
pub struct EventQueue {
    buffer: EventBuffer,
    sink: Arc<dyn BatchSink>,
    rx: mpsc::UnboundedReceiver<QueueCommand>,
    cancel: CancellationToken,
    tasks: TaskSet,
}

impl EventQueue {
    /// Create the actor and its handle. Nothing runs until [`EventQueue::run`]
    /// is polled.
    pub fn new(
        policy: FlushPolicy,
        sink: Arc<dyn BatchSink>,
        cancel: CancellationToken,
    ) -> (Self, EventQueueHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let tasks = TaskSet::default();
        let queue = Self {
            buffer: EventBuffer::new(policy),
            sink,
            rx,
            cancel,
            tasks: tasks.clone(),
        };
        (queue, EventQueueHandle { tx, tasks })
    }

    /// Create the actor and run it on the current runtime.
    pub fn spawn(
        policy: FlushPolicy,
        sink: Arc<dyn BatchSink>,
        cancel: CancellationToken,
    ) -> EventQueueHandle {
        let (queue, handle) = Self::new(policy, sink, cancel);
        tokio::spawn(queue.run());
        handle
    }

    /// Process commands and timer ticks until cancelled or every handle is
    /// dropped. Events still buffered at that point are discarded.
    pub async fn run(mut self) {
        let policy = *self.buffer.policy();
        info!(
            max_events = policy.max_events,
            max_age_ms = policy.max_age.as_millis() as u64,
            "event queue started"
        );

        let period = policy.check_interval.max(MIN_CHECK_INTERVAL);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                command = self.rx.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = ticker.tick() => {
                    if self.buffer.is_expired(now()) {
                        self.flush("timer");
                    }
                }
            }
        }

        let dropped = self.buffer.clear();
        info!(dropped, "event queue stopped");
    }

    fn handle(&mut self, command: QueueCommand) {
        match command {
            QueueCommand::Add(event) => {
                if let Some(batch) = self.buffer.push(event, now()) {
                    self.dispatch(batch, "size");
                }
            }
            QueueCommand::Flush => self.flush("manual"),
            QueueCommand::Clear => {
                let dropped = self.buffer.clear();
                debug!(dropped, "event queue cleared");
            }
            QueueCommand::Drain(response_tx) => {
                if response_tx.send(self.buffer.drain()).is_err() {
                    error!("failed to send drain response - receiver dropped");
                }
            }
            QueueCommand::Requeue(events) => {
                if let Some(batch) = self.buffer.extend(events, now()) {
                    self.dispatch(batch, "size");
                }
            }
            QueueCommand::Lifecycle(signal) => {
                debug!(?signal, "lifecycle flush");
                self.flush("lifecycle");
            }
            QueueCommand::Len(response_tx) => {
                if response_tx.send(self.buffer.len()).is_err() {
                    error!("failed to send len response - receiver dropped");
                }
            }
        }
    }

    fn flush(&mut self, trigger: &'static str) {
        if let Some(batch) = self.buffer.take() {
            self.dispatch(batch, trigger);
        }
    }

    fn dispatch(&self, batch: Vec<Event>, trigger: &'static str) {
        debug!(events = batch.len(), trigger, "flushing batch");
        let sink = Arc::clone(&self.sink);
        self.tasks.spawn(async move { sink.deliver(batch).await });
    }
}

fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_types::params;
    use std::time::Duration;

    fn start(
        policy: FlushPolicy,
    ) -> (
        EventQueueHandle,
        mpsc::UnboundedReceiver<Vec<Event>>,
        CancellationToken,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = EventQueue::spawn(policy, Arc::new(tx), cancel.clone());
        (handle, rx, cancel)
    }

    fn make_event(i: usize) -> Event {
        Event::new(format!("event_{}", i), params! { "index" => i as i64 })
    }

    fn names(events: &[Event]) -> Vec<String> {
        events.iter().map(|e| e.name().to_string()).collect()
    }

    /// Let spawned sink tasks run without advancing the clock.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    // ===========================================
    // Flush Trigger Tests
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn explicit_flush_delivers_in_order() {
        let (queue, mut batches, _cancel) = start(FlushPolicy::default());

        for i in 0..3 {
            queue.add(make_event(i));
        }
        queue.flush();

        let batch = batches.recv().await.unwrap();
        assert_eq!(names(&batch), vec!["event_0", "event_1", "event_2"]);
        assert_eq!(queue.buffered().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn tenth_add_flushes_automatically() {
        let (queue, mut batches, _cancel) = start(FlushPolicy::default());

        for i in 0..10 {
            queue.add(make_event(i));
        }

        let batch = batches.recv().await.unwrap();
        assert_eq!(batch.len(), 10);
        assert_eq!(queue.buffered().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn eleventh_event_starts_new_batch() {
        let (queue, mut batches, _cancel) = start(FlushPolicy::default());

        for i in 0..11 {
            queue.add(make_event(i));
        }

        assert_eq!(batches.recv().await.unwrap().len(), 10);
        assert_eq!(queue.buffered().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_flush_is_no_op() {
        let (queue, mut batches, _cancel) = start(FlushPolicy::default());

        queue.flush();
        queue.notify(LifecycleSignal::EnteredBackground);
        assert_eq!(queue.buffered().await, 0);
        settle().await;

        assert!(batches.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_flushes_after_max_age() {
        let (queue, mut batches, _cancel) = start(FlushPolicy::default());
        let started = tokio::time::Instant::now();

        queue.add(make_event(0));

        let batch = batches.recv().await.unwrap();
        assert_eq!(batch.len(), 1);

        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(10));
        assert!(waited <= Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_does_not_fire_early() {
        let (queue, mut batches, _cancel) = start(FlushPolicy::default());

        queue.add(make_event(0));
        assert_eq!(queue.buffered().await, 1);
        tokio::time::sleep(Duration::from_millis(9_500)).await;
        settle().await;

        assert!(batches.try_recv().is_err());
        assert_eq!(queue.buffered().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn lifecycle_signals_flush() {
        let (queue, mut batches, _cancel) = start(FlushPolicy::default());

        queue.add(make_event(0));
        queue.notify(LifecycleSignal::EnteredBackground);
        assert_eq!(batches.recv().await.unwrap().len(), 1);

        queue.add(make_event(1));
        queue.add(make_event(2));
        queue.notify(LifecycleSignal::WillTerminate);
        assert_eq!(batches.recv().await.unwrap().len(), 2);
    }

    // ===========================================
    // Clear / Drain / Requeue Tests
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn clear_delivers_nothing() {
        let (queue, mut batches, _cancel) = start(FlushPolicy::default());

        for i in 0..5 {
            queue.add(make_event(i));
        }
        queue.clear();
        queue.flush();
        tokio::time::sleep(Duration::from_secs(30)).await;
        settle().await;

        assert!(batches.try_recv().is_err());
        assert_eq!(queue.buffered().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_bypasses_sink() {
        let (queue, mut batches, _cancel) = start(FlushPolicy::default());

        queue.add(make_event(0));
        queue.add(make_event(1));
        let drained = queue.drain().await;
        settle().await;

        assert_eq!(names(&drained), vec!["event_0", "event_1"]);
        assert!(batches.try_recv().is_err());
        assert!(queue.drain().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn requeue_restores_events() {
        let (queue, mut batches, _cancel) = start(FlushPolicy::default());

        queue.add(make_event(0));
        let drained = queue.drain().await;
        queue.requeue(drained);
        queue.add(make_event(1));
        queue.flush();

        let batch = batches.recv().await.unwrap();
        assert_eq!(names(&batch), vec!["event_0", "event_1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn requeue_respects_size_threshold() {
        let (queue, mut batches, _cancel) = start(FlushPolicy::default());

        queue.requeue((0..12).map(make_event).collect());

        assert_eq!(batches.recv().await.unwrap().len(), 12);
        assert_eq!(queue.buffered().await, 0);
    }

    // ===========================================
    // Shutdown Tests
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_actor() {
        let (queue, mut batches, cancel) = start(FlushPolicy::default());

        queue.add(make_event(0));
        assert_eq!(queue.buffered().await, 1);
        cancel.cancel();
        settle().await;

        assert!(queue.is_closed());
        queue.add(make_event(1));
        assert_eq!(queue.buffered().await, 0);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(batches.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn settle_waits_for_sink() {
        let (queue, mut batches, _cancel) = start(FlushPolicy::default());

        queue.add(make_event(0));
        queue.flush();
        queue.settle().await;

        assert_eq!(batches.try_recv().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn settle_leaves_closed_tasks_closed() {
        let (queue, _batches, _cancel) = start(FlushPolicy::default());
        queue
            .tasks()
            .spawn(tokio::time::sleep(Duration::from_secs(1)));

        tokio::join!(queue.settle(), queue.tasks().close_and_wait());

        assert!(queue.tasks().is_closed());
        assert_eq!(queue.tasks().in_flight(), 0);
        queue.settle().await;
        assert!(queue.tasks().is_closed());
    }

    /// Sink whose first call blocks until released.
    struct GatedSink {
        gate: Arc<Notify>,
        calls: AtomicUsize,
        batches: mpsc::UnboundedSender<Vec<Event>>,
    }

    #[async_trait]
    impl BatchSink for GatedSink {
        async fn deliver(&self, events: Vec<Event>) {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.gate.notified().await;
            }
            let _ = self.batches.send(events);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_sink_does_not_stall_queue() {
        let gate = Arc::new(Notify::new());
        let (tx, mut batches) = mpsc::unbounded_channel();
        let sink = Arc::new(GatedSink {
            gate: Arc::clone(&gate),
            calls: AtomicUsize::new(0),
            batches: tx,
        });
        let queue = EventQueue::spawn(FlushPolicy::default(), sink, CancellationToken::new());

        for i in 0..10 {
            queue.add(make_event(i));
        }
        settle().await;
        assert_eq!(queue.tasks().in_flight(), 1);

        for i in 10..23 {
            queue.add(make_event(i));
        }
        assert_eq!(queue.buffered().await, 3);

        // Second batch arrives while the first is still blocked.
        let second = batches.recv().await.unwrap();
        assert_eq!(names(&second)[0], "event_10");
        assert_eq!(second.len(), 10);

        gate.notify_one();
        let first = batches.recv().await.unwrap();
        assert_eq!(names(&first)[0], "event_0");
        queue.settle().await;
        assert_eq!(queue.tasks().in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_policy_applies() {
        let policy = FlushPolicy::default()
            .with_max_events(2)
            .with_max_age(Duration::from_secs(3));
        let (queue, mut batches, _cancel) = start(policy);

        queue.add(make_event(0));
        queue.add(make_event(1));
        assert_eq!(batches.recv().await.unwrap().len(), 2);

        let started = tokio::time::Instant::now();
        queue.add(make_event(2));
        assert_eq!(batches.recv().await.unwrap().len(), 1);
        assert!(started.elapsed() >= Duration::from_secs(3));
    }
}
