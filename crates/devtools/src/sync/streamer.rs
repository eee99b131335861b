use std::collections::{HashMap, VecDeque};
use std::fmt::{self, Debug, Display};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// Smallest per-subscriber buffer a subscription may ask for.
pub const MIN_SUBSCRIBER_BUFFER: usize = 100;

/// Buffer used when a subscription does not ask for one.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("sync streamer is shut down")]
    Closed,

    #[error("snapshot failed: {0}")]
    Snapshot(String),

    #[error("response sink closed")]
    SinkClosed,
}

/// A payload addressed to a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event<T, P> {
    pub topic: T,
    pub payload: P,
}

impl<T, P> Event<T, P> {
    pub fn new(topic: T, payload: P) -> Self {
        Self { topic, payload }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SubscribeOptions {
    /// Bounded live-event buffer; clamped to [`MIN_SUBSCRIBER_BUFFER`]
    pub buffer: Option<usize>,
}

type Filter<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

struct Subscriber<T, P> {
    filter: Filter<T>,
    tx: mpsc::Sender<Event<T, P>>,
}

struct Shared<T, P> {
    name: &'static str,
    subscribers: RwLock<HashMap<u64, Subscriber<T, P>>>,
    next_id: AtomicU64,
    dropped: AtomicU64,
    closed: AtomicBool,
}

impl<T, P> Shared<T, P> {
    fn remove(&self, id: u64) {
        if self.subscribers.write().remove(&id).is_some() {
            tracing::debug!("[SyncStreamer] {}: subscriber {} detached", self.name, id);
        }
    }
}

/// In-process, topic-addressed publish/subscribe.
///
/// Publishers enqueue without waiting. A dispatcher task owned by the
/// streamer fans every event out to the bounded channel of each subscriber
/// whose filter accepts the topic. A full channel drops the event for that
/// subscriber only, so a slow consumer never holds up publishers or other
/// consumers. Events are delivered in publish order.
pub struct SyncStreamer<T, P> {
    shared: Arc<Shared<T, P>>,
    queue: mpsc::UnboundedSender<Event<T, P>>,
    shutdown: CancellationToken,
    default_buffer: usize,
}

impl<T, P> Clone for SyncStreamer<T, P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            queue: self.queue.clone(),
            shutdown: self.shutdown.clone(),
            default_buffer: self.default_buffer,
        }
    }
}

impl<T, P> Debug for SyncStreamer<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncStreamer")
            .field("name", &self.shared.name)
            .field("subscribers", &self.subscriber_count())
            .field("dropped", &self.dropped_events())
            .finish()
    }
}

impl<T, P> SyncStreamer<T, P>
where
    T: Debug + Clone + Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    /// Create a streamer and spawn its dispatcher. Must be called from within
    /// a Tokio runtime.
    pub fn new(name: &'static str, default_buffer: usize) -> Self {
        let shared = Arc::new(Shared {
            name,
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });
        let (queue, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        tokio::spawn(dispatch(Arc::clone(&shared), rx, shutdown.clone()));
        tracing::debug!("[SyncStreamer] {}: dispatcher started", name);

        Self {
            shared,
            queue,
            shutdown,
            default_buffer: default_buffer.max(MIN_SUBSCRIBER_BUFFER),
        }
    }

    /// Enqueue an event. Never blocks; after shutdown the event is discarded.
    pub fn publish(&self, topic: T, payload: P) {
        if self.shared.closed.load(Ordering::Acquire) {
            tracing::debug!(
                "[SyncStreamer] {}: publish to {:?} after shutdown ignored",
                self.shared.name,
                topic
            );
            return;
        }
        if self.queue.send(Event { topic, payload }).is_err() {
            tracing::debug!("[SyncStreamer] {}: dispatcher gone", self.shared.name);
        }
    }

    /// Attach a live subscriber.
    pub fn subscribe<F>(
        &self,
        cancel: CancellationToken,
        filter: F,
        options: SubscribeOptions,
    ) -> Result<Subscription<T, P>, SyncError>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(SyncError::Closed);
        }
        let buffer = options
            .buffer
            .unwrap_or(self.default_buffer)
            .max(MIN_SUBSCRIBER_BUFFER);
        let (tx, rx) = mpsc::channel(buffer);
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        self.shared.subscribers.write().insert(
            id,
            Subscriber {
                filter: Arc::new(filter),
                tx,
            },
        );
        tracing::debug!(
            "[SyncStreamer] {}: subscriber {} attached (buffer={})",
            self.shared.name,
            id,
            buffer
        );

        Ok(Subscription {
            id,
            shared: Arc::clone(&self.shared),
            snapshot: VecDeque::new(),
            rx,
            cancel,
        })
    }

    /// Attach a subscriber that first receives the events produced by
    /// `snapshot`.
    ///
    /// The subscriber is registered before the snapshot runs, so anything
    /// published meanwhile is queued behind the snapshot rather than lost.
    /// Such events may duplicate snapshot rows; payloads carry whole state.
    pub async fn subscribe_with_snapshot<F, Fut, E>(
        &self,
        cancel: CancellationToken,
        filter: F,
        options: SubscribeOptions,
        snapshot: Fut,
    ) -> Result<Subscription<T, P>, SyncError>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Event<T, P>>, E>>,
        E: Display,
    {
        let mut subscription = self.subscribe(cancel, filter, options)?;
        match snapshot.await {
            Ok(events) => {
                tracing::debug!(
                    "[SyncStreamer] {}: subscriber {} snapshot of {} events",
                    self.shared.name,
                    subscription.id,
                    events.len()
                );
                subscription.snapshot = events.into();
                Ok(subscription)
            }
            Err(err) => Err(SyncError::Snapshot(err.to_string())),
        }
    }

    /// Stop the dispatcher and close every subscription.
    pub fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown.cancel();
        let detached = {
            let mut subscribers = self.shared.subscribers.write();
            let count = subscribers.len();
            subscribers.clear();
            count
        };
        tracing::info!(
            "[SyncStreamer] {}: shut down, {} subscribers closed",
            self.shared.name,
            detached
        );
    }
}

impl<T, P> SyncStreamer<T, P> {
    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.read().len()
    }

    /// Events dropped because a subscriber's buffer was full.
    pub fn dropped_events(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

async fn dispatch<T, P>(
    shared: Arc<Shared<T, P>>,
    mut rx: mpsc::UnboundedReceiver<Event<T, P>>,
    shutdown: CancellationToken,
) where
    T: Debug + Clone,
    P: Clone,
{
    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        fan_out(&shared, event);
    }
    tracing::debug!("[SyncStreamer] {}: dispatcher stopped", shared.name);
}

fn fan_out<T, P>(shared: &Shared<T, P>, event: Event<T, P>)
where
    T: Debug + Clone,
    P: Clone,
{
    let mut gone = Vec::new();
    {
        let subscribers = shared.subscribers.read();
        for (id, subscriber) in subscribers.iter() {
            if !(subscriber.filter)(&event.topic) {
                continue;
            }
            match subscriber.tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    shared.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        "[SyncStreamer] {}: subscriber {} buffer full, dropped event for {:?}",
                        shared.name,
                        id,
                        event.topic
                    );
                }
                Err(TrySendError::Closed(_)) => gone.push(*id),
            }
        }
    }
    for id in gone {
        shared.remove(id);
    }
}

/// Receiving end of one subscriber.
///
/// Yields snapshot events first, then live events, until the cancellation
/// token fires or the streamer shuts down. Dropping it detaches the
/// subscriber.
pub struct Subscription<T, P> {
    id: u64,
    shared: Arc<Shared<T, P>>,
    snapshot: VecDeque<Event<T, P>>,
    rx: mpsc::Receiver<Event<T, P>>,
    cancel: CancellationToken,
}

impl<T, P> Subscription<T, P> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event, or `None` once the subscription is closed.
    pub async fn recv(&mut self) -> Option<Event<T, P>> {
        if self.cancel.is_cancelled() {
            self.snapshot.clear();
            return None;
        }
        if let Some(event) = self.snapshot.pop_front() {
            return Some(event);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.rx.recv() => event,
        }
    }
}

impl<T, P> Drop for Subscription<T, P> {
    fn drop(&mut self) {
        self.shared.remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    type TestStreamer = SyncStreamer<u32, String>;

    async fn next(sub: &mut Subscription<u32, String>) -> Option<(u32, String)> {
        tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("timed out waiting for event")
            .map(|e| (e.topic, e.payload))
    }

    #[tokio::test]
    async fn test_filter_and_order() {
        let streamer = TestStreamer::new("test", DEFAULT_SUBSCRIBER_BUFFER);
        let mut evens = streamer
            .subscribe(CancellationToken::new(), |t| t % 2 == 0, SubscribeOptions::default())
            .unwrap();
        let mut all = streamer
            .subscribe(CancellationToken::new(), |_| true, SubscribeOptions::default())
            .unwrap();

        for i in 0..6u32 {
            streamer.publish(i, format!("e{i}"));
        }

        for i in [0u32, 2, 4] {
            assert_eq!(next(&mut evens).await, Some((i, format!("e{i}"))));
        }
        for i in 0..6u32 {
            assert_eq!(next(&mut all).await, Some((i, format!("e{i}"))));
        }
    }

    #[tokio::test]
    async fn test_snapshot_precedes_live() {
        let streamer = TestStreamer::new("test", DEFAULT_SUBSCRIBER_BUFFER);
        let publisher = streamer.clone();
        let mut sub = streamer
            .subscribe_with_snapshot(
                CancellationToken::new(),
                |_| true,
                SubscribeOptions::default(),
                async move {
                    // published while the snapshot is being assembled
                    publisher.publish(7, "live".to_string());
                    Ok::<_, String>(vec![
                        Event::new(1, "snap-a".to_string()),
                        Event::new(2, "snap-b".to_string()),
                    ])
                },
            )
            .await
            .unwrap();

        assert_eq!(next(&mut sub).await, Some((1, "snap-a".to_string())));
        assert_eq!(next(&mut sub).await, Some((2, "snap-b".to_string())));
        assert_eq!(next(&mut sub).await, Some((7, "live".to_string())));
    }

    #[tokio::test]
    async fn test_cancel_discards_pending_snapshot() {
        let streamer = TestStreamer::new("test", DEFAULT_SUBSCRIBER_BUFFER);
        let cancel = CancellationToken::new();
        let mut sub = streamer
            .subscribe_with_snapshot(
                cancel.clone(),
                |_| true,
                SubscribeOptions::default(),
                async {
                    Ok::<_, String>(vec![
                        Event::new(1, "snap-a".to_string()),
                        Event::new(2, "snap-b".to_string()),
                    ])
                },
            )
            .await
            .unwrap();

        assert_eq!(next(&mut sub).await, Some((1, "snap-a".to_string())));
        cancel.cancel();
        assert_eq!(next(&mut sub).await, None);
        assert_eq!(next(&mut sub).await, None);
    }

    #[tokio::test]
    async fn test_failed_snapshot_detaches() {
        let streamer = TestStreamer::new("test", DEFAULT_SUBSCRIBER_BUFFER);
        let result = streamer
            .subscribe_with_snapshot(
                CancellationToken::new(),
                |_| true,
                SubscribeOptions::default(),
                async { Err::<Vec<Event<u32, String>>, _>("boom") },
            )
            .await;
        assert!(matches!(result, Err(SyncError::Snapshot(m)) if m == "boom"));
        assert_eq!(streamer.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_drops_without_blocking_others() {
        let streamer = TestStreamer::new("test", DEFAULT_SUBSCRIBER_BUFFER);
        let slow = streamer
            .subscribe(
                CancellationToken::new(),
                |_| true,
                SubscribeOptions { buffer: Some(1) },
            )
            .unwrap();
        let mut fast = streamer
            .subscribe(CancellationToken::new(), |_| true, SubscribeOptions::default())
            .unwrap();

        let total = MIN_SUBSCRIBER_BUFFER as u32 + 20;
        for i in 0..total {
            streamer.publish(i, String::new());
            // keep the fast consumer drained so only the slow one overflows
            assert_eq!(next(&mut fast).await.map(|(t, _)| t), Some(i));
        }

        assert_eq!(streamer.dropped_events(), 20);
        drop(slow);
        assert_eq!(streamer.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_and_shutdown_close_subscriptions() {
        let streamer = TestStreamer::new("test", DEFAULT_SUBSCRIBER_BUFFER);
        let cancel = CancellationToken::new();
        let mut cancelled = streamer
            .subscribe(cancel.clone(), |_| true, SubscribeOptions::default())
            .unwrap();
        let mut other = streamer
            .subscribe(CancellationToken::new(), |_| true, SubscribeOptions::default())
            .unwrap();

        cancel.cancel();
        assert_eq!(next(&mut cancelled).await, None);

        streamer.shutdown();
        assert_eq!(next(&mut other).await, None);
        assert_eq!(streamer.subscriber_count(), 0);
        assert!(matches!(
            streamer.subscribe(CancellationToken::new(), |_| true, SubscribeOptions::default()),
            Err(SyncError::Closed)
        ));
        // publishing after shutdown is a no-op
        streamer.publish(1, String::new());
    }
}
