use std::time::Duration;

use async_trait::async_trait;
use devtools_api::Batch;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::streamer::{Event, Subscription, SyncError};
use crate::config::SyncConfig;

/// Destination of streamed response frames.
#[async_trait]
pub trait ResponseSink<R>: Send {
    async fn send(&mut self, response: R) -> Result<(), SyncError>;
}

#[async_trait]
impl<R: Send + 'static> ResponseSink<R> for mpsc::Sender<R> {
    async fn send(&mut self, response: R) -> Result<(), SyncError> {
        mpsc::Sender::send(self, response)
            .await
            .map_err(|_| SyncError::SinkClosed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub max_batch_size: usize,
    /// Longest a payload waits in a partial batch
    pub flush_interval: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            flush_interval: Duration::from_millis(50),
        }
    }
}

impl From<&SyncConfig> for BatchOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            max_batch_size: config.max_batch_size.max(1),
            flush_interval: config.flush_interval(),
        }
    }
}

/// Counters of one bridged stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub batches: usize,
    pub items: usize,
}

enum Step<E> {
    Event(Option<E>),
    Flush,
}

/// Forward a subscription to a streaming response in batches.
///
/// `convert` turns each event into a response item, or skips it by returning
/// `None`. A batch is sent as soon as it holds `max_batch_size` items, or
/// `flush_interval` after its first item arrived, whichever comes first.
/// When the subscription ends the partial batch is flushed and the function
/// returns. A failing sink stops the bridge immediately.
pub async fn stream_to_client<T, P, I, C, S>(
    mut subscription: Subscription<T, P>,
    mut convert: C,
    options: BatchOptions,
    mut sink: S,
) -> Result<BridgeStats, SyncError>
where
    C: FnMut(Event<T, P>) -> Option<I>,
    S: ResponseSink<Batch<I>>,
{
    let max_batch_size = options.max_batch_size.max(1);
    let mut buffer: Vec<I> = Vec::with_capacity(max_batch_size);
    let mut deadline: Option<Instant> = None;
    let mut stats = BridgeStats::default();

    loop {
        let step = match deadline {
            Some(at) => tokio::select! {
                biased;
                _ = tokio::time::sleep_until(at) => Step::Flush,
                event = subscription.recv() => Step::Event(event),
            },
            None => Step::Event(subscription.recv().await),
        };

        match step {
            Step::Event(Some(event)) => {
                let Some(item) = convert(event) else {
                    continue;
                };
                if buffer.is_empty() {
                    deadline = Some(Instant::now() + options.flush_interval);
                }
                buffer.push(item);
                if buffer.len() >= max_batch_size {
                    flush(&mut sink, &mut buffer, &mut stats).await?;
                    deadline = None;
                }
            }
            Step::Flush => {
                flush(&mut sink, &mut buffer, &mut stats).await?;
                deadline = None;
            }
            Step::Event(None) => {
                if !buffer.is_empty() {
                    flush(&mut sink, &mut buffer, &mut stats).await?;
                }
                tracing::debug!(
                    "[StreamBridge] Subscription {} ended after {} batches ({} items)",
                    subscription.id(),
                    stats.batches,
                    stats.items
                );
                return Ok(stats);
            }
        }
    }
}

async fn flush<I, S>(sink: &mut S, buffer: &mut Vec<I>, stats: &mut BridgeStats) -> Result<(), SyncError>
where
    S: ResponseSink<Batch<I>>,
{
    let items = std::mem::take(buffer);
    let count = items.len();
    if let Err(err) = sink.send(Batch { items }).await {
        tracing::debug!("[StreamBridge] Client went away: {}", err);
        return Err(err);
    }
    stats.batches += 1;
    stats.items += count;
    Ok(())
}
