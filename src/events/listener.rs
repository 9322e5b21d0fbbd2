use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::VolError;

use super::{EventFilter, EventSource};

/// How a subscription ended.
#[derive(Debug)]
pub enum StreamEnd {
    /// The owner cancelled or dropped the handle.
    Cancelled,
    /// The stream ended on its own. Always a [`VolError::StreamClosed`].
    Closed(VolError),
}

/// Owned handle to a running subscription.
///
/// Dropping the handle cancels the subscription. A cancelled or closed
/// subscription cannot be restarted; subscribe again instead.
pub struct Subscription {
    name: String,
    token: CancellationToken,
    delivered: Arc<AtomicU64>,
    task: JoinHandle<StreamEnd>,
}

impl Subscription {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Number of events handed to the callback so far.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the subscription to end.
    pub async fn closed(mut self) -> StreamEnd {
        match (&mut self.task).await {
            Ok(end) => end,
            Err(e) => StreamEnd::Closed(VolError::StreamClosed {
                stream: self.name.clone(),
                reason: format!("event handler task failed: {}", e),
            }),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Starts subscriptions to the two daemon event streams.
///
/// Each matching line produces exactly one callback invocation, in stream
/// order, with no buffering or coalescing. When a stream ends the closure
/// is logged and nothing restarts it.
pub struct EventListener {
    source: Arc<dyn EventSource>,
    volume_filter: EventFilter,
    action_filter: EventFilter,
}

impl EventListener {
    pub fn new(source: Arc<dyn EventSource>, volume_filter: EventFilter, action_filter: EventFilter) -> Self {
        Self {
            source,
            volume_filter,
            action_filter,
        }
    }

    pub fn subscribe_volume_events<F>(&self, on_event: F) -> Result<Subscription, VolError>
    where
        F: FnMut(String) + Send + 'static,
    {
        self.subscribe(&self.volume_filter, on_event)
    }

    pub fn subscribe_action_events<F>(&self, on_event: F) -> Result<Subscription, VolError>
    where
        F: FnMut(String) + Send + 'static,
    {
        self.subscribe(&self.action_filter, on_event)
    }

    fn subscribe<F>(&self, filter: &EventFilter, mut on_event: F) -> Result<Subscription, VolError>
    where
        F: FnMut(String) + Send + 'static,
    {
        let mut events = self.source.open(filter)?;
        let token = CancellationToken::new();
        let delivered = Arc::new(AtomicU64::new(0));

        let child = token.clone();
        let counter = Arc::clone(&delivered);
        let filter = filter.clone();
        let name = filter.name.clone();

        tracing::info!(stream = %name, "Listening to daemon events");
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = child.cancelled() => {
                        tracing::debug!(stream = %filter.name, "Subscription cancelled");
                        return StreamEnd::Cancelled;
                    }
                    next = events.next() => match next {
                        Some(Ok(line)) => {
                            if !filter.matches(&line) {
                                tracing::trace!(stream = %filter.name, "Ignoring non-matching event");
                                continue;
                            }
                            if child.is_cancelled() {
                                return StreamEnd::Cancelled;
                            }
                            counter.fetch_add(1, Ordering::SeqCst);
                            on_event(line);
                        }
                        Some(Err(e)) => {
                            tracing::warn!(stream = %filter.name, error = %e, "Event stream failed");
                            return StreamEnd::Closed(e);
                        }
                        None => {
                            tracing::info!(stream = %filter.name, "Event stream closed");
                            return StreamEnd::Closed(VolError::StreamClosed {
                                stream: filter.name.clone(),
                                reason: "end of stream".to_string(),
                            });
                        }
                    }
                }
            }
        });

        Ok(Subscription {
            name,
            token,
            delivered,
            task,
        })
    }
}
