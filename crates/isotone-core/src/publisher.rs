use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use isotone_types::{ServiceState, StateChange};
use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};

/// Receives state changes pushed by a [`StatusPublisher`].
pub trait StatusObserver: Send + Sync + 'static {
    fn on_service_state_changed(&self, change: &StateChange);
}

impl<F> StatusObserver for F
where
    F: Fn(&StateChange) + Send + Sync + 'static,
{
    fn on_service_state_changed(&self, change: &StateChange) {
        self(change);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

/// Fan-out of state changes to any number of subscribers.
///
/// Each subscriber owns a queue of `capacity` events (rounded up to a power
/// of two). When a subscriber falls behind, its oldest events are
/// overwritten and counted in [`Subscription::dropped`]. Publishing never
/// waits for a subscriber. Events for one service reach a subscriber in the
/// order they were published.
pub struct StatusPublisher {
    capacity: usize,
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(SubscriptionHandle, broadcast::Sender<StateChange>)>>,
}

impl StatusPublisher {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let handle = SubscriptionHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = broadcast::channel(self.capacity);
        self.subscribers.lock().push((handle, tx));
        tracing::debug!(handle = handle.0, "subscriber added");

        Subscription {
            handle,
            receiver: rx,
            dropped: 0,
        }
    }

    /// Deliver every change to `observer` from a background task. Must be
    /// called within a tokio runtime.
    pub fn subscribe_observer(&self, observer: Arc<dyn StatusObserver>) -> SubscriptionHandle {
        let mut subscription = self.subscribe();
        let handle = subscription.handle();
        tokio::spawn(async move {
            while let Some(change) = subscription.recv().await {
                observer.on_service_state_changed(&change);
            }
        });
        handle
    }

    /// Returns false if the handle was not subscribed.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(h, _)| *h != handle);
        before != subscribers.len()
    }

    pub fn publish(&self, service: &str, previous: &ServiceState, current: &ServiceState) {
        let change = StateChange {
            service: service.to_owned(),
            previous: previous.clone(),
            current: current.clone(),
        };

        // a failed send means the receiving side is gone
        self.subscribers.lock().retain(|(handle, tx)| {
            let alive = tx.send(change.clone()).is_ok();
            if !alive {
                tracing::debug!(handle = handle.0, "subscriber gone");
            }
            alive
        });
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

pub struct Subscription {
    handle: SubscriptionHandle,
    receiver: broadcast::Receiver<StateChange>,
    dropped: u64,
}

impl Subscription {
    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle
    }

    /// Events lost so far because this subscriber fell behind.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Next change, or `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<StateChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(RecvError::Lagged(n)) => self.dropped += n,
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<StateChange> {
        loop {
            match self.receiver.try_recv() {
                Ok(change) => return Some(change),
                Err(TryRecvError::Lagged(n)) => self.dropped += n,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Stream of changes. Lost events are skipped silently.
    pub fn into_stream(self) -> impl Stream<Item = StateChange> + Send + Unpin + 'static {
        BroadcastStream::new(self.receiver).filter_map(Result::ok)
    }
}
