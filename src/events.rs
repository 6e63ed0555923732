//! Publish/subscribe registry for invalidation signals.
//!
//! Producers hold a [`RefreshBus`] and call [`RefreshBus::publish`]; consumers
//! call [`RefreshBus::subscribe`] and await signals. Neither side knows about
//! the other. Delivery is best-effort: a signal sent while nobody listens is
//! dropped, and a subscriber that falls behind sees the backlog as one signal.

use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshSignal {
    /// The distinct set of category labels may have changed.
    Categories,
}

#[derive(Debug, Clone)]
pub struct RefreshBus {
    sender: broadcast::Sender<RefreshSignal>,
}

impl Default for RefreshBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Fire-and-forget. Returns how many subscribers were reached.
    pub fn publish(&self, signal: RefreshSignal) -> usize {
        let reached = self.sender.send(signal).unwrap_or(0);
        debug!(?signal, reached, "published refresh signal");
        reached
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

pub struct Subscription {
    receiver: broadcast::Receiver<RefreshSignal>,
}

impl Subscription {
    /// Waits for the next signal. Returns `None` once every bus handle is gone.
    pub async fn recv(&mut self) -> Option<RefreshSignal> {
        loop {
            match self.receiver.recv().await {
                Ok(signal) => return Some(signal),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "subscriber lagged, collapsing signals");
                    // The next successful recv stands for everything skipped.
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking check, draining everything pending into one answer.
    pub fn try_recv(&mut self) -> Option<RefreshSignal> {
        let mut last = None;
        loop {
            match self.receiver.try_recv() {
                Ok(signal) => last = Some(signal),
                Err(broadcast::error::TryRecvError::Lagged(_)) => {
                    last = Some(RefreshSignal::Categories);
                }
                Err(_) => return last,
            }
        }
    }
}
