use tokio::sync::broadcast;
use tracing::warn;

use crate::posts::Post;

const BUS_CAPACITY: usize = 64;

/// Change signal broadcast after a successful post mutation, used to
/// keep every displayed list consistent with the remote store.
#[derive(Debug, Clone)]
pub enum PostEvent {
    Created(Post),
    Updated { id: String },
    Deleted { id: String },
}

/// In-process change-signal bus.
///
/// Screens subscribe on activation and hold the returned
/// [`Subscription`] for as long as they are alive; dropping it
/// unsubscribes, so handlers cannot outlive their screen.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PostEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn publish(&self, event: PostEvent) {
        // No receivers just means no screen is currently showing a list.
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped handle to the bus; valid until dropped.
pub struct Subscription {
    rx: broadcast::Receiver<PostEvent>,
}

impl Subscription {
    /// Wait for the next event. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<PostEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber lagged, change signals dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant for UI polling loops.
    pub fn try_recv(&mut self) -> Option<PostEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber lagged, change signals dropped");
                }
                Err(_) => return None,
            }
        }
    }
}
