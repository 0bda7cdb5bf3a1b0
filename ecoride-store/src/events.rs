use ecoride_shared::RideEvent;
use tokio::sync::broadcast;
use tracing::debug;

/// Fan-out of ride events to live subscribers (SSE streams).
#[derive(Clone)]
pub struct EventPublisher {
    tx: broadcast::Sender<RideEvent>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishing never fails: an event without subscribers is dropped.
    pub fn publish(&self, event: RideEvent) {
        let name = event.name();
        let trip_id = event.trip_id();
        match self.tx.send(event) {
            Ok(receivers) => debug!("Published {} for trip {} to {} subscriber(s)", name, trip_id, receivers),
            Err(_) => debug!("No subscribers for {} on trip {}", name, trip_id),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RideEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(100)
    }
}
