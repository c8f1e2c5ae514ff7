//! Fan-out of validated readings to every subscriber
//!
//! Readings form a current-state stream, not a queue: a subscriber that
//! cannot take a message right now simply misses it.

use tokio::sync::mpsc;

use crate::sensor::SensorReading;

/// Why a single delivery did not happen
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("subscriber not ready")]
    NotReady,
    #[error("subscriber closed")]
    Closed,
}

/// Something a serialized reading can be pushed into
pub trait ReadingSink: Send {
    fn deliver(&mut self, payload: &str) -> Result<(), DeliveryError>;
}

/// Sink backed by a bounded channel to a connection task
impl ReadingSink for mpsc::Sender<String> {
    fn deliver(&mut self, payload: &str) -> Result<(), DeliveryError> {
        self.try_send(payload.to_owned()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::NotReady,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// Opaque handle returned by [`ReadingBroadcaster::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of one [`ReadingBroadcaster::publish`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
    pub failed: usize,
}

/// Ordered set of subscribers, owned by the ingestion loop
#[derive(Default)]
pub struct ReadingBroadcaster {
    subscribers: Vec<(SubscriptionId, Box<dyn ReadingSink>)>,
    next_id: u64,
}

impl ReadingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink. Every call returns a fresh handle, so subscribing the
    /// same underlying sink twice yields two independently removable entries.
    pub fn subscribe(&mut self, sink: impl ReadingSink + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(sink)));
        id
    }

    /// Remove a subscription. Returns false if the handle was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Drop every subscription (closes channel-backed sinks)
    pub fn clear(&mut self) {
        self.subscribers.clear();
    }

    /// Deliver a reading to every subscriber in subscription order.
    ///
    /// A failing subscriber is logged and skipped for this reading only; it
    /// stays subscribed until its owner unsubscribes it.
    pub fn publish(&mut self, reading: &SensorReading) -> PublishReport {
        let payload = match reading.to_json() {
            Ok(json) => json,
            Err(e) => {
                log::error!("Failed to serialize reading: {}", e);
                return PublishReport::default();
            }
        };
        self.publish_raw(&payload)
    }

    /// Deliver an already serialized message
    pub fn publish_raw(&mut self, payload: &str) -> PublishReport {
        let mut report = PublishReport::default();
        for (id, sink) in self.subscribers.iter_mut() {
            match sink.deliver(payload) {
                Ok(()) => report.delivered += 1,
                Err(DeliveryError::NotReady) => {
                    log::debug!("Subscriber {} not ready, reading dropped", id);
                    report.dropped += 1;
                }
                Err(e) => {
                    log::warn!("Delivery to subscriber {} failed: {}", id, e);
                    report.failed += 1;
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records payloads into a shared log tagged with its name
    struct Recording {
        name: &'static str,
        log: Arc<Mutex<Vec<(&'static str, String)>>>,
    }

    impl ReadingSink for Recording {
        fn deliver(&mut self, payload: &str) -> Result<(), DeliveryError> {
            self.log.lock().unwrap().push((self.name, payload.to_owned()));
            Ok(())
        }
    }

    struct Broken;

    impl ReadingSink for Broken {
        fn deliver(&mut self, _payload: &str) -> Result<(), DeliveryError> {
            Err(DeliveryError::Closed)
        }
    }

    fn reading() -> SensorReading {
        SensorReading::from_values(&[0.0; 13], 1).unwrap()
    }

    #[test]
    fn test_publish_reaches_all_despite_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut hub = ReadingBroadcaster::new();
        hub.subscribe(Recording { name: "a", log: log.clone() });
        hub.subscribe(Broken);
        hub.subscribe(Recording { name: "b", log: log.clone() });

        let report = hub.publish(&reading());
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);

        let names: Vec<_> = log.lock().unwrap().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["a", "b"]);
        // Failing subscriber is skipped, not removed
        assert_eq!(hub.len(), 3);
    }

    #[test]
    fn test_duplicate_subscribe_independent_handles() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut hub = ReadingBroadcaster::new();
        let first = hub.subscribe(Recording { name: "x", log: log.clone() });
        let second = hub.subscribe(Recording { name: "x", log: log.clone() });
        assert_ne!(first, second);

        assert!(hub.unsubscribe(first));
        assert!(!hub.unsubscribe(first));
        hub.publish(&reading());
        assert_eq!(log.lock().unwrap().len(), 1);

        assert!(hub.unsubscribe(second));
        assert!(hub.is_empty());
    }

    #[test]
    fn test_channel_sink_not_ready_drops_only_that_reading() {
        let mut hub = ReadingBroadcaster::new();
        let (slow_tx, mut slow_rx) = mpsc::channel::<String>(1);
        let (fast_tx, mut fast_rx) = mpsc::channel::<String>(8);
        hub.subscribe(slow_tx);
        hub.subscribe(fast_tx);

        let first = hub.publish(&reading());
        assert_eq!(first.delivered, 2);
        let second = hub.publish(&reading());
        assert_eq!(second.delivered, 1);
        assert_eq!(second.dropped, 1);

        assert!(slow_rx.try_recv().is_ok());
        assert!(slow_rx.try_recv().is_err());
        assert!(fast_rx.try_recv().is_ok());
        assert!(fast_rx.try_recv().is_ok());

        // Slow subscriber catches up with the next reading
        let third = hub.publish(&reading());
        assert_eq!(third.delivered, 2);
    }

    #[test]
    fn test_closed_channel_counts_as_failure() {
        let mut hub = ReadingBroadcaster::new();
        let (tx, rx) = mpsc::channel::<String>(1);
        drop(rx);
        hub.subscribe(tx);
        let report = hub.publish(&reading());
        assert_eq!(report.failed, 1);
    }
}
