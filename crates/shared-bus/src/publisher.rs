//! Per-endpoint publish/subscribe registry.

use crate::events::OperationEvent;
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use dashmap::DashMap;
use shared_types::EndpointId;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

/// Trait for publishing operation events. The sync coordinator depends
/// on this rather than on `EndpointEventBus` directly, so it can be
/// swapped for a test double.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event on an endpoint's channel. Returns the number of
    /// active subscribers that received it (0 if none are connected —
    /// this is not an error, per §4.8's best-effort broadcast).
    async fn publish(&self, endpoint_id: EndpointId, event: OperationEvent) -> usize;

    fn events_published(&self) -> u64;
}

/// Registry of one broadcast channel per endpoint, created lazily.
pub struct EndpointEventBus {
    channels: DashMap<EndpointId, broadcast::Sender<OperationEvent>>,
    events_published: AtomicU64,
    capacity: usize,
}

impl EndpointEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to an endpoint's event channel, creating it if absent.
    #[must_use]
    pub fn subscribe(&self, endpoint_id: EndpointId) -> broadcast::Receiver<OperationEvent> {
        self.channels
            .entry(endpoint_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Number of endpoints with at least one live subscriber.
    #[must_use]
    pub fn active_endpoint_count(&self) -> usize {
        self.channels
            .iter()
            .filter(|entry| entry.value().receiver_count() > 0)
            .count()
    }

    /// Total subscriber count across all endpoints.
    #[must_use]
    pub fn total_subscriber_count(&self) -> usize {
        self.channels
            .iter()
            .map(|entry| entry.value().receiver_count())
            .sum()
    }

    /// Drop channels with no subscribers left, so the registry does not
    /// grow unbounded over the lifetime of a long-running coordinator.
    pub fn sweep_idle(&self) {
        self.channels.retain(|_, tx| tx.receiver_count() > 0);
    }
}

impl Default for EndpointEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for EndpointEventBus {
    async fn publish(&self, endpoint_id: EndpointId, event: OperationEvent) -> usize {
        self.events_published.fetch_add(1, Ordering::Relaxed);

        let sender = self
            .channels
            .entry(endpoint_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0);

        match sender.send(event) {
            Ok(count) => {
                debug!(%endpoint_id, receivers = count, "operation event published");
                count
            }
            Err(_) => {
                debug!(%endpoint_id, "operation event dropped, no subscribers");
                0
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::OperationId;

    fn sample_event() -> OperationEvent {
        OperationEvent::OperationCompleted {
            operation_id: OperationId::new(),
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_returns_zero() {
        let bus = EndpointEventBus::new();
        let received = bus.publish(EndpointId::new(), sample_event()).await;
        assert_eq!(received, 0);
        assert_eq!(bus.events_published(), 1);
    }

    #[tokio::test]
    async fn publish_isolated_per_endpoint() {
        let bus = EndpointEventBus::new();
        let a = EndpointId::new();
        let b = EndpointId::new();

        let mut rx_a = bus.subscribe(a);
        let mut rx_b = bus.subscribe(b);

        bus.publish(a, sample_event()).await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn sweep_idle_drops_channels_with_no_subscribers() {
        let bus = EndpointEventBus::new();
        let id = EndpointId::new();
        {
            let _rx = bus.subscribe(id);
            assert_eq!(bus.active_endpoint_count(), 1);
        }
        bus.sweep_idle();
        assert_eq!(bus.active_endpoint_count(), 0);
    }
}
