//! # Shared Bus — per-endpoint event broadcast
//!
//! The sync coordinator is the sole publisher; each endpoint's WebSocket
//! session (§4.8) is a subscriber. Unlike a single global topic, events
//! for endpoint A must never reach a subscriber on endpoint B, so the bus
//! is a registry of one `tokio::sync::broadcast` channel per endpoint,
//! created lazily on first publish or subscribe and dropped once both
//! sides are gone.
//!
//! Per the design notes' redesign guidance: model as a publish-subscribe
//! registry keyed by endpoint id, each subscriber holding a bounded
//! outbound queue; slow subscribers are dropped rather than blocking the
//! coordinator. `broadcast` already drops slow receivers (lagged) and
//! send never blocks the publisher.

pub mod events;
pub mod publisher;

pub use events::OperationEvent;
pub use publisher::{EndpointEventBus, EventPublisher};

/// Events buffered per endpoint channel before a slow subscriber starts
/// lagging and missing messages.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;
