//! Event bus port: publish domain events onto the bus.

use std::future::Future;

use hearth_domain::error::HubError;
use hearth_domain::event::Event;

/// Publishes domain events to whoever listens on their topic.
///
/// Delivery is fire-and-forget: an `Ok` only means the transport accepted
/// the event, not that any handler processed it.
pub trait EventPublisher {
    /// Publish an event on its own topic.
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), HubError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), HubError>> + Send {
        (**self).publish(event)
    }
}
