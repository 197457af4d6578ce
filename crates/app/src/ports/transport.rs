//! Bus transport port: the broker (or loopback) the message bus rides on.

use std::future::Future;

use tokio::sync::mpsc;

use hearth_domain::error::HubError;

/// A raw message delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Delivers serialized events between processes.
///
/// Delivery is at-least-once; consumers must tolerate duplicates.
pub trait BusTransport: Send + Sync {
    /// Send `body` on `topic`.
    fn publish(
        &self,
        topic: &str,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Subscribe to every topic matching one of `patterns` (`+` matches
    /// exactly one segment). Messages arrive on the returned channel in
    /// transport order.
    fn subscribe(
        &self,
        patterns: &[String],
    ) -> impl Future<Output = Result<mpsc::Receiver<InboundMessage>, HubError>> + Send;
}

impl<T: BusTransport> BusTransport for std::sync::Arc<T> {
    fn publish(
        &self,
        topic: &str,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        (**self).publish(topic, body)
    }

    fn subscribe(
        &self,
        patterns: &[String],
    ) -> impl Future<Output = Result<mpsc::Receiver<InboundMessage>, HubError>> + Send {
        (**self).subscribe(patterns)
    }
}
