//! In-process bus transport.
//!
//! Loops published messages back to local subscribers whose patterns match
//! the topic. Used by tests and when the hub runs without a broker.

use std::future::Future;
use std::sync::Mutex;

use tokio::sync::mpsc;

use hearth_domain::error::HubError;

use crate::bus::TopicPattern;
use crate::ports::{BusTransport, InboundMessage};

struct Subscriber {
    patterns: Vec<TopicPattern>,
    sender: mpsc::Sender<InboundMessage>,
}

/// [`BusTransport`] backed by tokio [`mpsc`] channels.
///
/// Publishing never waits: a subscriber whose queue is full misses the
/// message, and closed subscribers are pruned.
pub struct InProcessTransport {
    capacity: usize,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl InProcessTransport {
    /// Create a transport whose subscriber queues hold `capacity` messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn deliver(&self, topic: &str, body: &[u8]) -> Result<(), HubError> {
        let mut subscribers = self
            .subscribers
            .lock()
            .map_err(|_| HubError::internal("in-process transport lock poisoned"))?;
        subscribers.retain(|subscriber| !subscriber.sender.is_closed());
        for subscriber in subscribers.iter() {
            if !subscriber.patterns.iter().any(|p| p.matches(topic)) {
                continue;
            }
            let message = InboundMessage {
                topic: topic.to_owned(),
                payload: body.to_vec(),
            };
            if let Err(mpsc::error::TrySendError::Full(_)) = subscriber.sender.try_send(message) {
                tracing::warn!(topic, "in-process subscriber is full, message dropped");
            }
        }
        Ok(())
    }

    fn register(&self, patterns: &[String]) -> Result<mpsc::Receiver<InboundMessage>, HubError> {
        let patterns = patterns
            .iter()
            .map(|raw| TopicPattern::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;
        let (sender, receiver) = mpsc::channel(self.capacity);
        self.subscribers
            .lock()
            .map_err(|_| HubError::internal("in-process transport lock poisoned"))?
            .push(Subscriber { patterns, sender });
        Ok(receiver)
    }
}

impl Default for InProcessTransport {
    fn default() -> Self {
        Self::new(256)
    }
}

impl BusTransport for InProcessTransport {
    fn publish(
        &self,
        topic: &str,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        let result = self.deliver(topic, &body);
        async move { result }
    }

    fn subscribe(
        &self,
        patterns: &[String],
    ) -> impl Future<Output = Result<mpsc::Receiver<InboundMessage>, HubError>> + Send {
        let result = self.register(patterns);
        async move { result }
    }
}
