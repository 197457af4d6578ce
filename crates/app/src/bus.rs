//! Message bus: topic-addressed publish/subscribe over a [`BusTransport`].
//!
//! Handlers are registered against topic patterns before the bus starts.
//! Every inbound message is matched against every pattern and handed to
//! each matching handler in turn, each within its own [`Scope`]. A failing
//! handler never stops delivery to the others, nor the bus itself.

mod middleware;
mod topic;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use hearth_domain::error::HubError;
use hearth_domain::event::{Event, namespaced};

use crate::ports::{BusTransport, EventPublisher, InboundMessage};
use crate::runtime::ActorError;
use crate::scope::Scope;

pub use self::middleware::{error_logger, unit_of_work};
pub use self::topic::{TopicPattern, WILDCARD};

/// A bus handler: receives the scope of the message, the event, and a
/// [`Publisher`] for follow-up events.
pub type Handler<W> =
    Arc<dyn Fn(Scope<W>, Event, Publisher) -> BoxFuture<'static, Result<(), HubError>> + Send + Sync>;

/// Wraps a [`Handler`] with cross-cutting behaviour.
pub type Middleware<W> = Arc<dyn Fn(Handler<W>) -> Handler<W> + Send + Sync>;

/// Turn an async function into a [`Handler`].
pub fn handler<W, F, Fut>(f: F) -> Handler<W>
where
    F: Fn(Scope<W>, Event, Publisher) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HubError>> + Send + 'static,
{
    Arc::new(move |scope, event, publisher| f(scope, event, publisher).boxed())
}

/// Turn a handler-wrapping function into a [`Middleware`].
pub fn middleware<W, F>(f: F) -> Middleware<W>
where
    F: Fn(Handler<W>) -> Handler<W> + Send + Sync + 'static,
{
    Arc::new(f)
}

type PublishFn = dyn Fn(Event) -> BoxFuture<'static, Result<(), HubError>> + Send + Sync;

/// Cheap handle for publishing events onto the bus.
#[derive(Clone)]
pub struct Publisher {
    inner: Arc<PublishFn>,
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher").finish_non_exhaustive()
    }
}

impl Publisher {
    /// Publish through `transport`, serializing the envelope first.
    #[must_use]
    pub fn from_transport<T: BusTransport + 'static>(transport: Arc<T>) -> Self {
        Self::from_fn(move |event: Event| {
            let transport = Arc::clone(&transport);
            async move {
                let body = event.to_bytes()?;
                transport.publish(&event.topic, body).await
            }
        })
    }

    /// Publish by calling `f`, mostly useful for tests and embedding.
    #[must_use]
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HubError>> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |event| f(event).boxed()),
        }
    }
}

impl EventPublisher for Publisher {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), HubError>> + Send {
        (self.inner)(event)
    }
}

struct Route<W> {
    pattern: TopicPattern,
    handler: Handler<W>,
}

/// Topic registry plus the dispatch loop.
///
/// `W` is the unit-of-work handle carried by each message's [`Scope`].
pub struct MessageBus<T, W> {
    transport: Arc<T>,
    publisher: Publisher,
    routes: Vec<Route<W>>,
}

impl<T, W> MessageBus<T, W>
where
    T: BusTransport + 'static,
    W: Send + 'static,
{
    #[must_use]
    pub fn new(transport: Arc<T>) -> Self {
        let publisher = Publisher::from_transport(Arc::clone(&transport));
        Self {
            transport,
            publisher,
            routes: Vec::new(),
        }
    }

    /// Handle on this bus's publish side.
    #[must_use]
    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// Register `handler` for `topic` (without namespace, `+` allowed).
    ///
    /// Middlewares wrap in the order given, so the last one is outermost:
    /// it runs first on the way in and last on the way out.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Invalid`] if the topic is not a valid pattern.
    pub fn handle(
        &mut self,
        topic: &str,
        handler: Handler<W>,
        middlewares: &[Middleware<W>],
    ) -> Result<(), HubError> {
        let pattern = TopicPattern::parse(&namespaced(topic))?;
        let handler = middlewares
            .iter()
            .fold(handler, |next, middleware| middleware(next));
        tracing::debug!(pattern = %pattern, "registered bus handler");
        self.routes.push(Route { pattern, handler });
        Ok(())
    }

    /// Every registered pattern, namespaced.
    #[must_use]
    pub fn patterns(&self) -> Vec<String> {
        let mut patterns: Vec<String> = self
            .routes
            .iter()
            .map(|route| route.pattern.as_str().to_owned())
            .collect();
        patterns.sort_unstable();
        patterns.dedup();
        patterns
    }

    /// Publish `event` on the transport.
    ///
    /// # Errors
    ///
    /// Returns the transport's send failure; downstream handling is not
    /// observed.
    pub async fn publish(&self, event: Event) -> Result<(), HubError> {
        self.publisher.publish(event).await
    }

    /// Deliver one inbound message to every matching handler, in
    /// registration order. Returns how many handlers matched.
    pub async fn dispatch(&self, message: InboundMessage) -> usize {
        let event = match Event::parse(&message.payload, &message.topic) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(topic = %message.topic, error = %err, "dropping malformed bus message");
                return 0;
            }
        };

        let mut matched = 0;
        for route in self.routes.iter().filter(|route| route.pattern.matches(&event.topic)) {
            matched += 1;
            let result = (route.handler)(Scope::new(), event.clone(), self.publisher.clone()).await;
            if let Err(err) = result {
                tracing::debug!(pattern = %route.pattern, error = %err, "bus handler returned an error");
            }
        }
        if matched == 0 {
            tracing::trace!(topic = %event.topic, "no handler for bus message");
        }
        matched
    }

    /// Subscribe to every registered pattern and dispatch until `token` is
    /// cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Cancelled`] on shutdown, or
    /// [`ActorError::Failed`] if the subscription cannot be made or the
    /// transport closes it.
    pub async fn execute(&self, token: CancellationToken) -> Result<(), ActorError> {
        let patterns = self.patterns();
        if patterns.is_empty() {
            token.cancelled().await;
            return Err(ActorError::Cancelled);
        }

        let mut inbound = self.transport.subscribe(&patterns).await?;
        tracing::info!(topics = ?patterns, "message bus listening");

        loop {
            tokio::select! {
                () = token.cancelled() => return Err(ActorError::Cancelled),
                message = inbound.recv() => match message {
                    Some(message) => {
                        self.dispatch(message).await;
                    }
                    None => {
                        return Err(HubError::internal("bus transport closed the subscription").into());
                    }
                },
            }
        }
    }
}
