//! MQTT implementation of the [`BusTransport`] port.
//!
//! [`MqttTransport`] is the publishing and subscribing half and is shared
//! with the message bus. [`MqttEventLoop`] drives the broker connection and
//! forwards incoming publishes to the matching subscriptions; it runs as an
//! actor of its own.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, Publish, QoS};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use hearth_app::bus::TopicPattern;
use hearth_app::ports::{BusTransport, InboundMessage};
use hearth_app::runtime::ActorError;
use hearth_domain::error::HubError;

use crate::config::MqttConfig;
use crate::error::MqttError;

const RETRY_DELAY: Duration = Duration::from_millis(200);

struct Subscription {
    raw: Vec<String>,
    patterns: Vec<TopicPattern>,
    sender: mpsc::Sender<InboundMessage>,
}

type Subscriptions = Arc<Mutex<Vec<Subscription>>>;

/// Publishing and subscribing half of the broker connection.
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
    capacity: usize,
    subscriptions: Subscriptions,
}

/// Connection-driving half, returned alongside [`MqttTransport`].
pub struct MqttEventLoop {
    client: AsyncClient,
    eventloop: EventLoop,
    subscriptions: Subscriptions,
}

impl MqttTransport {
    /// Prepare a client for the configured broker. Nothing is sent until
    /// the returned [`MqttEventLoop`] runs.
    #[must_use]
    pub fn new(config: &MqttConfig) -> (Self, MqttEventLoop) {
        let mut options = MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(u64::from(config.keep_alive_secs)));
        options.set_clean_session(true);

        let capacity = config.channel_capacity.max(1);
        let (client, eventloop) = AsyncClient::new(options, capacity);
        let subscriptions = Subscriptions::default();
        (
            Self {
                client: client.clone(),
                capacity,
                subscriptions: Arc::clone(&subscriptions),
            },
            MqttEventLoop {
                client,
                eventloop,
                subscriptions,
            },
        )
    }

    /// Ask the broker to close the connection, without waiting.
    pub fn disconnect(&self) {
        if let Err(err) = self.client.try_disconnect() {
            tracing::debug!(error = %err, "mqtt disconnect request not sent");
        }
    }

    async fn register(&self, patterns: &[String]) -> Result<mpsc::Receiver<InboundMessage>, HubError> {
        let parsed = patterns
            .iter()
            .map(|raw| TopicPattern::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;
        for raw in patterns {
            self.client
                .subscribe(raw.as_str(), QoS::AtLeastOnce)
                .await
                .map_err(MqttError::from)?;
        }
        let (sender, receiver) = mpsc::channel(self.capacity);
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscription {
                raw: patterns.to_vec(),
                patterns: parsed,
                sender,
            });
        tracing::debug!(topics = ?patterns, "mqtt subscription registered");
        Ok(receiver)
    }
}

impl BusTransport for MqttTransport {
    fn publish(
        &self,
        topic: &str,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        let client = self.client.clone();
        let topic = topic.to_owned();
        async move {
            client
                .publish(topic, QoS::AtLeastOnce, false, body)
                .await
                .map_err(MqttError::from)?;
            Ok(())
        }
    }

    fn subscribe(
        &self,
        patterns: &[String],
    ) -> impl Future<Output = Result<mpsc::Receiver<InboundMessage>, HubError>> + Send {
        self.register(patterns)
    }
}

impl MqttEventLoop {
    /// Drive the connection until `token` is cancelled.
    ///
    /// Connection errors are logged and retried; rumqttc reconnects on the
    /// next poll and subscriptions are renewed once the broker accepts the
    /// new session. The loop never waits on a subscriber, so handlers
    /// publishing through the same client cannot stall it.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Cancelled`] on shutdown.
    pub async fn run(self, token: CancellationToken) -> Result<(), ActorError> {
        let Self {
            client,
            mut eventloop,
            subscriptions,
        } = self;
        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => return Err(ActorError::Cancelled),
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => forward(&subscriptions, publish),
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        tracing::info!("connected to mqtt broker");
                        tokio::spawn(renew(client.clone(), subscribed_topics(&subscriptions)));
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(error = %MqttError::from(err), "mqtt event loop error");
                        tokio::select! {
                            () = token.cancelled() => return Err(ActorError::Cancelled),
                            () = tokio::time::sleep(RETRY_DELAY) => {}
                        }
                    }
                },
            }
        }
    }
}

/// Hand `publish` to every matching subscription. A subscription whose
/// queue is full misses the message.
fn forward(subscriptions: &Subscriptions, publish: Publish) {
    let message = InboundMessage {
        topic: publish.topic,
        payload: publish.payload.to_vec(),
    };
    let mut subscriptions = subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
    subscriptions.retain(|subscription| !subscription.sender.is_closed());
    let mut delivered = false;
    for subscription in subscriptions
        .iter()
        .filter(|subscription| subscription.patterns.iter().any(|p| p.matches(&message.topic)))
    {
        delivered = true;
        match subscription.sender.try_send(message.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(topic = %message.topic, "mqtt subscription full, message dropped");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(topic = %message.topic, "mqtt subscription closed");
            }
        }
    }
    if !delivered {
        tracing::trace!(topic = %message.topic, "no subscription for mqtt message");
    }
}

fn subscribed_topics(subscriptions: &Subscriptions) -> Vec<String> {
    subscriptions
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .flat_map(|subscription| subscription.raw.iter().cloned())
        .collect()
}

/// Subscribe again to `topics`, waiting for room in the request queue.
async fn renew(client: AsyncClient, topics: Vec<String>) {
    for topic in topics {
        if let Err(err) = client.subscribe(topic.as_str(), QoS::AtLeastOnce).await {
            tracing::warn!(topic = %topic, error = %err, "failed to renew mqtt subscription");
        }
    }
}
