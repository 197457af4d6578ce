//! # hearthd: hearth daemon
//!
//! Composition root that wires all adapters together and runs the hub.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars) and initialise tracing
//! - Initialize the `SQLite` connection pool and run migrations
//! - Connect the message bus to the MQTT broker and register its handlers
//! - Build the session router and the axum router on top of the same
//!   services
//! - Run the bus listener, the broker event loop, the HTTP server and the
//!   heartbeat ticker as one group of actors, stopped together on the first
//!   failure or on SIGTERM/SIGINT
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer: no domain logic belongs here.

mod config;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use hearth_adapter_http_axum::router;
use hearth_adapter_http_axum::state::AppState;
use hearth_adapter_mqtt::MqttTransport;
use hearth_app::bus::MessageBus;
use hearth_app::handlers::{register_bus_handlers, register_session_handlers};
use hearth_app::ports::EventPublisher;
use hearth_app::runtime::{ActorError, Module, Ticker};
use hearth_app::services::DeviceService;
use hearth_app::session::{SessionHub, SessionRouter, session_logger};
use hearth_domain::error::HubError;
use hearth_domain::event::{Event, topic};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Storage
    let db = config.storage().build().await?;
    let uow = Arc::new(db.unit_of_work());
    let device_service = Arc::new(DeviceService::new(db.device_repository()));

    // Sessions
    let hub = Arc::new(SessionHub::new());
    let mut sessions = SessionRouter::new(Arc::clone(&hub));
    sessions.layer(session_logger());
    register_session_handlers(&mut sessions, &device_service, &uow);

    // Bus
    let (transport, eventloop) = MqttTransport::new(&config.mqtt);
    let transport = Arc::new(transport);
    let mut bus = MessageBus::new(Arc::clone(&transport));
    register_bus_handlers(&mut bus, &device_service, &uow, &hub)?;
    let bus = Arc::new(bus);

    // HTTP
    let state = AppState::new(device_service, uow, Arc::new(sessions));
    let app = router::build(state);
    let listener = TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(address = %config.bind_addr(), "hearthd listening");

    let mut module = Module::new("hearthd");

    let listening = Arc::clone(&bus);
    module.add(move |token| async move { listening.execute(token).await }, |_| {});

    let client = Arc::clone(&transport);
    module.add(move |token| eventloop.run(token), move |_| client.disconnect());

    module.add(
        move |token| async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
                .map_err(|err| HubError::internal_from("http server failed", err))?;
            Err(ActorError::Cancelled)
        },
        |_| {},
    );

    if let Some(period) = config.heartbeat_period() {
        let publisher = bus.publisher();
        module.add(
            move |token| {
                Ticker::new("heartbeat", period).run(token, move || {
                    let publisher = publisher.clone();
                    async move { publisher.publish(Event::new(topic::HEARTBEAT)).await }
                })
            },
            |_| {},
        );
    }

    module.run(&CancellationToken::new()).await?;
    Ok(())
}
