//! Handler sets wiring the device registry to the bus and to sessions.
//!
//! Bus handlers react to adapters announcing devices and state changes;
//! session handlers answer UI clients. Both run every call inside its own
//! unit of work.

use std::sync::Arc;

use hearth_domain::device::Device;
use hearth_domain::entity::EntityState;
use hearth_domain::error::HubError;
use hearth_domain::event::{Event, topic};

use crate::bus::{Handler, MessageBus, error_logger, handler, unit_of_work};
use crate::ports::{Broadcaster, BusTransport, DeviceRepository, UnitOfWork};
use crate::scope::Scope;
use crate::services::{DeviceService, Discovery};
use crate::session::{Response, Session, SessionHandler, SessionRouter, session_handler, session_unit_of_work};

/// Session topic answering with every registered device.
pub const DEVICES_LIST: &str = "devices/list";
/// Topic of the frame pushed to sessions when a new device shows up.
pub const DEVICES_DISCOVERED: &str = "devices/discovered";

/// Attach the device registry handlers to `bus`.
///
/// # Errors
///
/// Returns [`HubError::Invalid`] if a topic cannot be registered.
pub fn register_bus_handlers<T, R, U, B>(
    bus: &mut MessageBus<T, R::Work>,
    service: &Arc<DeviceService<R>>,
    uow: &Arc<U>,
    broadcaster: &Arc<B>,
) -> Result<(), HubError>
where
    T: BusTransport + 'static,
    R: DeviceRepository + 'static,
    U: UnitOfWork<Work = R::Work> + 'static,
    B: Broadcaster + 'static,
{
    let middlewares = [unit_of_work(Arc::clone(uow)), error_logger()];
    bus.handle(
        topic::DEVICE_DISCOVERED,
        device_discovered(Arc::clone(service), Arc::clone(broadcaster)),
        &middlewares,
    )?;
    bus.handle(
        topic::ENTITY_STATE_UPDATE,
        entity_state_update(Arc::clone(service)),
        &middlewares,
    )?;
    Ok(())
}

/// Attach the device registry handlers to `router`.
pub fn register_session_handlers<R, U>(
    router: &mut SessionRouter<R::Work>,
    service: &Arc<DeviceService<R>>,
    uow: &Arc<U>,
) where
    R: DeviceRepository + 'static,
    U: UnitOfWork<Work = R::Work> + 'static,
{
    router.handle(
        DEVICES_LIST,
        list_devices(Arc::clone(service)),
        &[session_unit_of_work(Arc::clone(uow))],
    );
}

fn device_discovered<R, B>(service: Arc<DeviceService<R>>, broadcaster: Arc<B>) -> Handler<R::Work>
where
    R: DeviceRepository + 'static,
    B: Broadcaster + 'static,
{
    handler(move |scope: Scope<R::Work>, event: Event, _| {
        let service = Arc::clone(&service);
        let broadcaster = Arc::clone(&broadcaster);
        async move {
            let device: Device = event.payload()?;
            let device = match service.discover(&scope, device).await? {
                Discovery::Registered(device) => device,
                Discovery::Known(device) => {
                    tracing::debug!(identifier = %device.identifier, "device already registered");
                    return Ok(());
                }
            };
            let value = serde_json::to_value(&device)
                .map_err(|err| HubError::internal_from("failed to encode device", err))?;
            if let Err(err) = broadcaster.broadcast(Response::broadcast(DEVICES_DISCOVERED, value)).await {
                tracing::warn!(error = %err, "failed to announce discovered device");
            }
            Ok(())
        }
    })
}

fn entity_state_update<R>(service: Arc<DeviceService<R>>) -> Handler<R::Work>
where
    R: DeviceRepository + 'static,
{
    handler(move |scope: Scope<R::Work>, event: Event, _| {
        let service = Arc::clone(&service);
        async move {
            let states: Vec<EntityState> = event.payload()?;
            let stored = service.add_entity_states(&scope, states).await?;
            tracing::debug!(stored = stored.len(), "entity states updated");
            Ok(())
        }
    })
}

fn list_devices<R>(service: Arc<DeviceService<R>>) -> SessionHandler<R::Work>
where
    R: DeviceRepository + 'static,
{
    session_handler(move |session: Session<R::Work>| {
        let service = Arc::clone(&service);
        async move {
            let devices = service.list(session.scope()).await?;
            session.json(&devices).await
        }
    })
}
