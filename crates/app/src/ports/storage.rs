//! Storage port: repository trait for the device registry.
//!
//! Every method runs inside the unit of work of the calling request or
//! message, passed explicitly as `work`.

use std::collections::HashMap;
use std::future::Future;

use hearth_domain::device::Device;
use hearth_domain::entity::EntityState;
use hearth_domain::error::HubError;
use hearth_domain::id::{DeviceId, EntityId};

/// Repository for [`Device`]s, their entities and the entity state history.
pub trait DeviceRepository: Send + Sync {
    /// Handle of the unit of work the queries run in.
    type Work: Send + 'static;

    /// Persist a new device together with its entities and their initial
    /// states. Returns the device as stored, timestamps included.
    fn insert(
        &self,
        work: &mut Self::Work,
        device: Device,
    ) -> impl Future<Output = Result<Device, HubError>> + Send;

    /// Get a device, its entities and each entity's latest state.
    fn select(
        &self,
        work: &mut Self::Work,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, HubError>> + Send;

    /// Get every device, shaped as in [`select`](Self::select).
    fn select_all(
        &self,
        work: &mut Self::Work,
    ) -> impl Future<Output = Result<Vec<Device>, HubError>> + Send;

    /// Find a device by its adapter-supplied identifier.
    fn select_by_identifier(
        &self,
        work: &mut Self::Work,
        identifier: &str,
    ) -> impl Future<Output = Result<Option<Device>, HubError>> + Send;

    /// Most recently created state of each entity in `ids`. Entities without
    /// any state are absent from the map.
    fn latest_states(
        &self,
        work: &mut Self::Work,
        ids: &[EntityId],
    ) -> impl Future<Output = Result<HashMap<EntityId, EntityState>, HubError>> + Send;

    /// Append states to the history in one statement.
    ///
    /// Fails with [`HubError::NotFound`] when a state references an entity
    /// that does not exist.
    fn insert_entity_states(
        &self,
        work: &mut Self::Work,
        states: &[EntityState],
    ) -> impl Future<Output = Result<Vec<EntityState>, HubError>> + Send;
}

impl<T: DeviceRepository> DeviceRepository for std::sync::Arc<T> {
    type Work = T::Work;

    fn insert(
        &self,
        work: &mut Self::Work,
        device: Device,
    ) -> impl Future<Output = Result<Device, HubError>> + Send {
        (**self).insert(work, device)
    }

    fn select(
        &self,
        work: &mut Self::Work,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, HubError>> + Send {
        (**self).select(work, id)
    }

    fn select_all(
        &self,
        work: &mut Self::Work,
    ) -> impl Future<Output = Result<Vec<Device>, HubError>> + Send {
        (**self).select_all(work)
    }

    fn select_by_identifier(
        &self,
        work: &mut Self::Work,
        identifier: &str,
    ) -> impl Future<Output = Result<Option<Device>, HubError>> + Send {
        (**self).select_by_identifier(work, identifier)
    }

    fn latest_states(
        &self,
        work: &mut Self::Work,
        ids: &[EntityId],
    ) -> impl Future<Output = Result<HashMap<EntityId, EntityState>, HubError>> + Send {
        (**self).latest_states(work, ids)
    }

    fn insert_entity_states(
        &self,
        work: &mut Self::Work,
        states: &[EntityState],
    ) -> impl Future<Output = Result<Vec<EntityState>, HubError>> + Send {
        (**self).insert_entity_states(work, states)
    }
}
