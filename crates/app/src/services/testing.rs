//! In-memory repository used by the service and handler tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use hearth_domain::device::Device;
use hearth_domain::entity::EntityState;
use hearth_domain::error::HubError;
use hearth_domain::id::{DeviceId, EntityId};
use hearth_domain::time::now;

use crate::ports::{DeviceRepository, UnitOfWork};

#[derive(Default)]
pub struct InMemoryDeviceRepo {
    devices: Mutex<HashMap<DeviceId, Device>>,
    history: Mutex<Vec<EntityState>>,
}

impl InMemoryDeviceRepo {
    /// Every persisted state, oldest first.
    pub fn history(&self) -> Vec<EntityState> {
        self.history.lock().unwrap().clone()
    }

    fn entity_exists(&self, id: &EntityId) -> bool {
        self.devices
            .lock()
            .unwrap()
            .values()
            .any(|device| device.entities.iter().any(|entity| &entity.id == id))
    }

    fn latest(&self, id: &EntityId) -> Option<EntityState> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|state| &state.entity_id == id)
            .cloned()
    }

    fn store(&self, mut device: Device) -> Device {
        let at = now();
        device.created_at = Some(at);
        device.updated_at = Some(at);
        {
            let mut history = self.history.lock().unwrap();
            for entity in &mut device.entities {
                entity.device_id = Some(device.id);
                for state in &mut entity.states {
                    state.created_at = Some(at);
                    history.push(state.clone());
                }
            }
        }
        self.devices.lock().unwrap().insert(device.id, device.clone());
        device
    }

    fn with_latest_states(&self, mut device: Device) -> Device {
        for entity in &mut device.entities {
            entity.states = self.latest(&entity.id).into_iter().collect();
        }
        device
    }
}

impl DeviceRepository for InMemoryDeviceRepo {
    type Work = ();

    fn insert(
        &self,
        _work: &mut Self::Work,
        device: Device,
    ) -> impl Future<Output = Result<Device, HubError>> + Send {
        let taken = device
            .entities
            .iter()
            .find(|entity| self.entity_exists(&entity.id))
            .map(|entity| entity.id.clone());
        let result = match taken {
            Some(id) => Err(HubError::Conflict(format!("entities.id ({id}) already exist"))),
            None => Ok(self.store(device)),
        };
        async { result }
    }

    fn select(
        &self,
        _work: &mut Self::Work,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, HubError>> + Send {
        let device = self.devices.lock().unwrap().get(&id).cloned();
        let result = device.map(|device| self.with_latest_states(device));
        async { Ok(result) }
    }

    fn select_all(
        &self,
        _work: &mut Self::Work,
    ) -> impl Future<Output = Result<Vec<Device>, HubError>> + Send {
        let devices: Vec<Device> = self.devices.lock().unwrap().values().cloned().collect();
        let result = devices
            .into_iter()
            .map(|device| self.with_latest_states(device))
            .collect();
        async { Ok(result) }
    }

    fn select_by_identifier(
        &self,
        _work: &mut Self::Work,
        identifier: &str,
    ) -> impl Future<Output = Result<Option<Device>, HubError>> + Send {
        let result = self
            .devices
            .lock()
            .unwrap()
            .values()
            .find(|device| device.identifier == identifier)
            .cloned();
        async { Ok(result) }
    }

    fn latest_states(
        &self,
        _work: &mut Self::Work,
        ids: &[EntityId],
    ) -> impl Future<Output = Result<HashMap<EntityId, EntityState>, HubError>> + Send {
        let result = ids
            .iter()
            .filter_map(|id| self.latest(id).map(|state| (id.clone(), state)))
            .collect();
        async { Ok(result) }
    }

    fn insert_entity_states(
        &self,
        _work: &mut Self::Work,
        states: &[EntityState],
    ) -> impl Future<Output = Result<Vec<EntityState>, HubError>> + Send {
        let result = if let Some(missing) = states.iter().find(|s| !self.entity_exists(&s.entity_id)) {
            Err(HubError::NotFound(format!("entity ({}) does not exist", missing.entity_id)))
        } else {
            let at = now();
            let stored: Vec<EntityState> = states
                .iter()
                .cloned()
                .map(|mut state| {
                    state.created_at = Some(at);
                    state
                })
                .collect();
            self.history.lock().unwrap().extend(stored.iter().cloned());
            Ok(stored)
        };
        async { result }
    }
}

/// Unit of work for [`InMemoryDeviceRepo`], which needs no handle.
#[derive(Default)]
pub struct NoopUnitOfWork;

impl UnitOfWork for NoopUnitOfWork {
    type Work = ();

    fn begin(&self) -> impl Future<Output = Result<Self::Work, HubError>> + Send {
        async { Ok(()) }
    }

    fn commit(&self, _work: Self::Work) -> impl Future<Output = Result<(), HubError>> + Send {
        async { Ok(()) }
    }

    fn rollback(&self, _work: Self::Work) -> impl Future<Output = Result<(), HubError>> + Send {
        async { Ok(()) }
    }
}
