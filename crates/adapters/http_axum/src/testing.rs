//! Port fakes for the router tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use hearth_app::ports::{DeviceRepository, UnitOfWork};
use hearth_domain::device::Device;
use hearth_domain::entity::EntityState;
use hearth_domain::error::HubError;
use hearth_domain::id::{DeviceId, EntityId};

/// Read-only repository over a fixed set of devices.
pub struct StubDeviceRepo {
    devices: Vec<Device>,
}

impl StubDeviceRepo {
    pub fn new(devices: Vec<Device>) -> Self {
        Self { devices }
    }
}

impl DeviceRepository for StubDeviceRepo {
    type Work = ();

    fn insert(
        &self,
        _work: &mut Self::Work,
        device: Device,
    ) -> impl Future<Output = Result<Device, HubError>> + Send {
        async { Ok(device) }
    }

    fn select(
        &self,
        _work: &mut Self::Work,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, HubError>> + Send {
        let device = self.devices.iter().find(|device| device.id == id).cloned();
        async { Ok(device) }
    }

    fn select_all(
        &self,
        _work: &mut Self::Work,
    ) -> impl Future<Output = Result<Vec<Device>, HubError>> + Send {
        let devices = self.devices.clone();
        async { Ok(devices) }
    }

    fn select_by_identifier(
        &self,
        _work: &mut Self::Work,
        identifier: &str,
    ) -> impl Future<Output = Result<Option<Device>, HubError>> + Send {
        let device = self
            .devices
            .iter()
            .find(|device| device.identifier == identifier)
            .cloned();
        async { Ok(device) }
    }

    fn latest_states(
        &self,
        _work: &mut Self::Work,
        _ids: &[EntityId],
    ) -> impl Future<Output = Result<HashMap<EntityId, EntityState>, HubError>> + Send {
        async { Ok(HashMap::new()) }
    }

    fn insert_entity_states(
        &self,
        _work: &mut Self::Work,
        states: &[EntityState],
    ) -> impl Future<Output = Result<Vec<EntityState>, HubError>> + Send {
        let states = states.to_vec();
        async { Ok(states) }
    }
}

/// Unit of work that counts begins, commits and rollbacks.
#[derive(Default)]
pub struct CountingUnitOfWork {
    pub begun: AtomicUsize,
    pub committed: AtomicUsize,
    pub rolled_back: AtomicUsize,
    pub fail_begin: AtomicBool,
}

impl CountingUnitOfWork {
    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.begun.load(Ordering::SeqCst),
            self.committed.load(Ordering::SeqCst),
            self.rolled_back.load(Ordering::SeqCst),
        )
    }
}

impl UnitOfWork for CountingUnitOfWork {
    type Work = ();

    fn begin(&self) -> impl Future<Output = Result<Self::Work, HubError>> + Send {
        self.begun.fetch_add(1, Ordering::SeqCst);
        let fail = self.fail_begin.load(Ordering::SeqCst);
        async move {
            if fail {
                Err(HubError::internal("connection refused"))
            } else {
                Ok(())
            }
        }
    }

    fn commit(&self, _work: Self::Work) -> impl Future<Output = Result<(), HubError>> + Send {
        self.committed.fetch_add(1, Ordering::SeqCst);
        async { Ok(()) }
    }

    fn rollback(&self, _work: Self::Work) -> impl Future<Output = Result<(), HubError>> + Send {
        self.rolled_back.fetch_add(1, Ordering::SeqCst);
        async { Ok(()) }
    }
}
