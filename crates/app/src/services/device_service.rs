//! Device service: the device registry use-cases.

use hearth_domain::device::Device;
use hearth_domain::entity::EntityState;
use hearth_domain::error::HubError;
use hearth_domain::id::DeviceId;

use crate::ports::DeviceRepository;
use crate::reconciler::StateReconciler;
use crate::scope::Scope;

/// Outcome of [`DeviceService::discover`].
#[derive(Debug)]
pub enum Discovery {
    /// The device was unknown and is now registered.
    Registered(Device),
    /// A device with the same identifier is already registered.
    Known(Device),
}

/// Application service for registering devices and recording the state of
/// their entities.
pub struct DeviceService<R> {
    repo: R,
}

impl<R: DeviceRepository> DeviceService<R> {
    /// Create a new service backed by the given repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Register a newly discovered device with its entities.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Invalid`] if the device fails validation,
    /// [`HubError::Conflict`] if a device with the same identifier is
    /// already registered, or a storage error from the repository.
    pub async fn add(&self, scope: &Scope<R::Work>, device: Device) -> Result<Device, HubError> {
        match self.discover(scope, device).await? {
            Discovery::Registered(device) => Ok(device),
            Discovery::Known(device) => Err(HubError::Conflict(format!(
                "device with identifier ({}) already exist",
                device.identifier
            ))),
        }
    }

    /// Register `device` unless its identifier is already known.
    ///
    /// Only the identifier makes a device known: any other conflict, such as
    /// an entity id already owned by another device, is returned as an error
    /// so the unit of work rolls back.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Invalid`] if the device fails validation, or the
    /// storage error raised while inserting it.
    #[tracing::instrument(skip(self, scope, device), fields(identifier = %device.identifier))]
    pub async fn discover(&self, scope: &Scope<R::Work>, device: Device) -> Result<Discovery, HubError> {
        device.validate()?;
        let mut work = scope.work().await?;
        if let Some(known) = self
            .repo
            .select_by_identifier(&mut *work, &device.identifier)
            .await?
        {
            return Ok(Discovery::Known(known));
        }
        let device = self.repo.insert(&mut *work, device).await?;
        tracing::info!(device = %device.id, entities = device.entities.len(), "device registered");
        Ok(Discovery::Registered(device))
    }

    /// Look up a device by id.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when no device with `id` exists, or a
    /// storage error from the repository.
    #[tracing::instrument(skip(self, scope))]
    pub async fn get(&self, scope: &Scope<R::Work>, id: DeviceId) -> Result<Device, HubError> {
        let mut work = scope.work().await?;
        self.repo
            .select(&mut *work, id)
            .await?
            .ok_or_else(|| HubError::NotFound(format!("device with id ({id}) was not found")))
    }

    /// List every device with the latest state of each entity.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list(&self, scope: &Scope<R::Work>) -> Result<Vec<Device>, HubError> {
        let mut work = scope.work().await?;
        self.repo.select_all(&mut *work).await
    }

    /// Reconcile `states` against the history and append what changed.
    ///
    /// Returns the states actually persisted, which is empty when every
    /// candidate was a repeat of the latest known value.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Invalid`] when a state targets an unknown entity
    /// or cannot be merged, or a storage error from the repository.
    #[tracing::instrument(skip(self, scope, states), fields(states = states.len()))]
    pub async fn add_entity_states(
        &self,
        scope: &Scope<R::Work>,
        states: Vec<EntityState>,
    ) -> Result<Vec<EntityState>, HubError> {
        let mut work = scope.work().await?;
        let states = StateReconciler::new(&self.repo)
            .reconcile(&mut *work, states)
            .await?;
        if states.is_empty() {
            return Ok(states);
        }
        self.repo
            .insert_entity_states(&mut *work, &states)
            .await
            .map_err(|err| match err {
                HubError::NotFound(_) => {
                    HubError::Invalid("cannot add states to entities that does not exist".into())
                }
                other => other,
            })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use hearth_domain::entity::{Entity, LightFeature, StateValue};
    use hearth_domain::id::EntityId;

    use super::*;
    use crate::scope::with_unit_of_work;
    use crate::services::testing::{InMemoryDeviceRepo, NoopUnitOfWork};

    fn make_service() -> DeviceService<InMemoryDeviceRepo> {
        DeviceService::new(InMemoryDeviceRepo::default())
    }

    fn shelly() -> Device {
        Device::builder()
            .identifier("shelly-1")
            .name("Shelly 1")
            .manufacturer("Allterco")
            .entity(Entity::light("Kitchen Light", "shelly", [LightFeature::Brightness]))
            .build()
            .unwrap()
    }

    fn kitchen_light() -> EntityId {
        EntityId::derive("light", "Kitchen Light")
    }

    /// Run `f` the way every transport does: inside a unit of work.
    async fn scoped<F, Fut, T>(f: F) -> Result<T, HubError>
    where
        F: FnOnce(Scope<()>) -> Fut,
        Fut: std::future::Future<Output = Result<T, HubError>>,
    {
        with_unit_of_work(&NoopUnitOfWork, &Scope::new(), f).await
    }

    #[tokio::test]
    async fn should_add_device_when_identifier_is_new() {
        let svc = make_service();
        let device = shelly();
        let id = device.id;

        let added = scoped(|scope| async move { svc.add(&scope, device).await }).await;
        let added = added.unwrap();
        assert_eq!(added.id, id);
        assert!(added.created_at.is_some());
    }

    #[tokio::test]
    async fn should_return_conflict_when_identifier_already_registered() {
        let svc = make_service();
        let scope = Scope::new();

        let result = with_unit_of_work(&NoopUnitOfWork, &scope, |scope| async move {
            svc.add(&scope, shelly()).await?;
            svc.add(&scope, shelly()).await
        })
        .await;

        match result {
            Err(HubError::Conflict(message)) => {
                assert_eq!(message, "device with identifier (shelly-1) already exist");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn should_report_known_device_when_identifier_already_registered() {
        let svc = make_service();

        let outcome = scoped(|scope| async move {
            let first = svc.discover(&scope, shelly()).await?;
            let second = svc.discover(&scope, shelly()).await?;
            Ok((first, second))
        })
        .await;

        let (first, second) = outcome.unwrap();
        assert!(matches!(first, Discovery::Registered(_)));
        match second {
            Discovery::Known(device) => assert_eq!(device.identifier, "shelly-1"),
            other => panic!("expected known device, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn should_fail_discovery_when_entity_belongs_to_another_device() {
        let svc = make_service();
        let mut twin = shelly();
        twin.identifier = "shelly-2".into();

        let result = scoped(|scope| async move {
            svc.discover(&scope, shelly()).await?;
            svc.discover(&scope, twin).await
        })
        .await;

        assert!(matches!(result, Err(HubError::Conflict(_))));
    }

    #[tokio::test]
    async fn should_reject_device_without_identifier() {
        let svc = make_service();
        let mut device = shelly();
        device.identifier = String::new();

        let result = scoped(|scope| async move { svc.add(&scope, device).await }).await;
        assert!(matches!(result, Err(HubError::Invalid(_))));
    }

    #[tokio::test]
    async fn should_return_not_found_when_device_missing() {
        let svc = make_service();
        let result = scoped(|scope| async move { svc.get(&scope, DeviceId::new()).await }).await;
        assert!(matches!(result, Err(HubError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_fail_outside_unit_of_work() {
        let svc = make_service();
        let result = svc.list(&Scope::new()).await;
        assert!(matches!(result, Err(HubError::Internal { .. })));
    }

    #[tokio::test]
    async fn should_persist_one_row_for_repeated_observation() {
        let svc = make_service();
        let light = kitchen_light();

        let outcome = scoped(|scope| async move {
            svc.add(&scope, shelly()).await?;
            let first = svc
                .add_entity_states(&scope, vec![EntityState::new(light.clone(), json!({"brightness": 80}))])
                .await?;
            let second = svc
                .add_entity_states(&scope, vec![EntityState::new(light.clone(), json!({"brightness": 80}))])
                .await?;
            let device = svc.list(&scope).await?.remove(0);
            Ok((first, second, device))
        })
        .await;
        let (first, second, device) = outcome.unwrap();

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        let latest = device.entities[0].latest_state().unwrap();
        assert_eq!(latest.value, StateValue::from(json!({"brightness": 80})));
    }

    #[tokio::test]
    async fn should_store_merged_value_for_partial_update() {
        let svc = make_service();
        let light = kitchen_light();

        let stored = scoped(|scope| async move {
            svc.add(&scope, shelly()).await?;
            svc.add_entity_states(
                &scope,
                vec![EntityState::new(light.clone(), json!({"brightness": 10, "mode": "white"}))],
            )
            .await?;
            svc.add_entity_states(&scope, vec![EntityState::new(light, json!({"brightness": 55}))])
                .await
        })
        .await
        .unwrap();

        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].value, StateValue::from(json!({"brightness": 55, "mode": "white"})));
    }

    #[tokio::test]
    async fn should_return_invalid_when_entity_does_not_exist() {
        let svc = make_service();
        let result = scoped(|scope| async move {
            svc.add_entity_states(
                &scope,
                vec![EntityState::new(EntityId::from_raw("light.ghost"), json!({"is_on": true}))],
            )
            .await
        })
        .await;

        match result {
            Err(HubError::Invalid(message)) => {
                assert_eq!(message, "cannot add states to entities that does not exist");
            }
            other => panic!("expected invalid, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn should_return_empty_when_no_states_given() {
        let svc = make_service();
        let stored = scoped(|scope| async move { svc.add_entity_states(&scope, Vec::new()).await })
            .await
            .unwrap();
        assert!(stored.is_empty());
    }
}
