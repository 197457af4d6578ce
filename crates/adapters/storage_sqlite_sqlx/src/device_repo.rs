//! `SQLite` implementation of [`DeviceRepository`].
//!
//! Every query runs on the transaction of the caller's unit of work.

use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Row, Sqlite, SqliteConnection, Transaction};

use hearth_app::ports::DeviceRepository;
use hearth_domain::device::{Connection, Device};
use hearth_domain::entity::{Entity, EntityKind, EntityState, StateValue};
use hearth_domain::error::HubError;
use hearth_domain::id::{DeviceId, EntityId};
use hearth_domain::time::{self, Timestamp};

use crate::error::StorageError;

fn decode_error(err: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}

fn decode_time(raw: &str) -> Result<Timestamp, sqlx::Error> {
    time::parse(raw).map_err(decode_error)
}

/// Wrapper for converting database rows into domain types without polluting
/// domain structs with database concerns.
struct Wrapper<T>(T);

impl<'r> FromRow<'r, SqliteRow> for Wrapper<Device> {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let connections: String = row.try_get("connections")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        let connections: Vec<Connection> =
            serde_json::from_str(&connections).map_err(decode_error)?;

        Ok(Self(Device {
            id: DeviceId::from_str(&id).map_err(decode_error)?,
            name: row.try_get("name")?,
            identifier: row.try_get("identifier")?,
            manufacturer: row.try_get("manufacturer")?,
            model: row.try_get("model")?,
            sw_version: row.try_get("sw_version")?,
            connections,
            entities: Vec::new(),
            created_at: Some(decode_time(&created_at)?),
            updated_at: Some(decode_time(&updated_at)?),
        }))
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper<Entity> {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let device_id: String = row.try_get("device_id")?;
        let kind: String = row.try_get("kind")?;
        let features: String = row.try_get("features")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(Self(Entity {
            id: EntityId::from_raw(id),
            name: row.try_get("name")?,
            kind: EntityKind::from_str(&kind).map_err(decode_error)?,
            module: row.try_get("module")?,
            features: serde_json::from_str(&features).map_err(decode_error)?,
            states: Vec::new(),
            device_id: Some(DeviceId::from_str(&device_id).map_err(decode_error)?),
            created_at: Some(decode_time(&created_at)?),
            updated_at: Some(decode_time(&updated_at)?),
        }))
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper<EntityState> {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let entity_id: String = row.try_get("entity_id")?;
        let value: String = row.try_get("value")?;
        let created_at: String = row.try_get("created_at")?;

        let value: StateValue = serde_json::from_str(&value).map_err(decode_error)?;

        Ok(Self(EntityState {
            entity_id: EntityId::from_raw(entity_id),
            value,
            created_at: Some(decode_time(&created_at)?),
        }))
    }
}

const INSERT_DEVICE: &str = r"
    INSERT INTO devices (id, identifier, name, manufacturer, model, sw_version, connections, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
";

const INSERT_ENTITY: &str = r"
    INSERT INTO entities (id, device_id, name, kind, module, features, position, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
";

const SELECT_DEVICE_BY_ID: &str = "SELECT * FROM devices WHERE id = ?";
const SELECT_DEVICE_BY_IDENTIFIER: &str = "SELECT * FROM devices WHERE identifier = ?";
const SELECT_ALL_DEVICES: &str = "SELECT * FROM devices ORDER BY created_at, identifier";
const SELECT_ENTITIES_BY_DEVICE: &str =
    "SELECT * FROM entities WHERE device_id = ? ORDER BY position";
const SELECT_ALL_ENTITIES: &str = "SELECT * FROM entities ORDER BY device_id, position";

const INSERT_STATES: &str = "INSERT INTO entity_states (entity_id, value, created_at) ";
const STATE_COLUMNS: usize = 3;

// Default SQLITE_MAX_VARIABLE_NUMBER of older SQLite builds; batches are
// split so no statement binds more.
const MAX_BIND_VARIABLES: usize = 999;

// Latest row per entity, resolved through the (entity_id, created_at DESC)
// index. The `IN (...)` list is appended by the caller.
const SELECT_LATEST_STATES: &str = r"
    SELECT s.entity_id, s.value, s.created_at FROM entity_states s
    WHERE s.seq = (
        SELECT l.seq FROM entity_states l
        WHERE l.entity_id = s.entity_id
        ORDER BY l.created_at DESC, l.seq DESC
        LIMIT 1
    )
    AND s.entity_id IN ";

/// `SQLite`-backed device repository.
///
/// Holds no connection of its own; the transaction comes with each call.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDeviceRepository;

impl SqliteDeviceRepository {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

async fn fetch_latest_states(
    conn: &mut SqliteConnection,
    ids: &[EntityId],
) -> Result<HashMap<EntityId, EntityState>, StorageError> {
    let mut latest = HashMap::with_capacity(ids.len());
    for chunk in ids.chunks(MAX_BIND_VARIABLES) {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_LATEST_STATES);
        query.push("(");
        let mut list = query.separated(", ");
        for id in chunk {
            list.push_bind(id.as_str().to_owned());
        }
        list.push_unseparated(")");
        let rows: Vec<Wrapper<EntityState>> = query.build_query_as().fetch_all(&mut *conn).await?;
        latest.extend(
            rows.into_iter()
                .map(|Wrapper(state)| (state.entity_id.clone(), state)),
        );
    }
    Ok(latest)
}

async fn append_states(
    conn: &mut SqliteConnection,
    states: &[EntityState],
    at: &Timestamp,
) -> Result<Vec<EntityState>, StorageError> {
    let mut rows = Vec::with_capacity(states.len());
    for state in states {
        rows.push((state.entity_id.as_str().to_owned(), serde_json::to_string(&state.value)?));
    }
    let created_at = time::to_sortable(at);
    for chunk in rows.chunks(MAX_BIND_VARIABLES / STATE_COLUMNS) {
        let mut query = QueryBuilder::<Sqlite>::new(INSERT_STATES);
        query.push_values(chunk, |mut row, (entity_id, value)| {
            row.push_bind(entity_id.clone())
                .push_bind(value.clone())
                .push_bind(created_at.clone());
        });
        query.build().execute(&mut *conn).await?;
    }

    Ok(states
        .iter()
        .cloned()
        .map(|state| EntityState {
            created_at: Some(*at),
            ..state
        })
        .collect())
}

/// Attach entities, and the latest state of each, to their devices.
async fn attach_entities(
    conn: &mut SqliteConnection,
    devices: &mut [Device],
    entities: Vec<Entity>,
) -> Result<(), StorageError> {
    let ids: Vec<EntityId> = entities.iter().map(|entity| entity.id.clone()).collect();
    let mut latest = fetch_latest_states(conn, &ids).await?;

    let mut by_device: HashMap<DeviceId, Vec<Entity>> = HashMap::new();
    for mut entity in entities {
        entity.states = latest.remove(&entity.id).into_iter().collect();
        if let Some(device_id) = entity.device_id {
            by_device.entry(device_id).or_default().push(entity);
        }
    }
    for device in devices {
        device.entities = by_device.remove(&device.id).unwrap_or_default();
    }
    Ok(())
}

async fn insert_device(conn: &mut SqliteConnection, mut device: Device) -> Result<Device, StorageError> {
    let at = time::now();
    let stamp = time::to_sortable(&at);
    device.created_at = Some(at);
    device.updated_at = Some(at);

    sqlx::query(INSERT_DEVICE)
        .bind(device.id.to_string())
        .bind(&device.identifier)
        .bind(&device.name)
        .bind(&device.manufacturer)
        .bind(&device.model)
        .bind(&device.sw_version)
        .bind(serde_json::to_string(&device.connections)?)
        .bind(&stamp)
        .bind(&stamp)
        .execute(&mut *conn)
        .await?;

    let mut initial = Vec::new();
    for (position, entity) in device.entities.iter_mut().enumerate() {
        entity.device_id = Some(device.id);
        entity.created_at = Some(at);
        entity.updated_at = Some(at);
        sqlx::query(INSERT_ENTITY)
            .bind(entity.id.as_str())
            .bind(device.id.to_string())
            .bind(&entity.name)
            .bind(entity.kind.as_str())
            .bind(&entity.module)
            .bind(serde_json::to_string(&entity.features)?)
            .bind(i64::try_from(position).unwrap_or(i64::MAX))
            .bind(&stamp)
            .bind(&stamp)
            .execute(&mut *conn)
            .await?;
        for state in &mut entity.states {
            state.entity_id = entity.id.clone();
            state.created_at = Some(at);
        }
        initial.extend(entity.states.iter().cloned());
    }
    append_states(conn, &initial, &at).await?;

    Ok(device)
}

impl DeviceRepository for SqliteDeviceRepository {
    type Work = Transaction<'static, Sqlite>;

    fn insert(
        &self,
        work: &mut Self::Work,
        device: Device,
    ) -> impl Future<Output = Result<Device, HubError>> + Send {
        async move { Ok(insert_device(&mut **work, device).await?) }
    }

    fn select(
        &self,
        work: &mut Self::Work,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, HubError>> + Send {
        async move {
            let conn: &mut SqliteConnection = work;
            let row: Option<Wrapper<Device>> = sqlx::query_as(SELECT_DEVICE_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&mut *conn)
                .await
                .map_err(StorageError::from)?;
            let Some(Wrapper(device)) = row else {
                return Ok(None);
            };
            let entities: Vec<Wrapper<Entity>> = sqlx::query_as(SELECT_ENTITIES_BY_DEVICE)
                .bind(id.to_string())
                .fetch_all(&mut *conn)
                .await
                .map_err(StorageError::from)?;
            let mut devices = [device];
            attach_entities(conn, &mut devices, entities.into_iter().map(|w| w.0).collect()).await?;
            let [device] = devices;
            Ok(Some(device))
        }
    }

    fn select_all(
        &self,
        work: &mut Self::Work,
    ) -> impl Future<Output = Result<Vec<Device>, HubError>> + Send {
        async move {
            let conn: &mut SqliteConnection = work;
            let rows: Vec<Wrapper<Device>> = sqlx::query_as(SELECT_ALL_DEVICES)
                .fetch_all(&mut *conn)
                .await
                .map_err(StorageError::from)?;
            let entities: Vec<Wrapper<Entity>> = sqlx::query_as(SELECT_ALL_ENTITIES)
                .fetch_all(&mut *conn)
                .await
                .map_err(StorageError::from)?;
            let mut devices: Vec<Device> = rows.into_iter().map(|w| w.0).collect();
            attach_entities(conn, &mut devices, entities.into_iter().map(|w| w.0).collect()).await?;
            Ok(devices)
        }
    }

    fn select_by_identifier(
        &self,
        work: &mut Self::Work,
        identifier: &str,
    ) -> impl Future<Output = Result<Option<Device>, HubError>> + Send {
        async move {
            let row: Option<Wrapper<Device>> = sqlx::query_as(SELECT_DEVICE_BY_IDENTIFIER)
                .bind(identifier)
                .fetch_optional(&mut **work)
                .await
                .map_err(StorageError::from)?;
            Ok(row.map(|w| w.0))
        }
    }

    fn latest_states(
        &self,
        work: &mut Self::Work,
        ids: &[EntityId],
    ) -> impl Future<Output = Result<HashMap<EntityId, EntityState>, HubError>> + Send {
        async move { Ok(fetch_latest_states(&mut **work, ids).await?) }
    }

    fn insert_entity_states(
        &self,
        work: &mut Self::Work,
        states: &[EntityState],
    ) -> impl Future<Output = Result<Vec<EntityState>, HubError>> + Send {
        async move { Ok(append_states(&mut **work, states, &time::now()).await?) }
    }
}
