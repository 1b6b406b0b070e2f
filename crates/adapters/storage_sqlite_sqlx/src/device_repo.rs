//! `SQLite` implementation of [`DeviceRepository`].

use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use fleethub_app::ports::DeviceRepository;
use fleethub_domain::device::{Device, DeviceKind, DeviceStatus, PowerState, SensorSnapshot};
use fleethub_domain::error::FleetError;
use fleethub_domain::id::DeviceId;
use fleethub_domain::time::from_millis;

use crate::error::StorageError;

/// Wrapper for converting database rows into domain [`Device`].
struct Wrapper(Device);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Device> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let name: String = row.try_get("name")?;
        let kind: String = row.try_get("kind")?;
        let status: String = row.try_get("status")?;
        let temperature: f64 = row.try_get("temperature")?;
        let humidity: f64 = row.try_get("humidity")?;
        let power: String = row.try_get("power")?;
        let last_update: i64 = row.try_get("last_update")?;

        let id = DeviceId::from_str(&id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let kind =
            DeviceKind::from_str(&kind).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let status =
            DeviceStatus::from_str(&status).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let power =
            PowerState::from_str(&power).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let last_update =
            from_millis(last_update).ok_or_else(|| sqlx::Error::Decode("last_update out of range".into()))?;

        Ok(Self(Device {
            id,
            name,
            kind,
            status,
            last_update,
            data: SensorSnapshot {
                temperature,
                humidity,
                power,
            },
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO devices (id, name, kind, status, temperature, humidity, power, last_update)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
";
const SELECT_BY_ID: &str = "SELECT * FROM devices WHERE id = ?";
const SELECT_ALL: &str = "SELECT * FROM devices ORDER BY name";
const UPDATE: &str = r"
    UPDATE devices
    SET name = ?, kind = ?, status = ?, temperature = ?, humidity = ?, power = ?, last_update = ?
    WHERE id = ?
";
const DELETE_BY_ID: &str = "DELETE FROM devices WHERE id = ?";

/// `SQLite`-backed device repository.
pub struct SqliteDeviceRepository {
    pool: SqlitePool,
}

impl SqliteDeviceRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl DeviceRepository for SqliteDeviceRepository {
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, FleetError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(INSERT)
                .bind(device.id.to_string())
                .bind(&device.name)
                .bind(device.kind.to_string())
                .bind(device.status.to_string())
                .bind(device.data.temperature)
                .bind(device.data.humidity)
                .bind(device.data.power.to_string())
                .bind(device.last_update.timestamp_millis())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(device)
        }
    }

    fn get_by_id(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, FleetError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, FleetError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn update(&self, device: Device) -> impl Future<Output = Result<Device, FleetError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(UPDATE)
                .bind(&device.name)
                .bind(device.kind.to_string())
                .bind(device.status.to_string())
                .bind(device.data.temperature)
                .bind(device.data.humidity)
                .bind(device.data.power.to_string())
                .bind(device.last_update.timestamp_millis())
                .bind(device.id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(device)
        }
    }

    fn delete(&self, id: DeviceId) -> impl Future<Output = Result<bool, FleetError>> + Send {
        let pool = self.pool.clone();
        async move {
            let result = sqlx::query(DELETE_BY_ID)
                .bind(id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(result.rows_affected() > 0)
        }
    }
}
