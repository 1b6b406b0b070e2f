//! `SQLite` implementation of [`HistoryRepository`].
//!
//! The windowed query selects the newest entries first (so the limit trims
//! the oldest ones) and reverses in memory to hand back ascending order.
//! The `seq` column breaks timestamp ties by insertion order.

use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use fleethub_app::ports::HistoryRepository;
use fleethub_domain::device::PowerState;
use fleethub_domain::error::FleetError;
use fleethub_domain::history::HistoryEntry;
use fleethub_domain::id::{DeviceId, HistoryEntryId};
use fleethub_domain::time::{Timestamp, from_millis};

use crate::error::StorageError;

/// Wrapper for converting database rows into domain [`HistoryEntry`].
struct Wrapper(HistoryEntry);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let device_id: String = row.try_get("device_id")?;
        let timestamp: i64 = row.try_get("timestamp")?;
        let temperature: f64 = row.try_get("temperature")?;
        let humidity: f64 = row.try_get("humidity")?;
        let power: String = row.try_get("power")?;

        let id =
            HistoryEntryId::from_str(&id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let device_id =
            DeviceId::from_str(&device_id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let timestamp = from_millis(timestamp)
            .ok_or_else(|| sqlx::Error::Decode("timestamp out of range".into()))?;
        let power =
            PowerState::from_str(&power).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(HistoryEntry {
            id,
            device_id,
            timestamp,
            temperature,
            humidity,
            power,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO history (id, device_id, timestamp, temperature, humidity, power)
    VALUES (?, ?, ?, ?, ?, ?)
";

const SELECT_NEWEST_IN_RANGE: &str = r"
    SELECT id, device_id, timestamp, temperature, humidity, power FROM history
    WHERE device_id = ? AND timestamp >= ? AND timestamp <= ?
    ORDER BY timestamp DESC, seq DESC
    LIMIT ?
";

const SELECT_LATEST: &str = r"
    SELECT id, device_id, timestamp, temperature, humidity, power FROM history
    WHERE device_id = ?
    ORDER BY timestamp DESC, seq DESC
    LIMIT 1
";

/// `SQLite`-backed history repository.
pub struct SqliteHistoryRepository {
    pool: SqlitePool,
}

impl SqliteHistoryRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl HistoryRepository for SqliteHistoryRepository {
    fn append(
        &self,
        entry: HistoryEntry,
    ) -> impl Future<Output = Result<HistoryEntry, FleetError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(INSERT)
                .bind(entry.id.to_string())
                .bind(entry.device_id.to_string())
                .bind(entry.timestamp.timestamp_millis())
                .bind(entry.temperature)
                .bind(entry.humidity)
                .bind(entry.power.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(entry)
        }
    }

    fn find_in_range(
        &self,
        device_id: DeviceId,
        from: Timestamp,
        to: Timestamp,
        newest: usize,
    ) -> impl Future<Output = Result<Vec<HistoryEntry>, FleetError>> + Send {
        let pool = self.pool.clone();
        async move {
            let limit = i64::try_from(newest).unwrap_or(i64::MAX);
            let mut rows: Vec<Wrapper> = sqlx::query_as(SELECT_NEWEST_IN_RANGE)
                .bind(device_id.to_string())
                .bind(from.timestamp_millis())
                .bind(to.timestamp_millis())
                .bind(limit)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            rows.reverse();
            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn latest(
        &self,
        device_id: DeviceId,
    ) -> impl Future<Output = Result<Option<HistoryEntry>, FleetError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_LATEST)
                .bind(device_id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|w| w.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use chrono::Duration;
    use fleethub_domain::device::SensorSnapshot;
    use fleethub_domain::time::now;

    async fn make_repo() -> SqliteHistoryRepository {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteHistoryRepository::new(db.pool().clone())
    }

    fn entry(device_id: DeviceId, temperature: f64, timestamp: Timestamp) -> HistoryEntry {
        HistoryEntry::new(
            device_id,
            SensorSnapshot {
                temperature,
                humidity: 45.0,
                power: PowerState::On,
            },
            timestamp,
        )
    }

    #[tokio::test]
    async fn should_return_window_in_ascending_order() {
        let repo = make_repo().await;
        let device_id = DeviceId::new();
        let base = now();

        let old = repo
            .append(entry(device_id, 20.0, base - Duration::minutes(2)))
            .await
            .unwrap();
        let new = repo
            .append(entry(device_id, 21.0, base))
            .await
            .unwrap();

        let window = repo
            .find_in_range(device_id, base - Duration::hours(1), base, 100)
            .await
            .unwrap();

        assert_eq!(window.len(), 2);
        assert_eq!(window[0].id, old.id);
        assert_eq!(window[1].id, new.id);
    }

    #[tokio::test]
    async fn should_trim_oldest_entries_when_limited() {
        let repo = make_repo().await;
        let device_id = DeviceId::new();
        let base = now();

        repo.append(entry(device_id, 20.0, base - Duration::minutes(1)))
            .await
            .unwrap();
        let newest = repo.append(entry(device_id, 21.0, base)).await.unwrap();

        let window = repo
            .find_in_range(device_id, base - Duration::hours(1), base, 1)
            .await
            .unwrap();

        assert_eq!(window.len(), 1);
        assert_eq!(window[0].id, newest.id);
    }

    #[tokio::test]
    async fn should_break_timestamp_ties_by_insertion_order() {
        let repo = make_repo().await;
        let device_id = DeviceId::new();
        let ts = now();

        repo.append(entry(device_id, 20.0, ts)).await.unwrap();
        let second = repo.append(entry(device_id, 21.0, ts)).await.unwrap();

        let window = repo
            .find_in_range(device_id, ts, ts, 1)
            .await
            .unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].id, second.id);

        let latest = repo.latest(device_id).await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
    }

    #[tokio::test]
    async fn should_exclude_entries_outside_range() {
        let repo = make_repo().await;
        let device_id = DeviceId::new();
        let base = now();

        repo.append(entry(device_id, 20.0, base - Duration::hours(2)))
            .await
            .unwrap();
        let inside = repo.append(entry(device_id, 21.0, base)).await.unwrap();

        let window = repo
            .find_in_range(device_id, base - Duration::hours(1), base, 100)
            .await
            .unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].id, inside.id);
    }

    #[tokio::test]
    async fn should_not_mix_entries_across_devices() {
        let repo = make_repo().await;
        let a = DeviceId::new();
        let b = DeviceId::new();
        let base = now();

        repo.append(entry(a, 20.0, base)).await.unwrap();
        repo.append(entry(b, 30.0, base)).await.unwrap();

        let window = repo
            .find_in_range(a, base - Duration::hours(1), base, 100)
            .await
            .unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].device_id, a);
    }

    #[tokio::test]
    async fn should_return_none_when_device_has_no_history() {
        let repo = make_repo().await;
        let latest = repo.latest(DeviceId::new()).await.unwrap();
        assert!(latest.is_none());
    }
}
