//! Device service — use-cases for the fleet registry.
//!
//! Mutations to a given device are serialized through a per-device async
//! lock, so concurrent partial updates interleave whole-operation rather
//! than field-by-field. Events are enqueued on the bus after the write
//! commits but before the lock is released, so subscribers observe them in
//! commit order. The broadcast channel only enqueues here; delivery to
//! clients happens on their own tasks, outside the lock.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use fleethub_domain::command::{CreateDevice, UpdateDevice};
use fleethub_domain::device::{Device, DeviceStatus, SensorSnapshot};
use fleethub_domain::error::{FleetError, NotFoundError, ValidationError};
use fleethub_domain::event::Event;
use fleethub_domain::id::DeviceId;
use fleethub_domain::protocol::CommandName;

use crate::ports::{DeviceRepository, EventPublisher};

/// Application service for device registry operations.
pub struct DeviceService<R, P> {
    repo: R,
    publisher: P,
    locks: DashMap<DeviceId, Arc<Mutex<()>>>,
}

impl<R: DeviceRepository, P: EventPublisher> DeviceService<R, P> {
    /// Create a new service backed by the given repository and event bus.
    pub fn new(repo: R, publisher: P) -> Self {
        Self {
            repo,
            publisher,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, id: DeviceId) -> Arc<Mutex<()>> {
        self.locks.entry(id).or_default().clone()
    }

    /// Register a new device from a validated payload.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::Validation`] if the payload violates domain
    /// invariants, or a storage error propagated from the repository.
    #[tracing::instrument(skip(self, payload), fields(device_name = %payload.name))]
    pub async fn create_device(&self, payload: CreateDevice) -> Result<Device, FleetError> {
        let device = Device::builder()
            .name(payload.name)
            .kind(payload.kind)
            .status(payload.status)
            .data(payload.data)
            .build()?;
        let lock = self.lock_for(device.id);
        let created = {
            let _guard = lock.lock().await;
            let created = self.repo.create(device).await?;
            self.publisher
                .publish(Event::DeviceChanged(created.clone()))
                .await?;
            created
        };
        Ok(created)
    }

    /// Look up a device by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::NotFound`] when no device with `id` exists,
    /// or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get_device(&self, id: DeviceId) -> Result<Device, FleetError> {
        self.repo.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Device",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// List all registered devices.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_devices(&self) -> Result<Vec<Device>, FleetError> {
        self.repo.get_all().await
    }

    /// Apply a partial update. Unset fields keep their prior values; a
    /// supplied `data` object merges per-field into the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::NotFound`] when the device does not exist,
    /// or a storage error from the repository.
    #[tracing::instrument(skip(self, update))]
    pub async fn update_device(
        &self,
        id: DeviceId,
        update: UpdateDevice,
    ) -> Result<Device, FleetError> {
        let lock = self.lock_for(id);
        let updated = {
            let _guard = lock.lock().await;
            let mut device = self.get_device(id).await?;
            if let Some(name) = update.name {
                device.name = name;
            }
            if let Some(kind) = update.kind {
                device.kind = kind;
            }
            if let Some(status) = update.status {
                device.status = status;
            }
            if let Some(data) = update.data {
                device.data = data.apply_to(device.data);
            }
            device.touch();
            let updated = self.repo.update(device).await?;
            self.publisher
                .publish(Event::DeviceChanged(updated.clone()))
                .await?;
            updated
        };
        Ok(updated)
    }

    /// Set a device's status.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::NotFound`] when the device does not exist,
    /// or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: DeviceId,
        status: DeviceStatus,
    ) -> Result<Device, FleetError> {
        let lock = self.lock_for(id);
        let updated = {
            let _guard = lock.lock().await;
            let mut device = self.get_device(id).await?;
            device.status = status;
            device.touch();
            let updated = self.repo.update(device).await?;
            self.publisher
                .publish(Event::DeviceChanged(updated.clone()))
                .await?;
            updated
        };
        Ok(updated)
    }

    /// Replace a device's current snapshot wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::NotFound`] when the device does not exist,
    /// or a storage error from the repository.
    #[tracing::instrument(skip(self, data))]
    pub async fn update_data(
        &self,
        id: DeviceId,
        data: SensorSnapshot,
    ) -> Result<Device, FleetError> {
        let lock = self.lock_for(id);
        let updated = {
            let _guard = lock.lock().await;
            let mut device = self.get_device(id).await?;
            device.data = data;
            device.touch();
            let updated = self.repo.update(device).await?;
            self.publisher
                .publish(Event::SnapshotReplaced(updated.clone()))
                .await?;
            updated
        };
        Ok(updated)
    }

    /// Apply a realtime client command to a device's snapshot.
    ///
    /// The read-modify-write runs under the device lock so two concurrent
    /// toggles cannot cancel each other out.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::Validation`] when a set command is missing its
    /// value, [`FleetError::NotFound`] when the device does not exist, or a
    /// storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn apply_command(
        &self,
        id: DeviceId,
        command: CommandName,
        value: Option<f64>,
    ) -> Result<Device, FleetError> {
        let lock = self.lock_for(id);
        let updated = {
            let _guard = lock.lock().await;
            let mut device = self.get_device(id).await?;
            match command {
                CommandName::TogglePower => {
                    device.data.power = device.data.power.toggled();
                }
                CommandName::SetTemperature => {
                    device.data.temperature = value.ok_or_else(|| {
                        ValidationError::single("value is required for set-temperature")
                    })?;
                }
                CommandName::SetHumidity => {
                    device.data.humidity = value.ok_or_else(|| {
                        ValidationError::single("value is required for set-humidity")
                    })?;
                }
            }
            device.touch();
            let updated = self.repo.update(device).await?;
            self.publisher
                .publish(Event::SnapshotReplaced(updated.clone()))
                .await?;
            updated
        };
        Ok(updated)
    }

    /// Delete a device by id. Its history entries are left in place.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::NotFound`] when the device does not exist,
    /// or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn delete_device(&self, id: DeviceId) -> Result<(), FleetError> {
        let lock = self.lock_for(id);
        {
            let _guard = lock.lock().await;
            let removed = self.repo.delete(id).await?;
            if !removed {
                return Err(NotFoundError {
                    entity: "Device",
                    id: id.to_string(),
                }
                .into());
            }
            self.publisher.publish(Event::DeviceRemoved(id)).await?;
        }
        self.locks.remove(&id);
        Ok(())
    }
}
