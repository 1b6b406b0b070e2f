//! Device — a registered member of the fleet with a current sensor snapshot.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::DeviceId;
use crate::time::{Timestamp, now};

/// What a device is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Sensor,
    Controller,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor => f.write_str("sensor"),
            Self::Controller => f.write_str("controller"),
        }
    }
}

impl FromStr for DeviceKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sensor" => Ok(Self::Sensor),
            "controller" => Ok(Self::Controller),
            _ => Err(UnknownVariant),
        }
    }
}

/// Whether a device is currently reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => f.write_str("online"),
            Self::Offline => f.write_str("offline"),
        }
    }
}

impl FromStr for DeviceStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            _ => Err(UnknownVariant),
        }
    }
}

/// Power switch position reported in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    /// Return the opposite position.
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::On => Self::Off,
            Self::Off => Self::On,
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => f.write_str("on"),
            Self::Off => f.write_str("off"),
        }
    }
}

impl FromStr for PowerState {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            _ => Err(UnknownVariant),
        }
    }
}

/// Parse error for the device enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown enum variant")]
pub struct UnknownVariant;

/// The device's current (not historical) sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub temperature: f64,
    pub humidity: f64,
    pub power: PowerState,
}

impl Default for SensorSnapshot {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            humidity: 0.0,
            power: PowerState::Off,
        }
    }
}

/// A registered device: identity, status, and the latest snapshot.
///
/// `last_update` reflects the timestamp of the most recent accepted mutation
/// to status or data and never decreases for a given device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    pub status: DeviceStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_update: Timestamp,
    pub data: SensorSnapshot,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// Refresh `last_update` to the current time, never going backwards.
    pub fn touch(&mut self) {
        self.last_update = now().max(self.last_update);
    }
}

/// Step-by-step builder for [`Device`].
///
/// Missing status defaults to online; missing data fields default to
/// zero/off.
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    id: Option<DeviceId>,
    name: Option<String>,
    kind: Option<DeviceKind>,
    status: Option<DeviceStatus>,
    data: Option<SensorSnapshot>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn id(mut self, id: DeviceId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: DeviceKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn status(mut self, status: DeviceStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn data(mut self, data: SensorSnapshot) -> Self {
        self.data = Some(data);
        self
    }

    /// Consume the builder and return a [`Device`] with a fresh id and
    /// `last_update = now()`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the name is missing/empty or the kind
    /// is missing.
    pub fn build(self) -> Result<Device, ValidationError> {
        let mut violations = Vec::new();
        if self.name.as_deref().is_none_or(str::is_empty) {
            violations.push("name is required and must not be empty".to_string());
        }
        if self.kind.is_none() {
            violations.push("type is required".to_string());
        }
        if !violations.is_empty() {
            return Err(ValidationError::new(violations));
        }

        // Both checked above.
        let (Some(name), Some(kind)) = (self.name, self.kind) else {
            return Err(ValidationError::single("name and type are required"));
        };

        Ok(Device {
            id: self.id.unwrap_or_default(),
            name,
            kind,
            status: self.status.unwrap_or(DeviceStatus::Online),
            last_update: now(),
            data: self.data.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_apply_defaults_when_building_minimal_device() {
        let device = Device::builder()
            .name("T1")
            .kind(DeviceKind::Sensor)
            .build()
            .unwrap();

        assert_eq!(device.status, DeviceStatus::Online);
        assert!((device.data.temperature - 0.0).abs() < f64::EPSILON);
        assert!((device.data.humidity - 0.0).abs() < f64::EPSILON);
        assert_eq!(device.data.power, PowerState::Off);
    }

    #[test]
    fn should_collect_all_violations_when_name_and_kind_missing() {
        let result = Device::builder().build();
        let err = result.unwrap_err();
        assert_eq!(err.violations.len(), 2);
    }

    #[test]
    fn should_reject_empty_name() {
        let result = Device::builder().name("").kind(DeviceKind::Sensor).build();
        assert!(result.is_err());
    }

    #[test]
    fn should_set_last_update_to_build_time() {
        let before = now();
        let device = Device::builder()
            .name("T1")
            .kind(DeviceKind::Controller)
            .build()
            .unwrap();
        assert!(device.last_update >= before);
    }

    #[test]
    fn should_never_decrease_last_update_on_touch() {
        let mut device = Device::builder()
            .name("T1")
            .kind(DeviceKind::Sensor)
            .build()
            .unwrap();
        let future = now() + chrono::Duration::hours(1);
        device.last_update = future;
        device.touch();
        assert_eq!(device.last_update, future);
    }

    #[test]
    fn should_toggle_power_state() {
        assert_eq!(PowerState::On.toggled(), PowerState::Off);
        assert_eq!(PowerState::Off.toggled(), PowerState::On);
    }

    #[test]
    fn should_serialize_device_with_wire_field_names() {
        let device = Device::builder()
            .name("T1")
            .kind(DeviceKind::Sensor)
            .build()
            .unwrap();
        let json = serde_json::to_value(&device).unwrap();

        assert_eq!(json["type"], "sensor");
        assert_eq!(json["status"], "online");
        assert_eq!(json["data"]["power"], "off");
        assert!(json["lastUpdate"].is_i64());
    }

    #[test]
    fn should_parse_enums_from_wire_strings() {
        assert_eq!("sensor".parse::<DeviceKind>(), Ok(DeviceKind::Sensor));
        assert_eq!("offline".parse::<DeviceStatus>(), Ok(DeviceStatus::Offline));
        assert_eq!("on".parse::<PowerState>(), Ok(PowerState::On));
        assert!("lamp".parse::<DeviceKind>().is_err());
    }
}
