//! Command validation — schema checks for inbound mutation payloads.
//!
//! [`validate`] is a pure function: given a command kind and the raw JSON
//! body, it returns either a normalized, fully-typed payload or a
//! [`ValidationError`] enumerating **every** violated constraint. It runs
//! before a payload reaches the registry or history store; those components
//! only check existence, never enum membership.

use std::str::FromStr;

use serde_json::Value;

use crate::device::{DeviceKind, DeviceStatus, PowerState, SensorSnapshot};
use crate::error::ValidationError;

/// Which operation the payload is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Create,
    Update,
    UpdateStatus,
    UpdateData,
    HistoryAppend,
}

/// Normalized payload for registering a device, defaults filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateDevice {
    pub name: String,
    pub kind: DeviceKind,
    pub status: DeviceStatus,
    pub data: SensorSnapshot,
}

/// Normalized payload for a partial device update.
///
/// Unset fields retain their prior values; a supplied `data` object merges
/// per-field into the existing snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateDevice {
    pub name: Option<String>,
    pub kind: Option<DeviceKind>,
    pub status: Option<DeviceStatus>,
    pub data: Option<PartialSnapshot>,
}

/// A snapshot where any field may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PartialSnapshot {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub power: Option<PowerState>,
}

impl PartialSnapshot {
    /// Merge the set fields over `base`, keeping the rest.
    #[must_use]
    pub fn apply_to(self, base: SensorSnapshot) -> SensorSnapshot {
        SensorSnapshot {
            temperature: self.temperature.unwrap_or(base.temperature),
            humidity: self.humidity.unwrap_or(base.humidity),
            power: self.power.unwrap_or(base.power),
        }
    }

    /// Fill missing fields with the creation defaults (zero/off).
    #[must_use]
    pub fn or_defaults(self) -> SensorSnapshot {
        self.apply_to(SensorSnapshot::default())
    }
}

/// A validated, fully-typed command ready for the services.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Create(CreateDevice),
    Update(UpdateDevice),
    UpdateStatus(DeviceStatus),
    UpdateData(SensorSnapshot),
    HistoryAppend(SensorSnapshot),
}

const KIND_VALUES: &str = "'sensor' or 'controller'";
const STATUS_VALUES: &str = "'online' or 'offline'";
const POWER_VALUES: &str = "'on' or 'off'";

/// Validate a raw JSON payload against the schema for `kind`.
///
/// # Errors
///
/// Returns [`ValidationError`] listing every violated constraint.
pub fn validate(kind: CommandKind, payload: &Value) -> Result<Command, ValidationError> {
    let mut check = Checker::new(payload)?;

    let command = match kind {
        CommandKind::Create => {
            let name = check.required_string("name");
            let device_kind = check.required_enum::<DeviceKind>("type", KIND_VALUES);
            let status = check.optional_enum::<DeviceStatus>("status", STATUS_VALUES);
            let data = check.optional_snapshot("data");
            check.finish()?;
            Command::Create(CreateDevice {
                name: name.unwrap_or_default(),
                kind: device_kind.unwrap_or(DeviceKind::Sensor),
                status: status.unwrap_or(DeviceStatus::Online),
                data: data.unwrap_or_default().or_defaults(),
            })
        }
        CommandKind::Update => {
            let update = UpdateDevice {
                name: check.optional_string("name"),
                kind: check.optional_enum::<DeviceKind>("type", KIND_VALUES),
                status: check.optional_enum::<DeviceStatus>("status", STATUS_VALUES),
                data: check.optional_snapshot("data"),
            };
            check.finish()?;
            Command::Update(update)
        }
        CommandKind::UpdateStatus => {
            let status = check.required_enum::<DeviceStatus>("status", STATUS_VALUES);
            check.finish()?;
            Command::UpdateStatus(status.unwrap_or(DeviceStatus::Online))
        }
        CommandKind::UpdateData => {
            let data = check.required_full_snapshot("data");
            check.finish()?;
            Command::UpdateData(data.unwrap_or_default())
        }
        CommandKind::HistoryAppend => {
            let reading = check.full_reading();
            check.finish()?;
            Command::HistoryAppend(reading.unwrap_or_default())
        }
    };

    Ok(command)
}

/// Accumulates violations while pulling typed fields out of a JSON object.
struct Checker<'a> {
    object: &'a serde_json::Map<String, Value>,
    violations: Vec<String>,
}

impl<'a> Checker<'a> {
    fn new(payload: &'a Value) -> Result<Self, ValidationError> {
        let object = payload
            .as_object()
            .ok_or_else(|| ValidationError::single("payload must be a JSON object"))?;
        Ok(Self {
            object,
            violations: Vec::new(),
        })
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(self.violations))
        }
    }

    fn required_string(&mut self, field: &str) -> Option<String> {
        match self.object.get(field) {
            None | Some(Value::Null) => {
                self.violations.push(format!("{field} is required"));
                None
            }
            Some(value) => self.parse_string(field, value),
        }
    }

    fn optional_string(&mut self, field: &str) -> Option<String> {
        match self.object.get(field) {
            None | Some(Value::Null) => None,
            Some(value) => self.parse_string(field, value),
        }
    }

    fn parse_string(&mut self, field: &str, value: &Value) -> Option<String> {
        match value.as_str() {
            Some(s) if !s.is_empty() => Some(s.to_string()),
            Some(_) => {
                self.violations.push(format!("{field} must not be empty"));
                None
            }
            None => {
                self.violations.push(format!("{field} must be a string"));
                None
            }
        }
    }

    fn required_enum<T: FromStr>(&mut self, field: &str, allowed: &str) -> Option<T> {
        match self.object.get(field) {
            None | Some(Value::Null) => {
                self.violations.push(format!("{field} is required"));
                None
            }
            Some(value) => self.parse_enum(field, value, allowed),
        }
    }

    fn optional_enum<T: FromStr>(&mut self, field: &str, allowed: &str) -> Option<T> {
        match self.object.get(field) {
            None | Some(Value::Null) => None,
            Some(value) => self.parse_enum(field, value, allowed),
        }
    }

    fn parse_enum<T: FromStr>(&mut self, field: &str, value: &Value, allowed: &str) -> Option<T> {
        match value.as_str().and_then(|s| s.parse::<T>().ok()) {
            Some(parsed) => Some(parsed),
            None => {
                self.violations
                    .push(format!("{field} must be one of {allowed}"));
                None
            }
        }
    }

    /// Optional `data` object whose own fields are all optional.
    fn optional_snapshot(&mut self, field: &str) -> Option<PartialSnapshot> {
        let value = match self.object.get(field) {
            None | Some(Value::Null) => return None,
            Some(value) => value,
        };
        let Some(object) = value.as_object() else {
            self.violations.push(format!("{field} must be an object"));
            return None;
        };
        let mut nested = Checker {
            object,
            violations: Vec::new(),
        };
        let snapshot = PartialSnapshot {
            temperature: nested.optional_number("temperature"),
            humidity: nested.optional_number("humidity"),
            power: nested.optional_enum::<PowerState>("power", POWER_VALUES),
        };
        self.absorb(field, nested);
        Some(snapshot)
    }

    /// Required `data` object with all three fields present.
    fn required_full_snapshot(&mut self, field: &str) -> Option<SensorSnapshot> {
        let value = match self.object.get(field) {
            None | Some(Value::Null) => {
                self.violations.push(format!("{field} is required"));
                return None;
            }
            Some(value) => value,
        };
        let Some(object) = value.as_object() else {
            self.violations.push(format!("{field} must be an object"));
            return None;
        };
        let mut nested = Checker {
            object,
            violations: Vec::new(),
        };
        let reading = nested.full_reading();
        self.absorb(field, nested);
        reading
    }

    /// All three reading fields required at this checker's level.
    fn full_reading(&mut self) -> Option<SensorSnapshot> {
        let temperature = self.required_number("temperature");
        let humidity = self.required_number("humidity");
        let power = self.required_enum::<PowerState>("power", POWER_VALUES);
        match (temperature, humidity, power) {
            (Some(temperature), Some(humidity), Some(power)) => Some(SensorSnapshot {
                temperature,
                humidity,
                power,
            }),
            _ => None,
        }
    }

    fn required_number(&mut self, field: &str) -> Option<f64> {
        match self.object.get(field) {
            None | Some(Value::Null) => {
                self.violations.push(format!("{field} is required"));
                None
            }
            Some(value) => self.parse_number(field, value),
        }
    }

    fn optional_number(&mut self, field: &str) -> Option<f64> {
        match self.object.get(field) {
            None | Some(Value::Null) => None,
            Some(value) => self.parse_number(field, value),
        }
    }

    fn parse_number(&mut self, field: &str, value: &Value) -> Option<f64> {
        match value.as_f64() {
            Some(number) => Some(number),
            None => {
                self.violations.push(format!("{field} must be a number"));
                None
            }
        }
    }

    /// Fold a nested checker's violations in, prefixed with the field path.
    fn absorb(&mut self, prefix: &str, nested: Checker<'_>) {
        self.violations
            .extend(nested.violations.into_iter().map(|v| format!("{prefix}.{v}")));
    }
}
