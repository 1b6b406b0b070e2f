//! Websocket wire protocol — JSON messages exchanged with realtime clients.
//!
//! Every message is a JSON object tagged by a `type` field. Server messages
//! flow hub-to-client; the only client-to-hub message is `device-command`.

use serde::{Deserialize, Serialize};

use crate::device::{Device, DeviceStatus, SensorSnapshot};
use crate::id::DeviceId;
use crate::time::Timestamp;

/// A message pushed from the hub to connected clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Full registry snapshot, sent on connect and after a removal.
    DeviceList {
        devices: Vec<Device>,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: Timestamp,
    },
    /// A new reading for one device.
    SensorData {
        device_id: DeviceId,
        device_name: String,
        data: SensorSnapshot,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: Timestamp,
    },
    /// One device's status and snapshot changed.
    DeviceStatus {
        device_id: DeviceId,
        device_name: String,
        status: DeviceStatus,
        data: SensorSnapshot,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: Timestamp,
    },
    /// Connected-client count changed on the hub.
    ConnectionStatus {
        message: String,
        client_count: usize,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: Timestamp,
    },
    /// A command from this client was rejected.
    Error {
        message: String,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: Timestamp,
    },
}

/// A message sent by a client to the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Ask the hub to mutate one device's snapshot.
    DeviceCommand {
        device_id: DeviceId,
        command: CommandName,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<f64>,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: Timestamp,
    },
}

/// The commands a realtime client may issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandName {
    TogglePower,
    SetTemperature,
    SetHumidity,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceKind, PowerState};
    use crate::time::now;
    use serde_json::json;

    #[test]
    fn should_tag_server_messages_with_kebab_case_type() {
        let msg = ServerMessage::ConnectionStatus {
            message: "client connected".to_string(),
            client_count: 2,
            timestamp: now(),
        };
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "connection-status");
        assert_eq!(json["clientCount"], 2);
        assert!(json["timestamp"].is_i64());
    }

    #[test]
    fn should_serialize_device_list_with_embedded_devices() {
        let device = Device::builder()
            .name("T1")
            .kind(DeviceKind::Sensor)
            .build()
            .unwrap();
        let msg = ServerMessage::DeviceList {
            devices: vec![device],
            timestamp: now(),
        };
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "device-list");
        assert_eq!(json["devices"][0]["name"], "T1");
        assert_eq!(json["devices"][0]["type"], "sensor");
    }

    #[test]
    fn should_serialize_sensor_data_with_camel_case_fields() {
        let msg = ServerMessage::SensorData {
            device_id: DeviceId::new(),
            device_name: "T1".to_string(),
            data: SensorSnapshot {
                temperature: 23.0,
                humidity: 46.0,
                power: PowerState::On,
            },
            timestamp: now(),
        };
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "sensor-data");
        assert!(json["deviceId"].is_string());
        assert_eq!(json["deviceName"], "T1");
        assert_eq!(json["data"]["power"], "on");
    }

    #[test]
    fn should_deserialize_device_command_without_value() {
        let device_id = DeviceId::new();
        let raw = json!({
            "type": "device-command",
            "deviceId": device_id,
            "command": "toggle-power",
            "timestamp": 1_700_000_000_000_i64,
        });

        let msg: ClientMessage = serde_json::from_value(raw).unwrap();
        let ClientMessage::DeviceCommand {
            device_id: parsed_id,
            command,
            value,
            ..
        } = msg;

        assert_eq!(parsed_id, device_id);
        assert_eq!(command, CommandName::TogglePower);
        assert!(value.is_none());
    }

    #[test]
    fn should_deserialize_set_commands_with_value() {
        let raw = json!({
            "type": "device-command",
            "deviceId": DeviceId::new(),
            "command": "set-temperature",
            "value": 21.5,
            "timestamp": 1_700_000_000_000_i64,
        });

        let ClientMessage::DeviceCommand { command, value, .. } =
            serde_json::from_value(raw).unwrap();

        assert_eq!(command, CommandName::SetTemperature);
        assert_eq!(value, Some(21.5));
    }

    #[test]
    fn should_reject_unknown_message_type() {
        let raw = json!({"type": "ping", "timestamp": 0});
        assert!(serde_json::from_value::<ClientMessage>(raw).is_err());
    }

    #[test]
    fn should_roundtrip_error_message() {
        let msg = ServerMessage::Error {
            message: "value is required for set-temperature".to_string(),
            timestamp: now(),
        };
        let text = serde_json::to_string(&msg).unwrap();
        let back: ServerMessage = serde_json::from_str(&text).unwrap();

        let ServerMessage::Error { message, .. } = back else {
            panic!("expected error message");
        };
        assert!(message.contains("set-temperature"));
    }
}
