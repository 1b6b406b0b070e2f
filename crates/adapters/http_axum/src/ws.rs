//! Realtime websocket hub.
//!
//! Each connection gets a device-list snapshot, then a feed of fleet events
//! in publish order. A slow client lags on the broadcast channel and loses
//! messages rather than stalling the hub. Inbound traffic is limited to
//! `device-command`; failures are reported back to the issuing client only.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use fleethub_app::ports::{DeviceRepository, EventPublisher, HistoryRepository};
use fleethub_domain::error::FleetError;
use fleethub_domain::event::Event;
use fleethub_domain::protocol::{ClientMessage, ServerMessage};
use fleethub_domain::time::now;

use crate::state::AppState;

/// `GET /ws` — upgrade to the realtime feed.
pub async fn upgrade<DR, HR>(
    State(state): State<AppState<DR, HR>>,
    ws: WebSocketUpgrade,
) -> Response
where
    DR: DeviceRepository + Send + Sync + 'static,
    HR: HistoryRepository + Send + Sync + 'static,
{
    ws.on_upgrade(move |socket| session(state, socket))
}

async fn session<DR, HR>(state: AppState<DR, HR>, socket: WebSocket)
where
    DR: DeviceRepository + Send + Sync + 'static,
    HR: HistoryRepository + Send + Sync + 'static,
{
    // Subscribe before the snapshot so no mutation can fall in the gap.
    let mut events = state.event_bus.subscribe();
    let (mut sink, mut stream) = socket.split();

    match snapshot(&state).await {
        Ok(message) => {
            if send(&mut sink, &message).await.is_err() {
                return;
            }
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to build device-list snapshot");
            return;
        }
    }

    let count = state.clients.join();
    publish_count(&state, count).await;
    tracing::info!(count, "websocket client connected");

    loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = handle_client_message(&state, text.as_str()).await {
                        if send(&mut sink, &reply).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::debug!(error = %err, "websocket receive error");
                    break;
                }
            },
            event = events.recv() => match event {
                Ok(event) => match to_server_message(&state, event).await {
                    Ok(message) => {
                        if send(&mut sink, &message).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "failed to materialize event for client");
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "websocket subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    let count = state.clients.leave();
    publish_count(&state, count).await;
    tracing::info!(count, "websocket client disconnected");
}

async fn send(
    sink: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(message).map_err(axum::Error::new)?;
    sink.send(Message::Text(text.into())).await
}

async fn snapshot<DR, HR>(state: &AppState<DR, HR>) -> Result<ServerMessage, FleetError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    HR: HistoryRepository + Send + Sync + 'static,
{
    let devices = state.device_service.list_devices().await?;
    Ok(ServerMessage::DeviceList {
        devices,
        timestamp: now(),
    })
}

async fn publish_count<DR, HR>(state: &AppState<DR, HR>, count: usize)
where
    DR: DeviceRepository + Send + Sync + 'static,
    HR: HistoryRepository + Send + Sync + 'static,
{
    if let Err(err) = state
        .event_bus
        .publish(Event::ClientsChanged { count })
        .await
    {
        tracing::error!(error = %err, "failed to publish client count");
    }
}

/// Handle one inbound frame. Returns an error message to send back to the
/// issuing client, or `None` when the resulting state will arrive via the
/// event feed.
async fn handle_client_message<DR, HR>(
    state: &AppState<DR, HR>,
    text: &str,
) -> Option<ServerMessage>
where
    DR: DeviceRepository + Send + Sync + 'static,
    HR: HistoryRepository + Send + Sync + 'static,
{
    let parsed = match serde_json::from_str::<ClientMessage>(text) {
        Ok(parsed) => parsed,
        Err(err) => return Some(error_message(format!("invalid message: {err}"))),
    };
    let ClientMessage::DeviceCommand {
        device_id,
        command,
        value,
        ..
    } = parsed;

    match state
        .device_service
        .apply_command(device_id, command, value)
        .await
    {
        Ok(_) => None,
        Err(FleetError::Storage(err)) => {
            tracing::error!(error = %err, "storage error while applying command");
            Some(error_message("internal server error"))
        }
        Err(err) => Some(error_message(err.to_string())),
    }
}

fn error_message(message: impl Into<String>) -> ServerMessage {
    ServerMessage::Error {
        message: message.into(),
        timestamp: now(),
    }
}

/// Map a bus event to its wire representation.
///
/// Removals have no wire kind of their own; they become a fresh
/// device-list snapshot.
async fn to_server_message<DR, HR>(
    state: &AppState<DR, HR>,
    event: Event,
) -> Result<ServerMessage, FleetError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    HR: HistoryRepository + Send + Sync + 'static,
{
    let message = match event {
        Event::DeviceChanged(device) => ServerMessage::DeviceStatus {
            device_id: device.id,
            device_name: device.name,
            status: device.status,
            data: device.data,
            timestamp: device.last_update,
        },
        Event::SnapshotReplaced(device) => ServerMessage::SensorData {
            device_id: device.id,
            device_name: device.name,
            data: device.data,
            timestamp: device.last_update,
        },
        Event::ReadingAppended { device_name, entry } => ServerMessage::SensorData {
            device_id: entry.device_id,
            device_name,
            data: entry.reading(),
            timestamp: entry.timestamp,
        },
        Event::DeviceRemoved(_) => snapshot(state).await?,
        Event::ClientsChanged { count } => ServerMessage::ConnectionStatus {
            message: format!("{count} clients connected"),
            client_count: count,
            timestamp: now(),
        },
    };
    Ok(message)
}
