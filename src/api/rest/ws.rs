use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::location::{GeoPoint, LocationSample};
use crate::models::session::Role;
use crate::realtime::{Outbound, OutboundSender, ServerMessage};
use crate::state::AppState;
use crate::store::DataStore;

/// Client-to-server frames.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Authenticate {
        #[serde(default)]
        user_id: Option<Uuid>,
        #[serde(default)]
        role: Option<Role>,
    },
    Subscribe {
        delivery_id: Uuid,
    },
    Unsubscribe {
        delivery_id: Uuid,
    },
    Location {
        delivery_id: Uuid,
        position: GeoPoint,
        #[serde(default)]
        heading: Option<f64>,
        #[serde(default)]
        speed: Option<f64>,
        #[serde(default)]
        accuracy: Option<f64>,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Outbound>();

    info!(connection_id = %connection_id, "websocket client connected");

    let mut send_task = tokio::spawn(async move {
        let mut outbound = UnboundedReceiverStream::new(rx);
        while let Some(item) = outbound.next().await {
            let frame = match item {
                Outbound::Message(message) => match serde_json::to_string(&message) {
                    Ok(json) => Message::Text(json),
                    Err(err) => {
                        warn!(error = %err, "failed to serialize ws message");
                        continue;
                    }
                },
                Outbound::Ping => Message::Ping(Vec::new()),
                Outbound::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            };

            if sink.send(frame).await.is_err() {
                break;
            }
        }
    });

    let deadline_state = state.clone();
    let deadline_tx = tx.clone();
    let grace = state.heartbeat_interval();
    let deadline_task = tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        if deadline_state.sessions.close_if_anonymous(connection_id, &deadline_tx) {
            debug!(connection_id = %connection_id, "closing websocket that never authenticated");
        }
    });

    let recv_state = state.clone();
    let recv_tx = tx.clone();
    let mut recv_task = tokio::spawn(async move {
        let mut session_id: Option<Uuid> = None;

        while let Some(Ok(frame)) = stream.next().await {
            if let Some(id) = session_id {
                recv_state.sessions.mark_alive(id);
            }

            let text = match frame {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            let reply = match serde_json::from_str::<ClientMessage>(&text) {
                Ok(message) => {
                    handle_message(&recv_state, connection_id, &mut session_id, &recv_tx, message)
                        .await
                }
                Err(err) => Err(AppError::BadRequest(format!("malformed message: {err}"))),
            };

            let outbound = match reply {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(err) => ServerMessage::Error {
                    code: err.code().to_string(),
                    message: err.to_string(),
                },
            };
            if recv_tx.send(Outbound::Message(outbound)).is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    deadline_task.abort();

    state.sessions.disconnect_connection(connection_id).await;
    info!(connection_id = %connection_id, "websocket client disconnected");
}

async fn handle_message(
    state: &AppState,
    connection_id: Uuid,
    session_id: &mut Option<Uuid>,
    sender: &OutboundSender,
    message: ClientMessage,
) -> Result<Option<ServerMessage>, AppError> {
    match message {
        ClientMessage::Authenticate { user_id, role } => {
            let id = state
                .sessions
                .authenticate(connection_id, user_id, role, sender.clone())
                .await?;
            *session_id = Some(id);
            Ok(Some(ServerMessage::Authenticated { session_id: id }))
        }
        ClientMessage::Subscribe { delivery_id } => {
            let id = require_session(session_id)?;
            authorize_subscription(state, id, delivery_id).await?;
            state.sessions.subscribe(id, delivery_id)?;
            Ok(Some(ServerMessage::Subscribed { delivery_id }))
        }
        ClientMessage::Unsubscribe { delivery_id } => {
            let id = require_session(session_id)?;
            state.sessions.unsubscribe(id, delivery_id);
            Ok(None)
        }
        ClientMessage::Location {
            delivery_id,
            position,
            heading,
            speed,
            accuracy,
            timestamp,
        } => {
            let id = require_session(session_id)?;
            let partner_id = partner_for_session(state, id).await?;
            let sample = LocationSample {
                delivery_id,
                partner_id,
                position,
                heading,
                speed,
                accuracy,
                timestamp: timestamp.unwrap_or_else(Utc::now),
            };

            if !state.coordinator.report_location(sample).await? {
                debug!(delivery_id = %delivery_id, "stale location sample ignored");
            }
            Ok(None)
        }
    }
}

fn require_session(session_id: &Option<Uuid>) -> Result<Uuid, AppError> {
    session_id.ok_or_else(|| AppError::Unauthorized("authenticate first".to_string()))
}

async fn partner_for_session(state: &AppState, session_id: Uuid) -> Result<Uuid, AppError> {
    let (user_id, role) = state
        .sessions
        .identity(session_id)
        .ok_or_else(|| AppError::Unauthorized("session is closed".to_string()))?;
    if role != Role::DeliveryPartner {
        return Err(AppError::Unauthorized(format!(
            "{role} sessions cannot report locations"
        )));
    }

    let partner = state
        .store
        .find_partner_by_user(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized(format!("user {user_id} is not a delivery partner")))?;
    Ok(partner.id)
}

/// Only parties to the delivery may follow it.
async fn authorize_subscription(
    state: &AppState,
    session_id: Uuid,
    delivery_id: Uuid,
) -> Result<(), AppError> {
    let (user_id, role) = state
        .sessions
        .identity(session_id)
        .ok_or_else(|| AppError::Unauthorized("session is closed".to_string()))?;
    let delivery = state.coordinator.get_delivery(delivery_id).await?;

    let allowed = match role {
        Role::Customer => delivery.customer_id == user_id,
        Role::Shopkeeper => delivery.shopkeeper_id == user_id,
        Role::DeliveryPartner => match delivery.partner_id {
            Some(partner_id) => state
                .store
                .get_delivery_partner(partner_id)
                .await?
                .is_some_and(|partner| partner.user_id == user_id),
            None => false,
        },
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::Unauthorized(format!(
            "user {user_id} is not a party to delivery {delivery_id}"
        )))
    }
}
