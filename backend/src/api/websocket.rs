use axum::extract::ws::{Message, WebSocket};
use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, sync::Arc};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::api::dto::{HealthAlertDto, LedgerEventDto, PriceDto};
use crate::api::handlers::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientCommand {
    SubscribeOwner { owner: String },
    UnsubscribeOwner { owner: String },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsMessage {
    Connected { message: String },
    PriceUpdate(PriceDto),
    LedgerEvent(LedgerEventDto),
    HealthAlert(HealthAlertDto),
    Error { message: String },
}

type Sender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Owners a connection follows; empty follows everyone.
#[derive(Debug, Default)]
struct OwnerFilter {
    owners: HashSet<String>,
}

impl OwnerFilter {
    fn apply(&mut self, command: ClientCommand) {
        match command {
            ClientCommand::SubscribeOwner { owner } => {
                info!("Client subscribed to owner: {}", owner);
                self.owners.insert(owner.to_lowercase());
            }
            ClientCommand::UnsubscribeOwner { owner } => {
                info!("Client unsubscribed from owner: {}", owner);
                self.owners.remove(&owner.to_lowercase());
            }
        }
    }

    fn wants(&self, owner: &str) -> bool {
        self.owners.is_empty() || self.owners.contains(&owner.to_lowercase())
    }
}

fn welcome() -> WsMessage {
    WsMessage::Connected {
        message: "Connected to safe ledger backend".to_string(),
    }
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| websocket_handler(socket, state))
}

async fn send(sender: &Sender, msg: &WsMessage) -> Result<(), String> {
    let text = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    let mut sender_lock = sender.lock().await;
    sender_lock
        .send(Message::Text(text))
        .await
        .map_err(|e| e.to_string())
}

async fn websocket_handler(socket: WebSocket, state: AppState) {
    let (sender, mut receiver) = socket.split();
    let sender: Sender = Arc::new(Mutex::new(sender));

    let mut price_rx = state.monitor.subscribe_prices();
    let mut alert_rx = state.monitor.subscribe_alerts();
    let mut event_rx = state.service.subscribe_events();

    info!("WebSocket client connected");

    let subscribed_owners = Arc::new(RwLock::new(OwnerFilter::default()));

    if let Err(e) = send(&sender, &welcome()).await {
        error!("Failed to send welcome message: {}", e);
        return;
    }

    let recv_sender = Arc::clone(&sender);
    let recv_subscriptions = Arc::clone(&subscribed_owners);
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(command) => recv_subscriptions.write().await.apply(command),
                    Err(e) => {
                        let error_msg = WsMessage::Error {
                            message: format!("Invalid command: {}", e),
                        };
                        if let Err(e) = send(&recv_sender, &error_msg).await {
                            error!("Failed to send error message: {}", e);
                            break;
                        }
                    }
                },
                Message::Close(_) => {
                    info!("Client disconnected");
                    break;
                }
                _ => {}
            }
        }
    });

    let send_sender = Arc::clone(&sender);
    let send_subscriptions = Arc::clone(&subscribed_owners);
    let send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                Ok(price_update) = price_rx.recv() => {
                    let msg = WsMessage::PriceUpdate(PriceDto::from(price_update));
                    if let Err(e) = send(&send_sender, &msg).await {
                        warn!("Failed to send price update: {}", e);
                        break;
                    }
                },
                Ok(event) = event_rx.recv() => {
                    let dto = match LedgerEventDto::from_event(&event) {
                        Ok(dto) => dto,
                        Err(e) => {
                            error!("Failed to encode ledger event: {}", e);
                            continue;
                        }
                    };
                    let wanted = send_subscriptions.read().await.wants(&dto.owner);
                    if wanted {
                        if let Err(e) = send(&send_sender, &WsMessage::LedgerEvent(dto)).await {
                            warn!("Failed to send ledger event: {}", e);
                            break;
                        }
                    }
                },
                Ok(alert) = alert_rx.recv() => {
                    let dto = HealthAlertDto::from(alert);
                    let wanted = send_subscriptions.read().await.wants(&dto.owner);
                    if wanted {
                        if let Err(e) = send(&send_sender, &WsMessage::HealthAlert(dto)).await {
                            warn!("Failed to send health alert: {}", e);
                            break;
                        }
                    }
                },
                else => {
                    break;
                }
            }
        }
    });

    tokio::pin!(recv_task);
    tokio::pin!(send_task);

    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    }

    info!("WebSocket connection closed");
}
