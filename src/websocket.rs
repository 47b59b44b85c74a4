//! WebSocket handlers for agent connections and observer dashboards
//!
//! Agents attach on `/ws/agent` with handshake parameters in the query
//! string; their callbacks mutate the registry and fan out to observers.
//! Dashboards attach on `/ws/observe` and receive every observer event,
//! with ping/pong for connection keepalive.

use crate::messages::{AgentMessage, ObserverEvent, ServerMessage};
use crate::state::{Agent, AgentStatus, AppState};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Handshake parameters an agent supplies on connect.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Logical id; falls back to the connection id when absent
    pub agent_id: Option<String>,
    /// Display name; defaults to "Unknown"
    pub agent_name: Option<String>,
    /// Host the agent runs on; defaults to the server's own host name
    pub host_name: Option<String>,
}

fn server_host_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

/// WebSocket upgrade handler for agent connections
pub async fn agent_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_agent_socket(socket, params, state))
}

// One task drains the outbound queue onto the wire, another consumes
// inbound callback frames; whichever side ends first tears the other down
// and the connection is unregistered.
async fn handle_agent_socket(socket: WebSocket, params: ConnectParams, state: AppState) {
    let connection_id = Uuid::new_v4().to_string();
    let agent_id = params
        .agent_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| connection_id.clone());
    let agent_name = params.agent_name.unwrap_or_else(|| "Unknown".to_string());
    let host_name = params.host_name.unwrap_or_else(server_host_name);

    info!(
        agent_id = %agent_id,
        agent_name = %agent_name,
        host_name = %host_name,
        connection_id = %connection_id,
        "Agent connected"
    );
    state
        .registry
        .register(Agent::connect(
            agent_id,
            connection_id.clone(),
            agent_name,
            host_name,
        ))
        .await;

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ServerMessage>();
    state.connections.insert(connection_id.clone(), tx).await;

    // Task to forward queued server messages to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(text) => {
                    if let Err(e) = sender.send(Message::Text(text)).await {
                        error!("Failed to send message to agent: {}", e);
                        break;
                    }
                }
                Err(e) => error!("Failed to encode server message: {}", e),
            }
        }
    });

    // Task to consume inbound callback frames
    let recv_state = state.clone();
    let recv_connection = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<AgentMessage>(&text) {
                    Ok(message) => {
                        handle_agent_message(&recv_state, &recv_connection, message).await;
                    }
                    Err(e) => {
                        warn!(
                            connection_id = %recv_connection,
                            error = %e,
                            "Ignoring malformed agent message"
                        );
                    }
                },
                Ok(Message::Close(_)) => {
                    info!(connection_id = %recv_connection, "Agent disconnected");
                    break;
                }
                Err(e) => {
                    // Errored disconnect; same registry effect as a clean one
                    warn!(connection_id = %recv_connection, error = %e, "Agent connection lost");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    state.connections.remove(&connection_id).await;
    state.registry.unregister(&connection_id).await;
}

/// Apply one inbound agent callback: fan out the matching observer event
/// and, for completions, flip the reporting connection back to `Idle`.
///
/// Task ids are forwarded unvalidated; reports for unknown connections fall
/// through as registry no-ops.
pub async fn handle_agent_message(state: &AppState, connection_id: &str, message: AgentMessage) {
    match message {
        AgentMessage::ReportProgress {
            task_id,
            progress,
            message,
        } => {
            info!(
                connection_id = %connection_id,
                task_id = %task_id,
                progress,
                "Progress reported"
            );
            // send only fails when no observer is subscribed
            let _ = state.events.send(ObserverEvent::TaskProgressUpdated {
                task_id,
                progress,
                message,
            });
        }
        AgentMessage::ReportTaskCompleted {
            task_id,
            success,
            result,
            error,
        } => {
            info!(
                connection_id = %connection_id,
                task_id = %task_id,
                success,
                "Task completed"
            );
            let _ = state.events.send(ObserverEvent::TaskCompleted {
                task_id,
                success,
                result,
                error,
            });
            // Only the status flips; current_task_id keeps the finished id
            // until the next dispatch overwrites it
            state
                .registry
                .update_status(connection_id, AgentStatus::Idle, None)
                .await;
        }
        AgentMessage::ReportAnalysisResult { task_id, payload } => {
            info!(connection_id = %connection_id, task_id = %task_id, "Analysis result received");
            let _ = state
                .events
                .send(ObserverEvent::AnalysisResultReceived { task_id, payload });
        }
    }
}

/// WebSocket upgrade handler for observer dashboards
pub async fn observer_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_observer_socket(socket, state))
}

// Observers are write-mostly: every broadcast event is forwarded, inbound
// frames are ignored except close. Periodic pings keep the connection alive.
async fn handle_observer_socket(socket: WebSocket, state: AppState) {
    info!("Observer client connected");

    let (mut sender, mut receiver) = socket.split();
    let mut events = state.events.subscribe();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Message>();

    // Task to forward broadcast events into the outbound queue
    let event_tx = tx.clone();
    let mut event_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(text) => {
                        if event_tx.send(Message::Text(text)).is_err() {
                            break;
                        }
                    }
                    Err(e) => error!("Failed to encode observer event: {}", e),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Observer lagging, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Task to send periodic pings
    let ping_tx = tx.clone();
    let mut ping_task = tokio::spawn(async move {
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(30)).await;
            if ping_tx.send(Message::Ping(vec![])).is_err() {
                break;
            }
        }
    });

    // Task to drain the outbound queue onto the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = sender.send(msg).await {
                error!("Failed to send message to observer: {}", e);
                break;
            }
        }
    });

    // Receive loop: only close and errors matter
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Ok(Message::Pong(_)) => {
                    // Client responded to ping
                }
                Ok(_) => {}
                Err(e) => {
                    error!("Observer socket error: {}", e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            event_task.abort();
            ping_task.abort();
            recv_task.abort();
        }
        _ = &mut recv_task => {
            event_task.abort();
            ping_task.abort();
            send_task.abort();
        }
        _ = &mut event_task => {
            ping_task.abort();
            send_task.abort();
            recv_task.abort();
        }
        _ = &mut ping_task => {
            event_task.abort();
            send_task.abort();
            recv_task.abort();
        }
    }

    info!("Observer client disconnected");
}
