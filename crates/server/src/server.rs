// WebSocket front end for the replica hub

use crate::error::HubError;
use crate::hub::HubState;
use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt}; // For split() and next()
use protocol::messages::{ClientMessage, ServerMessage};
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

// Handle WebSocket upgrade
pub async fn websocket_handler(State(state): State<HubState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: HubState) {
    let connection_id = Uuid::new_v4();
    tracing::info!("New WebSocket connection: {}", connection_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // SEND TASK: ServerMessage -> JSON text frame
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match msg.to_json() {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("Failed to serialize ServerMessage: {}", e);
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let _ = tx.send(ServerMessage::Welcome {
        connection_id,
        replicas: state.list_replicas().await,
    });

    // Receiving loop
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match ClientMessage::from_json(text.as_str()) {
                Ok(client_msg) => {
                    if let Err(e) = handle_client_message(&state, &tx, client_msg).await {
                        tracing::error!("Error handling message: {}", e);
                        let _ = tx.send(ServerMessage::Error {
                            message: e.to_string(),
                        });
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to parse ClientMessage: {}", e);
                    let _ = tx.send(ServerMessage::Error {
                        message: format!("Invalid message format: {}", e),
                    });
                }
            },
            Message::Close(_) => break,
            _ => {} // Ping/pong frames are answered by axum
        }
    }

    send_task.abort();
    tracing::info!("WebSocket connection closed: {}", connection_id);
}

// Handle a client message
async fn handle_client_message(
    state: &HubState,
    tx: &mpsc::UnboundedSender<ServerMessage>,
    message: ClientMessage,
) -> Result<()> {
    match message {
        ClientMessage::CreateReplica { name } => {
            let replica = state.create_replica(name).await?;
            tx.send(ServerMessage::ReplicaCreated { replica })?;
        }

        ClientMessage::Insert {
            replica,
            index,
            value,
        } => {
            let commit = state.insert(&replica, index, value).await?;
            tx.send(ServerMessage::Committed { replica, commit })?;
        }

        ClientMessage::Set {
            replica,
            index,
            value,
        } => {
            let commit = state.set(&replica, index, value).await?;
            tx.send(ServerMessage::Committed { replica, commit })?;
        }

        ClientMessage::Read { replica } => {
            let (items, head) = state.contents(&replica).await?;
            tx.send(ServerMessage::Contents {
                replica,
                items,
                head,
            })?;
        }

        ClientMessage::Fetch { replica, since } => {
            let commits = state.fetch(&replica, since).await?;
            tx.send(ServerMessage::Commits { replica, commits })?;
        }

        ClientMessage::Sync { replica, from } => match state.sync(&replica, &from).await {
            Ok(report) => {
                tx.send(ServerMessage::Synced {
                    replica,
                    from,
                    report,
                })?;
            }
            Err(HubError::Sync { source, commit, .. }) => {
                tx.send(ServerMessage::SyncFailed {
                    replica,
                    from,
                    version: source.version(),
                    reason: source.to_string(),
                    commit: commit.map(|c| *c),
                })?;
            }
            Err(e) => return Err(e.into()),
        },

        ClientMessage::ListReplicas => {
            let replicas = state.list_replicas().await;
            tx.send(ServerMessage::Replicas { replicas })?;
        }

        ClientMessage::Ping => {
            tx.send(ServerMessage::Pong)?;
        }
    }

    Ok(())
}

// Create and configure the server
pub async fn create_server(state: HubState, addr: SocketAddr) -> Result<()> {
    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        .route("/ws", get(websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn send(state: &HubState, message: ClientMessage) -> ServerMessage {
        let (tx, mut rx) = mpsc::unbounded_channel();
        handle_client_message(state, &tx, message).await.unwrap();
        rx.recv().await.unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_through_handler() {
        let state = HubState::new();
        for name in ["alpha", "beta"] {
            send(&state, ClientMessage::CreateReplica { name: name.to_string() }).await;
        }

        let reply = send(
            &state,
            ClientMessage::Insert {
                replica: "beta".to_string(),
                index: 0,
                value: "b1".to_string(),
            },
        )
        .await;
        assert!(matches!(reply, ServerMessage::Committed { ref replica, .. } if replica == "beta"));

        let reply = send(
            &state,
            ClientMessage::Sync {
                replica: "alpha".to_string(),
                from: "beta".to_string(),
            },
        )
        .await;
        match reply {
            ServerMessage::Synced { report, .. } => assert_eq!(report.applied, 1),
            other => panic!("Wrong message type: {:?}", other),
        }

        let reply = send(&state, ClientMessage::Read { replica: "alpha".to_string() }).await;
        match reply {
            ServerMessage::Contents { items, head, .. } => {
                assert_eq!(items, vec!["b1"]);
                assert_eq!(head, 1);
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handler_errors() {
        let state = HubState::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = handle_client_message(
            &state,
            &tx,
            ClientMessage::Read {
                replica: "missing".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Replica not found: missing");
    }
}
