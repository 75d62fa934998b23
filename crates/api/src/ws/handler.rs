use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use serde_json::json;

use conseq_events::Broker;

/// Interval between keep-alive pings on each connection.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Gateway routes. Stateless from the application's point of view — the
/// broker is the only thing a connection needs.
pub fn router(broker: Arc<Broker>) -> Router {
    Router::new()
        .route("/ws/job/{session_id}", get(ws_handler))
        .with_state(broker)
}

/// HTTP handler that upgrades the connection to WebSocket.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(broker): State<Arc<Broker>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, broker, session_id))
}

/// Manage a single viewer connection after upgrade.
///
/// Joins the session group, sends one synthetic "connected" notification
/// to this connection only (not broadcast), then:
///   1. Spawns a sender task forwarding group updates to the socket,
///      wrapped as `{"message": <event>}`, with periodic keep-alive
///      pings.
///   2. Re-publishes every inbound JSON message verbatim to the group
///      (peer-to-peer relay; the content is not interpreted).
///   3. Leaves the group on disconnect.
async fn handle_socket(socket: WebSocket, broker: Arc<Broker>, session_id: String) {
    let group = format!("job_{session_id}");
    let conn_id = uuid::Uuid::new_v4().to_string();

    let (subscriber, mut updates) = broker.join(&group).await;
    tracing::info!(conn_id = %conn_id, group = %group, "Viewer connected");

    let (mut sink, mut stream) = socket.split();

    let hello = json!({
        "message": {"type": "notification", "content": "Connected to job session."}
    });
    if sink
        .send(Message::Text(hello.to_string().into()))
        .await
        .is_err()
    {
        broker.leave(&group, subscriber).await;
        return;
    }

    // Sender task: forward group updates to the socket and keep the
    // connection alive between them.
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval(PING_INTERVAL);
        ping.tick().await; // the first tick fires immediately
        loop {
            tokio::select! {
                update = updates.recv() => match update {
                    Some(event) => {
                        let payload = json!({"message": event});
                        if sink
                            .send(Message::Text(payload.to_string().into()))
                            .await
                            .is_err()
                        {
                            tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                            break;
                        }
                    }
                    // Subscription dropped (broker shutdown): close cleanly.
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                },
                _ = ping.tick() => {
                    if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Receiver loop: relay inbound messages to the group.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(Message::Text(text)) => match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(content) => {
                    broker.publish(&group, content).await;
                }
                Err(e) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "Ignoring non-JSON message");
                }
            },
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Clean up: leave the group and stop the sender task.
    broker.leave(&group, subscriber).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "Viewer disconnected");
}
