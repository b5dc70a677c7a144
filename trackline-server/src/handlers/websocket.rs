use axum::{
    extract::{
        Extension, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};
use trackline_core::{
    ClientEvent, Connection, ConnectionId, ConnectionIdentity, ConnectionRole,
    EstimationError, LocationUpdate, ServerEvent, TopicRouter,
};

use crate::infra::app_state::AppState;

/// Handle WebSocket upgrade request. Authentication already happened in
/// the handshake middleware.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(identity): Extension<ConnectionIdentity>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

/// Releases every topic membership when the socket task ends, however it
/// ends.
struct DisconnectGuard {
    router: Arc<TopicRouter>,
    conn_id: ConnectionId,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let released = self.router.disconnect(self.conn_id);
        debug!(conn_id = %self.conn_id, released, "connection cleaned up");
    }
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    identity: ConnectionIdentity,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (connection, mut rx) =
        Connection::channel(identity, state.config.tracking.outbound_buffer);
    let connection = Arc::new(connection);
    let conn_id = connection.id();

    state.router.register(Arc::clone(&connection));
    let _guard = DisconnectGuard {
        router: Arc::clone(&state.router),
        conn_id,
    };
    info!(
        %conn_id,
        user_id = %connection.identity().user_id,
        role = ?connection.identity().role,
        "websocket connected"
    );

    // Outgoing events
    let mut writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(err) => {
                    warn!(
                        %conn_id,
                        error = %err,
                        "failed to encode outbound event"
                    );
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    loop {
        tokio::select! {
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    handle_frame(&state, &connection, text.as_bytes()).await;
                }
                Some(Ok(Message::Binary(bytes))) => {
                    handle_frame(&state, &connection, &bytes).await;
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    connection.update_ping();
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(err)) => {
                    debug!(%conn_id, error = %err, "websocket read failed");
                    break;
                }
            },
            _ = &mut writer => {
                debug!(%conn_id, "websocket writer stopped");
                break;
            }
        }
    }

    writer.abort();
    info!(%conn_id, "websocket disconnected");
}

async fn handle_frame(state: &AppState, connection: &Connection, raw: &[u8]) {
    match serde_json::from_slice::<ClientEvent>(raw) {
        Ok(event) => dispatch(state, connection, event).await,
        Err(err) => {
            debug!(
                conn_id = %connection.id(),
                error = %err,
                "unreadable client event"
            );
            let _ = connection
                .deliver(ServerEvent::error("Unrecognised event payload."));
        }
    }
}

/// Each role only gets the handlers for its own vocabulary; anything else is
/// ignored.
async fn dispatch(
    state: &AppState,
    connection: &Connection,
    event: ClientEvent,
) {
    let role = connection.identity().role;

    match (role, event) {
        (_, ClientEvent::Ping { timestamp }) => {
            connection.update_ping();
            let _ = connection.deliver(ServerEvent::Pong { timestamp });
        }
        (
            ConnectionRole::Courier,
            ClientEvent::ReportPosition {
                package_id,
                position,
            },
        ) => {
            if !position.is_within_bounds() {
                let _ = connection.deliver(ServerEvent::error(
                    EstimationError::ZeroResults.to_string(),
                ));
                return;
            }
            let update = LocationUpdate {
                package_id,
                position,
            };
            state.coordinator.handle_report(connection, update).await;
        }
        (ConnectionRole::Observer, ClientEvent::Subscribe { package_id }) => {
            state.coordinator.subscribe(connection.id(), &package_id);
        }
        (ConnectionRole::Observer, ClientEvent::Unsubscribe { package_id }) => {
            state.coordinator.unsubscribe(connection.id(), &package_id);
        }
        (role, event) => {
            debug!(
                conn_id = %connection.id(),
                ?role,
                event = ?event,
                "event outside role vocabulary ignored"
            );
        }
    }
}
