use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use sqlx::types::Uuid;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use keeper_database::{QueryCriteria, SqlxFilterQuery};
use keeper_runtime::{ClientMessage, GameSession, SessionEvent};

use crate::GlobalState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Missed pongs tolerated before the connection is declared dead.
const MAX_MISSED_PONGS: u8 = 2;
const OUTBOUND_BUFFER: usize = 64;

pub fn ws_routes() -> Router<GlobalState> {
    Router::new().route("/ws", get(ws_handler))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<GlobalState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: GlobalState) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let connection_id = Uuid::new_v4();

    // Single writer task owns the sink; the read loop, the heartbeat, and
    // the broadcast forwarder all feed it through one channel.
    let (out_tx, out_rx) = mpsc::channel::<Message>(OUTBOUND_BUFFER);
    let write_task = tokio::spawn(write_loop(ws_sender, out_rx));

    tracing::info!("[ws] connection {} established", connection_id);

    // Connecting -> Joined(session) -> Closed.
    let mut joined: Option<(Uuid, JoinHandle<()>)> = None;
    let mut missed_pongs: u8 = 0;
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // first tick fires immediately

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if missed_pongs >= MAX_MISSED_PONGS {
                    tracing::info!("[ws] connection {} timed out", connection_id);
                    break;
                }
                missed_pongs += 1;
                if out_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
            incoming = ws_receiver.next() => {
                match incoming {
                    Some(Ok(Message::Pong(_))) => missed_pongs = 0,
                    Some(Ok(Message::Text(text))) => {
                        handle_text(&state, connection_id, &text, &out_tx, &mut joined).await;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = out_tx.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!("[ws] connection {} closed", connection_id);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("[ws] connection {} errored: {}", connection_id, e);
                        break;
                    }
                }
            }
        }
    }

    if let Some((session_id, forward_task)) = joined.take() {
        state.broadcast.leave(session_id, connection_id).await;
        forward_task.abort();
    }
    drop(out_tx);
    let _ = write_task.await;
}

async fn write_loop(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut out_rx: mpsc::Receiver<Message>,
) {
    while let Some(message) = out_rx.recv().await {
        if ws_sender.send(message).await.is_err() {
            break;
        }
    }
}

async fn handle_text(
    state: &GlobalState,
    connection_id: Uuid,
    text: &str,
    out_tx: &mpsc::Sender<Message>,
    joined: &mut Option<(Uuid, JoinHandle<()>)>,
) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("[ws] connection {} sent unparseable message: {}", connection_id, e);
            return;
        }
    };

    match message {
        ClientMessage::JoinSession { session_id, user_id } => {
            let exists = GameSession::find_one_by_criteria(
                QueryCriteria::new().add_valued_filter("id", "=", session_id),
                state.pool(),
            )
            .await;
            match exists {
                Ok(Some(_)) => {}
                Ok(None) => {
                    tracing::warn!("[ws] connection {} tried to join unknown session {}", connection_id, session_id);
                    return;
                }
                Err(e) => {
                    tracing::error!("[ws] session lookup failed: {}", e);
                    return;
                }
            }

            // Leaving any previous session keeps the subscriber sets tidy.
            if let Some((previous, forward_task)) = joined.take() {
                state.broadcast.leave(previous, connection_id).await;
                forward_task.abort();
            }

            let rx = state.broadcast.subscribe(session_id, connection_id).await;
            let forward_task = tokio::spawn(forward_events(rx, out_tx.clone()));
            *joined = Some((session_id, forward_task));

            tracing::info!(
                "[ws] connection {} joined session {} (user {:?})",
                connection_id,
                session_id,
                user_id
            );
        }
        ClientMessage::LeaveSession => {
            if let Some((session_id, forward_task)) = joined.take() {
                state.broadcast.leave(session_id, connection_id).await;
                forward_task.abort();
            }
        }
        ClientMessage::Ping => {
            let _ = out_tx.send(Message::Pong(Bytes::new())).await;
        }
        ClientMessage::Unknown => {
            tracing::debug!("[ws] connection {} sent unknown message type", connection_id);
        }
    }
}

async fn forward_events(mut rx: mpsc::Receiver<SessionEvent>, out_tx: mpsc::Sender<Message>) {
    while let Some(event) = rx.recv().await {
        let Ok(json) = serde_json::to_string(&event) else {
            continue;
        };
        if out_tx.send(Message::Text(json.into())).await.is_err() {
            break;
        }
    }
}
