//! WebSocket connection handlers.
//!
//! 名前空間ごとのエンドポイントは同じ接続ループを共有し、受信したフレームを
//! その名前空間のハンドラーに渡す。

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::Response,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use tokio::sync::{mpsc, watch};

use crate::{
    domain::{ConnectionHandle, ConnectionId},
    infrastructure::dto::websocket::{InboundFrame, ServerEvent},
    ui::state::AppState,
    usecase::NamespaceHandler,
};

pub async fn video_socket(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    upgrade(ws, state.video.clone(), &state)
}

pub async fn whiteboard_socket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    upgrade(ws, state.whiteboard.clone(), &state)
}

pub async fn code_socket(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    upgrade(ws, state.code.clone(), &state)
}

pub async fn chat_socket(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    upgrade(ws, state.chat.clone(), &state)
}

fn upgrade<H: NamespaceHandler>(
    ws: WebSocketUpgrade,
    handler: Arc<H>,
    state: &AppState,
) -> Response {
    let shutdown = state.shutdown.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, handler, shutdown))
}

/// Spawns a task that drains the connection's outbound channel into the WebSocket sink.
///
/// When shutdown is signalled a close frame is sent and the task ends.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: SplitSink<WebSocket, Message>,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                outbound = rx.recv() => {
                    let Some(payload) = outbound else {
                        break;
                    };
                    if sender.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                _ = shutdown.changed() => {
                    let frame = CloseFrame {
                        code: close_code::AWAY,
                        reason: "relay shutting down".into(),
                    };
                    if let Err(e) = sender.send(Message::Close(Some(frame))).await {
                        tracing::debug!("Failed to send close frame: {}", e);
                    }
                    break;
                }
            }
        }
    })
}

async fn handle_socket<H: NamespaceHandler>(
    socket: WebSocket,
    handler: Arc<H>,
    shutdown: watch::Receiver<bool>,
) {
    let (sender, mut receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();
    let mut connection = ConnectionHandle::new(ConnectionId::generate(), handler.namespace(), tx);
    tracing::info!(
        "Connection '{}' opened on /{}",
        connection.id(),
        connection.namespace()
    );

    let mut send_task = pusher_loop(rx, sender, shutdown);

    // 受信は接続のタスクで順に処理する（同じ接続のイベント順を保つ）
    loop {
        tokio::select! {
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    dispatch(handler.as_ref(), &mut connection, text.as_str()).await;
                }
                Some(Ok(Message::Close(_))) => {
                    tracing::info!("Connection '{}' requested close", connection.id());
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!("Connection '{}' read error: {}", connection.id(), e);
                    break;
                }
                None => break,
            },
            _ = &mut send_task => break,
        }
    }

    send_task.abort();
    handler.disconnect(&mut connection).await;
    tracing::info!("Connection '{}' closed", connection.id());
}

/// フレームをデコードしてハンドラーに渡す（不正なフレームには `error` を返す）
async fn dispatch<H: NamespaceHandler>(
    handler: &H,
    connection: &mut ConnectionHandle,
    text: &str,
) {
    match InboundFrame::parse(text).and_then(<H::Request>::try_from) {
        Ok(request) => handler.handle(connection, request).await,
        Err(e) => {
            tracing::debug!("Rejected frame from '{}': {}", connection.id(), e);
            match ServerEvent::error(e.to_string()).encode() {
                Ok(payload) => {
                    connection.push_raw(payload);
                }
                Err(e) => tracing::error!("Failed to encode error event: {}", e),
            }
        }
    }
}
