//! Relay execution logic.

use std::{collections::HashMap, future::Future, sync::Arc};

use axum::{Router, routing::get};
use tokio::{net::TcpListener, sync::watch};
use tower_http::trace::TraceLayer;

use crate::{
    domain::{Namespace, RoomRegistry},
    error::RelayError,
    infrastructure::registry::InMemoryRoomRegistry,
    usecase::{
        ChatHandler, CodeHandler, CrossInstanceBridge, NamespaceHandler, RelayContext,
        VideoHandler, WhiteboardHandler,
    },
};

use super::{
    handler::{chat_socket, code_socket, health_check, stats, video_socket, whiteboard_socket},
    signal::shutdown_signal,
    state::AppState,
};

/// Collaboration relay
///
/// Owns one handler (and one room registry) per namespace, the cross-instance
/// bridge and the HTTP/WebSocket listener.
///
/// # Example
///
/// ```ignore
/// let supervisor = RelaySupervisor::new(Arc::new(context));
/// supervisor.run("127.0.0.1".to_string(), 3001).await?;
/// ```
pub struct RelaySupervisor {
    context: Arc<RelayContext>,
    video: Arc<VideoHandler>,
    whiteboard: Arc<WhiteboardHandler>,
    code: Arc<CodeHandler>,
    chat: Arc<ChatHandler>,
    registries: HashMap<Namespace, Arc<dyn RoomRegistry>>,
}

impl RelaySupervisor {
    pub fn new(context: Arc<RelayContext>) -> Self {
        let video = Arc::new(VideoHandler::new(context.clone(), new_registry()));
        let whiteboard = Arc::new(WhiteboardHandler::new(context.clone(), new_registry()));
        let code = Arc::new(CodeHandler::new(context.clone(), new_registry()));
        let chat = Arc::new(ChatHandler::new(context.clone(), new_registry()));
        let registries = HashMap::from([
            (Namespace::Video, video.registry().clone()),
            (Namespace::Whiteboard, whiteboard.registry().clone()),
            (Namespace::Code, code.registry().clone()),
            (Namespace::Chat, chat.registry().clone()),
        ]);

        Self {
            context,
            video,
            whiteboard,
            code,
            chat,
            registries,
        }
    }

    /// Bind to `host:port` and serve until Ctrl+C or SIGTERM
    ///
    /// # Errors
    ///
    /// Returns an error if the relay fails to bind, cannot reach the store or
    /// cannot subscribe to the cross-instance channel.
    pub async fn run(self, host: String, port: u16) -> Result<(), RelayError> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|source| RelayError::Bind {
                addr: bind_addr.clone(),
                source,
            })?;
        tracing::info!("Press Ctrl+C to shutdown gracefully");
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), RelayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // 1. Auxiliary Store への到達確認（失敗したら起動しない）
        self.context.store.ping().await?;

        // 2. 他のインスタンスからのイベントを購読
        let replicated = self.context.config.replicated_namespaces.clone();
        let (bridge, replication) = if replicated.is_empty() {
            (None, None)
        } else {
            let subscription = self.context.channel.subscribe(&replicated).await?;
            let bridge = CrossInstanceBridge::new(
                self.context.config.instance_id.clone(),
                self.registries.clone(),
            );
            let (task, health) = bridge.spawn(subscription);
            (Some(task), Some(health))
        };

        // 3. ルーティング
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let context = self.context.clone();
        let app_state = Arc::new(AppState {
            context: self.context,
            video: self.video,
            whiteboard: self.whiteboard,
            code: self.code,
            chat: self.chat,
            shutdown: shutdown_rx,
            replication,
        });
        let app = Router::new()
            // WebSocket エンドポイント
            .route("/video", get(video_socket))
            .route("/whiteboard", get(whiteboard_socket))
            .route("/code", get(code_socket))
            .route("/chat", get(chat_socket))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/stats", get(stats))
            .layer(TraceLayer::new_for_http())
            .with_state(app_state);

        tracing::info!(
            "Relay '{}' listening on {} (replicating: {:?})",
            context.config.instance_id,
            listener.local_addr()?,
            replicated
        );

        // 4. シャットダウン時は全ての接続に close を送る
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                if shutdown_tx.send(true).is_err() {
                    tracing::debug!("No open connections at shutdown");
                }
            })
            .await?;

        if let Some(bridge) = bridge {
            bridge.abort();
        }
        if let Err(e) = context.store.close().await {
            tracing::warn!("Failed to close the auxiliary store: {}", e);
        }
        tracing::info!("Relay shutdown complete");

        Ok(())
    }
}

fn new_registry() -> Arc<dyn RoomRegistry> {
    Arc::new(InMemoryRoomRegistry::new())
}
