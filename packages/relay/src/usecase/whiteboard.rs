//! UseCase: 共有ホワイトボード
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - join-whiteboard 時の描画ログの再生
//! - draw / erase の配信と追記、clear-board によるログの削除
//!
//! ### なぜこのテストが必要か
//! - 後から参加したユーザーは再生されたログだけで盤面を再構成する
//! - ログは追記順を保ち、erase も解釈せずにそのまま再生する
//!
//! ### どのような状況を想定しているか
//! - 正常系：描画後に参加したユーザーへの再生
//! - 異常系：ストアに到達できない場合（空の状態で参加できる）
//! - エッジケース：clear-board の直後の参加

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    NamespaceHandler,
    context::{Audience, RelayContext, decode_entries, encode_entry},
};
use crate::{
    domain::{
        ConnectionHandle, ConnectionId, DrawingOperation, DrawingShape, Membership, Namespace,
        RoomRegistry, StoreKeys,
    },
    infrastructure::dto::websocket::{JoinRequest, ServerEvent, WhiteboardRequest},
};

pub struct WhiteboardHandler {
    context: Arc<RelayContext>,
    registry: Arc<dyn RoomRegistry>,
}

impl WhiteboardHandler {
    pub fn new(context: Arc<RelayContext>, registry: Arc<dyn RoomRegistry>) -> Self {
        Self { context, registry }
    }

    async fn join(&self, connection: &mut ConnectionHandle, request: JoinRequest) {
        let (membership, _) = match self
            .context
            .authorize(Namespace::Whiteboard, request)
            .await
        {
            Ok(joined) => joined,
            Err(e) => {
                tracing::info!("Rejected whiteboard join on '{}': {}", connection.id(), e);
                self.context.reply(connection, &ServerEvent::error(e.to_string()));
                return;
            }
        };
        self.leave_current(connection).await;

        let Membership { user_id, room } = membership;
        self.registry
            .join(&room, connection.to_member(user_id.clone(), None));
        connection.bind(user_id.clone(), room.clone());

        let key = StoreKeys::whiteboard_log(room.session_id());
        let operations: Vec<DrawingOperation> = match self.context.store.range(&key).await {
            Ok(entries) => decode_entries(&key, entries),
            Err(e) => {
                tracing::warn!("Failed to read whiteboard log '{}': {}", key, e);
                Vec::new()
            }
        };
        tracing::info!(
            "User '{}' joined whiteboard '{}' ({} operations replayed)",
            user_id,
            room,
            operations.len()
        );

        self.context
            .reply(connection, &ServerEvent::WhiteboardState(operations));
        self.context
            .announce(
                self.registry.as_ref(),
                Namespace::Whiteboard,
                &room,
                Audience::AllExcept(connection.id()),
                &ServerEvent::UserJoinedWhiteboard { user_id },
            )
            .await;
    }

    async fn leave_current(&self, connection: &mut ConnectionHandle) {
        if let Some(previous) = connection.unbind() {
            self.depart(connection.id(), previous).await;
        }
    }

    async fn depart(&self, connection_id: &ConnectionId, membership: Membership) {
        let Membership { user_id, room } = membership;
        tracing::info!("User '{}' left whiteboard '{}'", user_id, room);
        self.context
            .announce(
                self.registry.as_ref(),
                Namespace::Whiteboard,
                &room,
                Audience::AllExcept(connection_id),
                &ServerEvent::UserLeftWhiteboard { user_id },
            )
            .await;
        self.registry.leave(&room, connection_id);
    }

    /// 描画・消去の操作を配信して追記する
    async fn record(
        &self,
        connection: &ConnectionHandle,
        membership: Membership,
        shape: DrawingShape,
    ) {
        let Membership { user_id, room } = membership;
        let operation = DrawingOperation {
            id: self.context.new_id(),
            user_id,
            timestamp: self.context.now(),
            shape,
        };
        let event = match operation.shape {
            DrawingShape::Erase { .. } => ServerEvent::Erase(operation.clone()),
            _ => ServerEvent::Draw(operation.clone()),
        };

        let Some(payload) = self.context.deliver(
            self.registry.as_ref(),
            &room,
            Audience::AllExcept(connection.id()),
            &event,
        ) else {
            return;
        };

        let key = StoreKeys::whiteboard_log(room.session_id());
        if let Some(entry) = encode_entry(&operation)
            && let Err(e) = self
                .context
                .store
                .append(&key, entry, Some(self.context.config.history_retention))
                .await
        {
            tracing::warn!("Failed to append to whiteboard log '{}': {}", key, e);
        }

        self.context
            .replicate(Namespace::Whiteboard, &room, payload)
            .await;

        if operation.shape.is_analyzable() {
            let analyzer = self.context.collaborators.content_analyzer.clone();
            let session_id = room.session_id().clone();
            tokio::spawn(async move {
                if let Err(e) = analyzer.analyze(&session_id, &operation).await {
                    tracing::warn!(
                        "Content analysis of operation '{}' failed: {}",
                        operation.id,
                        e
                    );
                }
            });
        }
    }

    async fn clear(&self, connection: &ConnectionHandle, membership: Membership) {
        let Membership { user_id, room } = membership;
        let key = StoreKeys::whiteboard_log(room.session_id());
        if let Err(e) = self.context.store.delete(&key).await {
            tracing::warn!("Failed to clear whiteboard log '{}': {}", key, e);
        }
        tracing::info!("User '{}' cleared whiteboard '{}'", user_id, room);

        self.context
            .announce(
                self.registry.as_ref(),
                Namespace::Whiteboard,
                &room,
                Audience::AllExcept(connection.id()),
                &ServerEvent::BoardCleared {
                    user_id,
                    timestamp: self.context.now(),
                },
            )
            .await;
    }
}

#[async_trait]
impl NamespaceHandler for WhiteboardHandler {
    type Request = WhiteboardRequest;

    fn namespace(&self) -> Namespace {
        Namespace::Whiteboard
    }

    fn registry(&self) -> &Arc<dyn RoomRegistry> {
        &self.registry
    }

    async fn handle(&self, connection: &mut ConnectionHandle, request: WhiteboardRequest) {
        if let WhiteboardRequest::JoinWhiteboard(join) = request {
            self.join(connection, join).await;
            return;
        }
        let Some(membership) = connection.membership().cloned() else {
            tracing::debug!("Ignoring whiteboard event from '{}' before join", connection.id());
            return;
        };

        match request {
            WhiteboardRequest::JoinWhiteboard(_) => {}
            WhiteboardRequest::Draw(shape) => self.record(connection, membership, shape).await,
            WhiteboardRequest::Erase(erase) => {
                self.record(connection, membership, erase.into()).await
            }
            WhiteboardRequest::ClearBoard => self.clear(connection, membership).await,
        }
    }

    async fn disconnect(&self, connection: &mut ConnectionHandle) {
        self.leave_current(connection).await;
    }
}
