//! UseCase: セッションチャット
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - join-chat で直近の履歴が古い順に届くこと
//! - send-message が送信者を含む全員に届き、履歴が上限件数で切り詰められること
//! - `@ai` メンションへのアシスタント応答
//!
//! ### なぜこのテストが必要か
//! - 後から参加したユーザーは履歴で会話に追いつく
//! - 履歴はセッションごとに上限件数を超えてはいけない
//!
//! ### どのような状況を想定しているか
//! - 正常系：メッセージの送受信、アシスタントの応答
//! - 異常系：空のメッセージ
//! - エッジケース：上限ちょうどを超える送信

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    NamespaceHandler,
    context::{Audience, RelayContext, decode_entries, encode_entry},
};
use crate::{
    domain::{
        ChatMessage, ConnectionHandle, MessageContent, MessageKind, Membership, Namespace,
        RoomKey, RoomRegistry, StoreKeys, UserId,
    },
    infrastructure::dto::websocket::{ChatRequest, JoinRequest, SendMessageRequest, ServerEvent},
};

pub struct ChatHandler {
    context: Arc<RelayContext>,
    registry: Arc<dyn RoomRegistry>,
}

impl ChatHandler {
    pub fn new(context: Arc<RelayContext>, registry: Arc<dyn RoomRegistry>) -> Self {
        Self { context, registry }
    }

    async fn join(&self, connection: &mut ConnectionHandle, request: JoinRequest) {
        let (membership, _) = match self.context.authorize(Namespace::Chat, request).await {
            Ok(joined) => joined,
            Err(e) => {
                tracing::info!("Rejected chat join on '{}': {}", connection.id(), e);
                self.context.reply(connection, &ServerEvent::error(e.to_string()));
                return;
            }
        };
        self.leave_current(connection);

        let Membership { user_id, room } = membership;
        self.registry
            .join(&room, connection.to_member(user_id.clone(), None));
        connection.bind(user_id.clone(), room.clone());
        tracing::info!("User '{}' joined chat '{}'", user_id, room);

        let key = StoreKeys::chat(room.session_id());
        let history = match self.context.store.range(&key).await {
            Ok(entries) => decode_entries(&key, entries),
            Err(e) => {
                tracing::warn!("Failed to read chat history '{}': {}", key, e);
                Vec::new()
            }
        };
        self.context
            .reply(connection, &ServerEvent::ChatHistory(history));
    }

    fn leave_current(&self, connection: &mut ConnectionHandle) {
        if let Some(Membership { user_id, room }) = connection.unbind() {
            tracing::info!("User '{}' left chat '{}'", user_id, room);
            self.registry.leave(&room, connection.id());
        }
    }

    async fn send(
        &self,
        connection: &ConnectionHandle,
        membership: Membership,
        request: SendMessageRequest,
    ) {
        let (content, kind): (MessageContent, MessageKind) = match request.try_into() {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!("Rejected chat message from '{}': {}", connection.id(), e);
                self.context
                    .reply(connection, &ServerEvent::error(e.to_string()));
                return;
            }
        };
        let Membership { user_id, room } = membership;
        let wants_assistant = content.mentions(&self.context.config.assistant_mention);

        let message = ChatMessage {
            id: self.context.new_id(),
            user_id: user_id.clone(),
            content,
            kind,
            timestamp: self.context.now(),
        };
        let prompt = message.content.as_str().to_string();
        post(&self.context, self.registry.as_ref(), &room, message).await;

        if wants_assistant {
            self.summon_assistant(room, user_id, prompt);
        }
    }

    /// アシスタントの応答は別タスクで待つ
    fn summon_assistant(&self, room: RoomKey, user_id: UserId, prompt: String) {
        let context = self.context.clone();
        let registry = self.registry.clone();

        tokio::spawn(async move {
            let reply = match context
                .collaborators
                .assistant
                .respond(room.session_id(), &user_id, &prompt)
                .await
            {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!("AI assistant failed for user '{}': {}", user_id, e);
                    return;
                }
            };
            let content = match MessageContent::new(reply) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!("Discarding AI assistant reply in '{}': {}", room, e);
                    return;
                }
            };
            let message = ChatMessage {
                id: context.new_id(),
                user_id: UserId::assistant(),
                content,
                kind: MessageKind::AiResponse,
                timestamp: context.now(),
            };
            post(&context, registry.as_ref(), &room, message).await;
        });
    }
}

/// 全員への配信と履歴への追記
async fn post(
    context: &RelayContext,
    registry: &dyn RoomRegistry,
    room: &RoomKey,
    message: ChatMessage,
) {
    let Some(entry) = encode_entry(&message) else {
        return;
    };
    let Some(payload) = context.deliver(
        registry,
        room,
        Audience::All,
        &ServerEvent::NewMessage(message),
    ) else {
        return;
    };

    let key = StoreKeys::chat(room.session_id());
    if let Err(e) = context
        .store
        .append_capped(&key, entry, context.config.chat_capacity)
        .await
    {
        tracing::warn!("Failed to append to chat history '{}': {}", key, e);
    }
    context.replicate(Namespace::Chat, room, payload).await;
}

#[async_trait]
impl NamespaceHandler for ChatHandler {
    type Request = ChatRequest;

    fn namespace(&self) -> Namespace {
        Namespace::Chat
    }

    fn registry(&self) -> &Arc<dyn RoomRegistry> {
        &self.registry
    }

    async fn handle(&self, connection: &mut ConnectionHandle, request: ChatRequest) {
        match request {
            ChatRequest::JoinChat(join) => self.join(connection, join).await,
            ChatRequest::SendMessage(message) => {
                let Some(membership) = connection.membership().cloned() else {
                    tracing::debug!(
                        "Ignoring chat message from '{}' before join",
                        connection.id()
                    );
                    return;
                };
                self.send(connection, membership, message).await;
            }
        }
    }

    async fn disconnect(&self, connection: &mut ConnectionHandle) {
        self.leave_current(connection);
    }
}
