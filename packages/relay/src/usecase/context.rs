//! 名前空間ハンドラーが共有する依存とヘルパー
//!
//! ## 配信の流れ
//!
//! 状態を持つイベントは次の順で処理する。
//!
//! 1. ローカルの Room Registry へ配信（`deliver`）
//! 2. Auxiliary Store へ反映（ハンドラー側）
//! 3. クロスインスタンスチャンネルへ publish（`replicate`）
//!
//! 2 と 3 の失敗はログに残すだけで、すでに配信したイベントは取り消さない。

use std::sync::Arc;

use atelier_shared::time::Clock;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::error::JoinError;
use crate::{
    config::RelayConfig,
    domain::{
        AuxiliaryStore, Collaborators, ConnectionHandle, ConnectionId, CrossInstanceChannel,
        Membership, Namespace, PusherChannel, RelayEnvelope, RoomKey, RoomRegistry, Timestamp,
    },
    infrastructure::dto::websocket::{JoinRequest, ServerEvent},
};

/// Room 内の配信先
#[derive(Debug, Clone, Copy)]
pub enum Audience<'a> {
    /// 送信者以外の全員
    AllExcept(&'a ConnectionId),
    /// 送信者を含む全員
    All,
}

pub struct RelayContext {
    pub config: RelayConfig,
    pub store: Arc<dyn AuxiliaryStore>,
    pub channel: Arc<dyn CrossInstanceChannel>,
    pub collaborators: Collaborators,
    clock: Arc<dyn Clock>,
}

impl RelayContext {
    pub fn new(
        config: RelayConfig,
        store: Arc<dyn AuxiliaryStore>,
        channel: Arc<dyn CrossInstanceChannel>,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            store,
            channel,
            collaborators,
            clock,
        }
    }

    pub fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }

    /// サーバー側で払い出すレコード ID
    pub fn new_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// join リクエストを検証し、セッション参加者かを確認する
    ///
    /// 確認処理自体の失敗も拒否として扱う。
    pub async fn authorize(
        &self,
        namespace: Namespace,
        request: JoinRequest,
    ) -> Result<(Membership, Option<serde_json::Value>), JoinError> {
        let (membership, user_info) = request.into_membership(namespace)?;
        let session_id = membership.room.session_id();

        match self
            .collaborators
            .access_checker
            .is_participant(session_id, &membership.user_id)
            .await
        {
            Ok(true) => Ok((membership, user_info)),
            Ok(false) => Err(JoinError::AccessDenied {
                session_id: session_id.clone(),
                user_id: membership.user_id,
            }),
            Err(e) => {
                tracing::warn!(
                    "Access check for user '{}' in session '{}' failed: {}",
                    membership.user_id,
                    session_id,
                    e
                );
                Err(JoinError::AccessDenied {
                    session_id: session_id.clone(),
                    user_id: membership.user_id,
                })
            }
        }
    }

    /// 接続 1 本にイベントを送る
    pub fn push(&self, sender: &PusherChannel, event: &ServerEvent) {
        if let Some(payload) = encode(event)
            && sender.send(payload).is_err()
        {
            tracing::debug!("Dropped event for a closed connection");
        }
    }

    pub fn reply(&self, connection: &ConnectionHandle, event: &ServerEvent) {
        self.push(connection.sender(), event);
    }

    /// ローカルの Room に配信し、エンコード済みのペイロードを返す
    pub fn deliver(
        &self,
        registry: &dyn RoomRegistry,
        room: &RoomKey,
        audience: Audience<'_>,
        event: &ServerEvent,
    ) -> Option<String> {
        let payload = encode(event)?;
        let delivered = match audience {
            Audience::AllExcept(sender) => registry.broadcast_except(room, sender, &payload),
            Audience::All => registry.broadcast_all(room, &payload),
        };
        tracing::debug!("Delivered event to {} member(s) of room '{}'", delivered, room);
        Some(payload)
    }

    /// 複製対象の名前空間なら他のインスタンスへ publish する
    pub async fn replicate(&self, namespace: Namespace, room: &RoomKey, payload: String) {
        if !self.config.replicates(namespace) {
            return;
        }
        let envelope = RelayEnvelope {
            origin: self.config.instance_id.clone(),
            namespace,
            room: room.clone(),
            payload,
        };
        if let Err(e) = self.channel.publish(envelope).await {
            tracing::warn!("Failed to replicate {} event for room '{}': {}", namespace, room, e);
        }
    }

    /// 保存を伴わないイベントの配信と複製
    pub async fn announce(
        &self,
        registry: &dyn RoomRegistry,
        namespace: Namespace,
        room: &RoomKey,
        audience: Audience<'_>,
        event: &ServerEvent,
    ) {
        if let Some(payload) = self.deliver(registry, room, audience, event) {
            self.replicate(namespace, room, payload).await;
        }
    }
}

fn encode(event: &ServerEvent) -> Option<String> {
    match event.encode() {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::error!("Failed to encode outbound event: {}", e);
            None
        }
    }
}

/// ストアに保存した JSON を読み出す（壊れたエントリは読み飛ばす）
pub fn decode_entries<T: DeserializeOwned>(key: &str, entries: Vec<String>) -> Vec<T> {
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_str(&entry) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Skipping malformed entry in '{}': {}", key, e);
                None
            }
        })
        .collect()
}

/// ストアに保存する JSON を作る
pub fn encode_entry<T: serde::Serialize>(value: &T) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::error!("Failed to encode store entry: {}", e);
            None
        }
    }
}
