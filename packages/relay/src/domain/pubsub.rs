//! クロスインスタンス配信チャンネルの trait 定義
//!
//! 複数のリレーインスタンスが同じ Room の購読者に同じイベントを届けるための
//! publish/subscribe チャンネル。配信は at-least-once で、重複は許容する。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

use super::{
    error::ChannelError,
    value_object::{InstanceId, Namespace, RoomKey},
};

/// チャンネル上を流れるイベント
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayEnvelope {
    /// publish したインスタンス
    pub origin: InstanceId,
    pub namespace: Namespace,
    pub room: RoomKey,
    /// エンコード済みの送信イベント（JSON）
    pub payload: String,
}

/// 購読中のストリーム
///
/// drop するとバックグラウンドの受信タスクが中断され、購読が解除される。
pub struct Subscription {
    receiver: mpsc::Receiver<RelayEnvelope>,
    task: JoinHandle<()>,
    connected: watch::Receiver<bool>,
}

impl Subscription {
    pub fn new(
        receiver: mpsc::Receiver<RelayEnvelope>,
        task: JoinHandle<()>,
        connected: watch::Receiver<bool>,
    ) -> Self {
        Self {
            receiver,
            task,
            connected,
        }
    }

    /// 購読の接続状態（再購読を待っている間は `false`）
    pub fn connection_state(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    /// 次のエンベロープを待つ（購読が終了したら `None`）
    pub async fn next(&mut self) -> Option<RelayEnvelope> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
pub trait CrossInstanceChannel: Send + Sync {
    /// エンベロープを名前空間のチャンネルに publish
    async fn publish(&self, envelope: RelayEnvelope) -> Result<(), ChannelError>;

    /// 指定した名前空間のチャンネルを購読
    async fn subscribe(&self, namespaces: &[Namespace]) -> Result<Subscription, ChannelError>;
}
