//! UseCase: クロスインスタンスの再配信
//!
//! 他のインスタンスが publish したイベントを、このインスタンスのローカル接続へ
//! そのまま配信する。自分が publish したエンベロープは無視し、再 publish はしない。

use std::{collections::HashMap, sync::Arc};

use tokio::{
    sync::watch,
    task::{AbortHandle, JoinHandle},
};

use crate::domain::{InstanceId, Namespace, RelayEnvelope, RoomRegistry, Subscription};

/// インスタンス間配信の状態（`/api/health` で報告する）
#[derive(Clone)]
pub struct ReplicationHealth {
    connected: watch::Receiver<bool>,
    bridge: AbortHandle,
}

impl ReplicationHealth {
    /// 購読が接続中で、ブリッジのタスクが動いているか
    pub fn is_connected(&self) -> bool {
        !self.bridge.is_finished() && *self.connected.borrow()
    }
}

pub struct CrossInstanceBridge {
    instance_id: InstanceId,
    registries: HashMap<Namespace, Arc<dyn RoomRegistry>>,
}

impl CrossInstanceBridge {
    pub fn new(
        instance_id: InstanceId,
        registries: HashMap<Namespace, Arc<dyn RoomRegistry>>,
    ) -> Self {
        Self {
            instance_id,
            registries,
        }
    }

    /// エンベロープをローカルの Room に配信し、配信できた接続数を返す
    pub fn replay(&self, envelope: &RelayEnvelope) -> usize {
        if envelope.origin == self.instance_id {
            return 0;
        }
        let Some(registry) = self.registries.get(&envelope.namespace) else {
            tracing::debug!("No local registry for namespace '{}'", envelope.namespace);
            return 0;
        };
        let delivered = registry.broadcast_all(&envelope.room, &envelope.payload);
        tracing::debug!(
            "Replayed {} event from '{}' to {} member(s) of room '{}'",
            envelope.namespace,
            envelope.origin,
            delivered,
            envelope.room
        );
        delivered
    }

    /// 購読を消費するタスクを起動する
    pub fn spawn(self, mut subscription: Subscription) -> (JoinHandle<()>, ReplicationHealth) {
        let connected = subscription.connection_state();
        let task = tokio::spawn(async move {
            while let Some(envelope) = subscription.next().await {
                self.replay(&envelope);
            }
            tracing::error!("Cross-instance subscription ended, replication stopped");
        });
        let health = ReplicationHealth {
            connected,
            bridge: task.abort_handle(),
        };
        (task, health)
    }
}
