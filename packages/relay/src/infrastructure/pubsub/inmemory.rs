//! インメモリ クロスインスタンスチャンネル
//!
//! clone したチャンネル同士は同じ `broadcast` バスを共有する。同一プロセス内で
//! 複数のリレーを起動し、Redis なしでインスタンス間配信を再現するために使う。
//! publish したインスタンス自身にも配信される（Redis と同じ振る舞い）。

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, watch};

use super::SUBSCRIPTION_BUFFER;
use crate::domain::{ChannelError, CrossInstanceChannel, Namespace, RelayEnvelope, Subscription};

/// バス上で保持するエンベロープ数（遅れた購読者はこれを超えると取りこぼす）
const BUS_CAPACITY: usize = 4096;

#[derive(Clone)]
pub struct InMemoryCrossInstanceChannel {
    bus: broadcast::Sender<RelayEnvelope>,
}

impl InMemoryCrossInstanceChannel {
    pub fn new() -> Self {
        let (bus, _) = broadcast::channel(BUS_CAPACITY);
        Self { bus }
    }
}

impl Default for InMemoryCrossInstanceChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CrossInstanceChannel for InMemoryCrossInstanceChannel {
    async fn publish(&self, envelope: RelayEnvelope) -> Result<(), ChannelError> {
        // 購読者がいないときの送信エラーは配信先なしとして扱う
        let _ = self.bus.send(envelope);
        Ok(())
    }

    async fn subscribe(&self, namespaces: &[Namespace]) -> Result<Subscription, ChannelError> {
        let mut bus = self.bus.subscribe();
        let namespaces = namespaces.to_vec();
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

        let task = tokio::spawn(async move {
            loop {
                match bus.recv().await {
                    Ok(envelope) => {
                        if !namespaces.contains(&envelope.namespace) {
                            continue;
                        }
                        if tx.send(envelope).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Cross-instance subscriber lagged, {} envelopes dropped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        // プロセス内のバスは切断されない
        let (_, connected) = watch::channel(true);
        Ok(Subscription::new(rx, task, connected))
    }
}
