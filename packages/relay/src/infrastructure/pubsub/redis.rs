//! Redis pub/sub を使ったクロスインスタンスチャンネル
//!
//! 名前空間ごとに `{prefix}:{namespace}` チャンネルを使い、エンベロープを JSON で流す。
//! publish は共有の `ConnectionManager`、購読は専用の pub/sub 接続で行う。
//! pub/sub 接続が切れたら指数バックオフで再購読し、その間は接続状態を `false` にする。

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::{
    AsyncCommands,
    aio::{ConnectionManager, PubSub},
};
use tokio::sync::{mpsc, watch};

use super::SUBSCRIPTION_BUFFER;
use crate::domain::{
    ChannelError, CrossInstanceChannel, Namespace, RelayEnvelope, StoreKeys, Subscription,
};

/// 再購読の初回待ち時間
const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(500);

/// 再購読の最大待ち時間
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

pub struct RedisCrossInstanceChannel {
    client: redis::Client,
    publisher: ConnectionManager,
    prefix: String,
}

impl RedisCrossInstanceChannel {
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, ChannelError> {
        let client =
            redis::Client::open(url).map_err(|e| ChannelError::SubscribeFailed(e.to_string()))?;
        let publisher = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| ChannelError::PublishFailed(e.to_string()))?;
        Ok(Self {
            client,
            publisher,
            prefix: prefix.into(),
        })
    }

    fn channel_name(&self, namespace: Namespace) -> String {
        StoreKeys::channel(&self.prefix, namespace)
    }
}

#[async_trait]
impl CrossInstanceChannel for RedisCrossInstanceChannel {
    async fn publish(&self, envelope: RelayEnvelope) -> Result<(), ChannelError> {
        let channel = self.channel_name(envelope.namespace);
        let payload = serde_json::to_string(&envelope)
            .map_err(|e| ChannelError::PublishFailed(e.to_string()))?;
        let mut conn = self.publisher.clone();
        let _: i64 = conn
            .publish(&channel, payload)
            .await
            .map_err(|e| ChannelError::PublishFailed(e.to_string()))?;
        Ok(())
    }

    async fn subscribe(&self, namespaces: &[Namespace]) -> Result<Subscription, ChannelError> {
        let channels: Vec<String> = namespaces
            .iter()
            .map(|namespace| self.channel_name(*namespace))
            .collect();
        let pubsub = open_pubsub(&self.client, &channels).await?;

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let (connected_tx, connected_rx) = watch::channel(true);
        let client = self.client.clone();
        let task = tokio::spawn(async move {
            let mut pubsub = pubsub;
            loop {
                if let Forwarding::ReceiverDropped = forward(pubsub, &tx).await {
                    break;
                }
                connected_tx.send_replace(false);
                tracing::error!("Cross-instance subscription lost, resubscribing");
                let Some(reopened) = resubscribe(&client, &channels, &tx).await else {
                    break;
                };
                pubsub = reopened;
                connected_tx.send_replace(true);
                tracing::info!("Cross-instance subscription restored");
            }
            tracing::info!("Cross-instance subscription ended");
        });

        Ok(Subscription::new(rx, task, connected_rx))
    }
}

/// 受信ループの終了理由
enum Forwarding {
    /// pub/sub 接続が切れた
    ConnectionLost,
    /// 購読側（ブリッジ）が終了した
    ReceiverDropped,
}

async fn open_pubsub(client: &redis::Client, channels: &[String]) -> Result<PubSub, ChannelError> {
    let mut pubsub = client
        .get_async_pubsub()
        .await
        .map_err(|e| ChannelError::SubscribeFailed(e.to_string()))?;
    for channel in channels {
        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| ChannelError::SubscribeFailed(e.to_string()))?;
        tracing::info!("Subscribed to cross-instance channel '{}'", channel);
    }
    Ok(pubsub)
}

/// 接続が切れるまでエンベロープを購読側へ流す
async fn forward(pubsub: PubSub, tx: &mpsc::Sender<RelayEnvelope>) -> Forwarding {
    let mut messages = pubsub.into_on_message();
    while let Some(message) = messages.next().await {
        let payload: String = match message.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(
                    "Non-text payload on channel '{}': {}",
                    message.get_channel_name(),
                    e
                );
                continue;
            }
        };
        let envelope: RelayEnvelope = match serde_json::from_str(&payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(
                    "Malformed envelope on channel '{}': {}",
                    message.get_channel_name(),
                    e
                );
                continue;
            }
        };
        if tx.send(envelope).await.is_err() {
            return Forwarding::ReceiverDropped;
        }
    }
    Forwarding::ConnectionLost
}

/// 購読できるまで指数バックオフで再試行する（購読側が終了したら `None`）
async fn resubscribe(
    client: &redis::Client,
    channels: &[String],
    tx: &mpsc::Sender<RelayEnvelope>,
) -> Option<PubSub> {
    let mut delay = INITIAL_RETRY_DELAY;
    loop {
        if tx.is_closed() {
            return None;
        }
        tokio::time::sleep(delay).await;
        match open_pubsub(client, channels).await {
            Ok(pubsub) => return Some(pubsub),
            Err(e) => {
                tracing::error!("Resubscribe failed, retrying in {:?}: {}", delay, e);
                delay = next_retry_delay(delay);
            }
        }
    }
}

fn next_retry_delay(delay: Duration) -> Duration {
    (delay * 2).min(MAX_RETRY_DELAY)
}
