//! リレーの設定値

use std::time::Duration;

use crate::domain::{InstanceId, Namespace};

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// クロスインスタンス配信で自分の publish を識別する ID
    pub instance_id: InstanceId,
    /// ホワイトボード描画ログ・コード変更履歴の保持期間
    pub history_retention: Duration,
    pub cursor_ttl: Duration,
    pub auto_save_ttl: Duration,
    /// Room ごとに保持するチャット履歴の件数
    pub chat_capacity: usize,
    /// コード実行のタイムアウト
    pub execution_timeout: Duration,
    /// ファイル内容が未保存のときの言語
    pub default_language: String,
    /// AI アシスタントを呼び出すメンション
    pub assistant_mention: String,
    /// インスタンス間で複製する名前空間
    pub replicated_namespaces: Vec<Namespace>,
    /// pub/sub チャンネル名のプレフィックス
    pub channel_prefix: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            instance_id: InstanceId::generate(),
            history_retention: Duration::from_secs(24 * 60 * 60),
            cursor_ttl: Duration::from_secs(30),
            auto_save_ttl: Duration::from_secs(5 * 60),
            chat_capacity: 100,
            execution_timeout: Duration::from_secs(30),
            default_language: "javascript".to_string(),
            assistant_mention: "@ai".to_string(),
            replicated_namespaces: vec![Namespace::Whiteboard, Namespace::Code],
            channel_prefix: "relay".to_string(),
        }
    }
}

impl RelayConfig {
    pub fn replicates(&self, namespace: Namespace) -> bool {
        self.replicated_namespaces.contains(&namespace)
    }
}
