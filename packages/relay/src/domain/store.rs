//! Auxiliary Store trait 定義
//!
//! 履歴ログ・カーソル・チャット履歴などの一時状態を保持するキー/値 + リストストアの
//! インターフェース。具体的な実装（Redis, インメモリ）は Infrastructure 層が提供する。
//!
//! 全ての操作は単一キーに対する読み書きで、ストア側の単一キー原子性のみを前提とする。

use std::time::Duration;

use async_trait::async_trait;

use super::error::StoreError;

#[async_trait]
pub trait AuxiliaryStore: Send + Sync {
    /// 接続確認（起動時に到達できなければ致命的エラー）
    async fn ping(&self) -> Result<(), StoreError>;

    /// リスト末尾に追記し、`retention` があればキー全体の有効期限を更新する
    async fn append(
        &self,
        key: &str,
        value: String,
        retention: Option<Duration>,
    ) -> Result<(), StoreError>;

    /// リスト末尾に追記し、最新 `capacity` 件だけを残す
    async fn append_capped(
        &self,
        key: &str,
        value: String,
        capacity: usize,
    ) -> Result<(), StoreError>;

    /// リスト全体を挿入順（古い順）で取得
    async fn range(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// 単一の値を上書き保存
    async fn put(&self, key: &str, value: String, ttl: Option<Duration>)
    -> Result<(), StoreError>;

    /// 単一の値を取得
    async fn fetch(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// カウンターを 1 進めて新しい値を返す（キーがなければ 1）
    ///
    /// `ttl` があればキーの有効期限を更新する。
    async fn increment(&self, key: &str, ttl: Option<Duration>) -> Result<u64, StoreError>;

    /// プレフィックスに一致する有効な値を全て取得
    async fn fetch_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError>;

    /// キーを削除（存在しなくてもエラーにしない）
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// 接続を閉じる（シャットダウン時）
    async fn close(&self) -> Result<(), StoreError>;
}
