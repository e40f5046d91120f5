//! Auxiliary Store のキーレイアウト

use super::value_object::{Namespace, RoomKey, SessionId, UserId};

/// ストアキーの生成
pub struct StoreKeys;

impl StoreKeys {
    /// ホワイトボード描画ログ（追記リスト）
    pub fn whiteboard_log(session_id: &SessionId) -> String {
        format!("whiteboard-log:{}", session_id)
    }

    /// コード変更履歴（追記リスト、`sessionId:fileId` 単位）
    pub fn code_changes(room: &RoomKey) -> String {
        format!("code-changes:{}", room)
    }

    /// コード変更のリビジョンカウンター（`sessionId:fileId` 単位）
    pub fn code_revision(room: &RoomKey) -> String {
        format!("code-revision:{}", room)
    }

    /// ファイル内容（単一の値）
    pub fn code_file(room: &RoomKey) -> String {
        format!("code-file:{}", room)
    }

    /// カーソル状態（短い TTL）
    pub fn cursor(room: &RoomKey, user_id: &UserId) -> String {
        format!("{}{}", Self::cursor_prefix(room), user_id)
    }

    /// Room 内の全カーソルに共通するプレフィックス
    pub fn cursor_prefix(room: &RoomKey) -> String {
        format!("cursor:{}:", room)
    }

    /// チャット履歴（上限付きリスト）
    pub fn chat(session_id: &SessionId) -> String {
        format!("chat:{}", session_id)
    }

    /// 自動保存スナップショット
    pub fn auto_save(room: &RoomKey) -> String {
        format!("auto-save:{}", room)
    }

    /// クロスインスタンス配信のチャンネル名
    pub fn channel(prefix: &str, namespace: Namespace) -> String {
        format!("{}:{}", prefix, namespace)
    }
}
