//! Room Registry trait 定義
//!
//! 名前空間ごとに 1 つ存在し、Room キーからその Room に参加している接続への
//! 対応を保持する。UseCase 層はこの trait にのみ依存する。

use tokio::sync::mpsc;

use super::{
    entity::Participant,
    error::PushError,
    value_object::{ConnectionId, RoomKey, UserId},
};

/// 接続へのメッセージ送信チャンネル（エンコード済み JSON）
pub type PusherChannel = mpsc::UnboundedSender<String>;

/// Room に登録された接続
#[derive(Debug, Clone)]
pub struct Member {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    /// クライアントから渡された任意のプロフィール（video の userInfo）
    pub user_info: Option<serde_json::Value>,
    pub sender: PusherChannel,
}

impl From<&Member> for Participant {
    fn from(member: &Member) -> Self {
        Participant {
            connection_id: member.connection_id.clone(),
            user_id: member.user_id.clone(),
            user_info: member.user_info.clone(),
        }
    }
}

/// Room Registry
///
/// 存在しない Room への操作は何もしない（空集合として扱う）。
pub trait RoomRegistry: Send + Sync {
    /// Room に接続を追加し、追加前のメンバーを返す
    ///
    /// 同じユーザーの複数接続はそれぞれ独立に扱う。スナップショットと追加は
    /// 同じ Room ロックの中で行われる。
    fn join(&self, room: &RoomKey, member: Member) -> Vec<Member>;

    /// Room から接続を削除。空になった Room は破棄する
    fn leave(&self, room: &RoomKey, connection_id: &ConnectionId) -> Option<Member>;

    /// 現在のメンバーのスナップショット
    fn members(&self, room: &RoomKey) -> Vec<Member>;

    /// 送信者以外の全メンバーに配信し、配信できた数を返す
    fn broadcast_except(&self, room: &RoomKey, sender: &ConnectionId, payload: &str) -> usize;

    /// 送信者を含む全メンバーに配信し、配信できた数を返す
    fn broadcast_all(&self, room: &RoomKey, payload: &str) -> usize;

    /// 特定の接続に直接配信
    fn send_to(&self, connection_id: &ConnectionId, payload: &str) -> Result<(), PushError>;

    /// Room が存在するか（メンバーが 1 人以上）
    fn contains_room(&self, room: &RoomKey) -> bool;

    /// アクティブな Room 数
    fn room_count(&self) -> usize;

    /// 登録済みの接続数
    fn member_count(&self) -> usize;
}
