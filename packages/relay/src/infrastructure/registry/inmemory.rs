//! インメモリ Room Registry 実装
//!
//! ## 責務
//!
//! - Room キーごとのメンバー（接続と `UnboundedSender`）の管理
//! - Room 内へのブロードキャストと、接続 ID 指定の直接送信
//!
//! ## 設計ノート
//!
//! Room 単位のロックになるよう `DashMap`（シャード化された並行マップ）を使う。
//! 無関係な Room の join / leave / broadcast が 1 つのロックで直列化されることはない。
//!
//! 配信は各メンバーの unbounded チャンネルへの送信なので待ちが発生しない。
//! 同じ宛先に対しては Registry が送信した順に届く（宛先ごとの FIFO）。

use dashmap::DashMap;

use crate::domain::{ConnectionId, Member, PushError, PusherChannel, RoomKey, RoomRegistry};

/// インメモリ Room Registry
///
/// ## フィールド
///
/// - `rooms`: Room キー → 参加順のメンバー一覧
/// - `connections`: 接続 ID → sender（直接送信用）
#[derive(Default)]
pub struct InMemoryRoomRegistry {
    rooms: DashMap<RoomKey, Vec<Member>>,
    connections: DashMap<ConnectionId, PusherChannel>,
}

impl InMemoryRoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn deliver(member: &Member, payload: &str) -> bool {
        match member.sender.send(payload.to_string()) {
            Ok(()) => true,
            Err(e) => {
                // ブロードキャストでは一部の送信失敗を許容
                tracing::debug!(
                    "Failed to push message to connection '{}': {}",
                    member.connection_id,
                    e
                );
                false
            }
        }
    }
}

impl RoomRegistry for InMemoryRoomRegistry {
    fn join(&self, room: &RoomKey, member: Member) -> Vec<Member> {
        self.connections
            .insert(member.connection_id.clone(), member.sender.clone());
        tracing::debug!(
            "Connection '{}' (user '{}') joined room '{}'",
            member.connection_id,
            member.user_id,
            room
        );
        let mut members = self.rooms.entry(room.clone()).or_default();
        let existing = members.value().clone();
        members.push(member);
        existing
    }

    fn leave(&self, room: &RoomKey, connection_id: &ConnectionId) -> Option<Member> {
        let removed = match self.rooms.get_mut(room) {
            Some(mut members) => members
                .iter()
                .position(|m| &m.connection_id == connection_id)
                .map(|index| members.remove(index)),
            None => None,
        };
        self.rooms.remove_if(room, |_, members| members.is_empty());
        self.connections.remove(connection_id);

        if removed.is_some() {
            tracing::debug!("Connection '{}' left room '{}'", connection_id, room);
        }
        removed
    }

    fn members(&self, room: &RoomKey) -> Vec<Member> {
        self.rooms
            .get(room)
            .map(|members| members.clone())
            .unwrap_or_default()
    }

    fn broadcast_except(&self, room: &RoomKey, sender: &ConnectionId, payload: &str) -> usize {
        let Some(members) = self.rooms.get(room) else {
            return 0;
        };
        members
            .iter()
            .filter(|m| &m.connection_id != sender)
            .filter(|m| Self::deliver(m, payload))
            .count()
    }

    fn broadcast_all(&self, room: &RoomKey, payload: &str) -> usize {
        let Some(members) = self.rooms.get(room) else {
            return 0;
        };
        members.iter().filter(|m| Self::deliver(m, payload)).count()
    }

    fn send_to(&self, connection_id: &ConnectionId, payload: &str) -> Result<(), PushError> {
        let sender = self
            .connections
            .get(connection_id)
            .ok_or_else(|| PushError::ConnectionNotFound(connection_id.to_string()))?;
        sender
            .send(payload.to_string())
            .map_err(|e| PushError::PushFailed(e.to_string()))
    }

    fn contains_room(&self, room: &RoomKey) -> bool {
        self.rooms.contains_key(room)
    }

    fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn member_count(&self) -> usize {
        self.rooms.iter().map(|entry| entry.value().len()).sum()
    }
}
