//! コード変更の順序付け
//!
//! リビジョンは Auxiliary Store のカウンター（`code-revision:{sessionId}:{fileId}`）から
//! 払い出す。Room が空になってもインスタンスをまたいでも値は繰り返さない。
//! ストアに到達できないときはローカルのクロックで続ける。
//! 変更を文書に適用する操作変換は行わない（変更ストリームをそのまま中継する）。

use dashmap::DashMap;

use super::{
    entity::{CodeChange, CodeEdit},
    value_object::{RoomKey, Timestamp, UserId},
};

#[derive(Debug, Default)]
pub struct ChangeSequencer {
    clocks: DashMap<RoomKey, u64>,
}

impl ChangeSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 次のリビジョンを決める
    ///
    /// ストアのカウンター値 `shared` があればそれを使い、このインスタンスで払い出した値を
    /// 下回る場合はローカルのクロックを 1 進める（Room 内で単調増加）。
    pub fn advance(&self, room: &RoomKey, shared: Option<u64>) -> u64 {
        let mut clock = self.clocks.entry(room.clone()).or_insert(0);
        *clock = match shared {
            Some(shared) if shared > *clock => shared,
            _ => *clock + 1,
        };
        *clock
    }

    /// 現在のクロック値（未使用の Room は 0）
    pub fn current(&self, room: &RoomKey) -> u64 {
        self.clocks.get(room).map(|clock| *clock).unwrap_or(0)
    }

    /// 変更にリビジョンを付与してレコードを作る
    pub fn sequence(
        &self,
        room: &RoomKey,
        shared: Option<u64>,
        id: String,
        user_id: UserId,
        timestamp: Timestamp,
        edit: CodeEdit,
    ) -> CodeChange {
        CodeChange {
            id,
            user_id,
            timestamp,
            revision: self.advance(room, shared),
            edit,
        }
    }

    /// Room が空になったらローカルのクロックを破棄する
    pub fn forget(&self, room: &RoomKey) {
        self.clocks.remove(room);
    }
}
