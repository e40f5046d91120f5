//! 接続ハンドル
//!
//! トランスポート接続 1 本につき 1 つ。参加（join）が成功した時点で
//! ユーザーと Room の組が一度に設定される。

use super::{
    registry::{Member, PusherChannel},
    value_object::{ConnectionId, Namespace, RoomKey, UserId},
};

/// join 済みの接続が属する Room とユーザー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub user_id: UserId,
    pub room: RoomKey,
}

#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    namespace: Namespace,
    sender: PusherChannel,
    membership: Option<Membership>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, namespace: Namespace, sender: PusherChannel) -> Self {
        Self {
            id,
            namespace,
            sender,
            membership: None,
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn sender(&self) -> &PusherChannel {
        &self.sender
    }

    pub fn membership(&self) -> Option<&Membership> {
        self.membership.as_ref()
    }

    pub fn is_joined(&self) -> bool {
        self.membership.is_some()
    }

    /// join 成功時に呼ぶ
    pub fn bind(&mut self, user_id: UserId, room: RoomKey) {
        self.membership = Some(Membership { user_id, room });
    }

    /// Room から外れたときに呼ぶ
    pub fn unbind(&mut self) -> Option<Membership> {
        self.membership.take()
    }

    /// この接続に直接送信（切断済みなら false）
    pub fn push_raw(&self, payload: String) -> bool {
        self.sender.send(payload).is_ok()
    }

    /// Registry に登録するメンバー情報を作る
    pub fn to_member(&self, user_id: UserId, user_info: Option<serde_json::Value>) -> Member {
        Member {
            connection_id: self.id.clone(),
            user_id,
            user_info,
            sender: self.sender.clone(),
        }
    }
}
