//! DTO とドメインモデルの変換

use serde_json::Value;

use crate::domain::{
    ConnectionId, CursorState, DrawingShape, FileId, Membership, MessageContent, MessageKind,
    Namespace, RESERVED_OPERATION_FIELDS, RoomKey, SessionId, Timestamp, UserId, ValueObjectError,
};
use crate::infrastructure::dto::websocket as dto;

// ========================================
// DTO → Domain
// ========================================

impl dto::JoinRequest {
    /// join 先の Room とユーザーに変換する
    ///
    /// code 名前空間では `fileId` が必須で、Room キーは `sessionId:fileId` になる。
    pub fn into_membership(
        self,
        namespace: Namespace,
    ) -> Result<(Membership, Option<Value>), ValueObjectError> {
        let session_id = SessionId::new(self.session_id)?;
        let user_id = UserId::new(self.user_id)?;
        let room = match namespace {
            Namespace::Code => {
                let file_id = self.file_id.ok_or(ValueObjectError::Empty("file id"))?;
                RoomKey::file(session_id, FileId::new(file_id)?)
            }
            _ => RoomKey::session(session_id),
        };
        Ok((Membership { user_id, room }, self.user_info))
    }
}

impl dto::SignalRequest {
    /// 転送先と、送信元を付けた転送メッセージに分ける
    ///
    /// クライアントが送ってきた `sender` は捨てて、接続 ID で上書きする。
    pub fn into_forward(self, sender: ConnectionId) -> (ConnectionId, dto::SignalForward) {
        let mut body = self.body;
        body.remove("sender");
        (
            ConnectionId::from(self.target),
            dto::SignalForward { sender, body },
        )
    }
}

impl From<dto::EraseRequest> for DrawingShape {
    /// サーバーが付与するフィールドを取り除き、残りはそのまま中継する
    fn from(request: dto::EraseRequest) -> Self {
        let mut payload = request.payload;
        for field in RESERVED_OPERATION_FIELDS {
            payload.remove(field);
        }
        DrawingShape::Erase { payload }
    }
}

impl dto::CursorPositionRequest {
    pub fn into_cursor(self, user_id: UserId, timestamp: Timestamp) -> CursorState {
        CursorState {
            user_id,
            position: self.position,
            selection: self.selection,
            timestamp,
        }
    }
}

impl TryFrom<dto::SendMessageRequest> for (MessageContent, MessageKind) {
    type Error = ValueObjectError;

    fn try_from(request: dto::SendMessageRequest) -> Result<Self, Self::Error> {
        Ok((MessageContent::new(request.content)?, request.kind))
    }
}
