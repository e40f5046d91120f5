//! WebSocket メッセージの DTO
//!
//! フレームは `{"event": "<name>", "data": <payload>}` の JSON テキスト。
//! 受信側はまず `InboundFrame` として読み、名前空間ごとのリクエストに振り分ける。

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

use crate::domain::{
    ChatMessage, CodeChange, CodeEdit, ConnectionId, CursorPosition, CursorState,
    DrawingOperation, DrawingShape, ExecutionOutput, FileContent, MessageKind, Participant,
    Selection, Timestamp, UserId,
};

/// 受信フレームのデコードエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("unknown event '{0}'")]
    UnknownEvent(String),

    #[error("invalid payload for '{event}': {reason}")]
    InvalidPayload { event: String, reason: String },
}

/// 受信フレーム
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl InboundFrame {
    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))
    }

    fn payload<T: DeserializeOwned>(self) -> Result<T, DecodeError> {
        serde_json::from_value(self.data).map_err(|e| DecodeError::InvalidPayload {
            event: self.event,
            reason: e.to_string(),
        })
    }
}

// ========================================
// 受信（クライアント → サーバー）
// ========================================

/// 全名前空間に共通の join リクエスト
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub session_id: String,
    pub user_id: String,
    /// code 名前空間でのみ必須
    #[serde(default)]
    pub file_id: Option<String>,
    /// video 名前空間のプロフィール
    #[serde(default)]
    pub user_info: Option<Value>,
}

/// シグナリングの転送先と、中身を解釈しないペイロード
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SignalRequest {
    pub target: String,
    #[serde(flatten)]
    pub body: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ToggleRequest {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VideoRequest {
    JoinRoom(JoinRequest),
    Offer(SignalRequest),
    Answer(SignalRequest),
    IceCandidate(SignalRequest),
    ToggleVideo(ToggleRequest),
    ToggleAudio(ToggleRequest),
    StartScreenShare,
    StopScreenShare,
}

impl TryFrom<InboundFrame> for VideoRequest {
    type Error = DecodeError;

    fn try_from(frame: InboundFrame) -> Result<Self, Self::Error> {
        match frame.event.as_str() {
            "join-room" => frame.payload().map(Self::JoinRoom),
            "offer" => frame.payload().map(Self::Offer),
            "answer" => frame.payload().map(Self::Answer),
            "ice-candidate" => frame.payload().map(Self::IceCandidate),
            "toggle-video" => frame.payload().map(Self::ToggleVideo),
            "toggle-audio" => frame.payload().map(Self::ToggleAudio),
            "start-screen-share" => Ok(Self::StartScreenShare),
            "stop-screen-share" => Ok(Self::StopScreenShare),
            _ => Err(DecodeError::UnknownEvent(frame.event)),
        }
    }
}

/// erase のペイロード（対象や範囲などをそのまま保持する）
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EraseRequest {
    #[serde(flatten)]
    pub payload: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WhiteboardRequest {
    JoinWhiteboard(JoinRequest),
    Draw(DrawingShape),
    Erase(EraseRequest),
    ClearBoard,
}

impl TryFrom<InboundFrame> for WhiteboardRequest {
    type Error = DecodeError;

    fn try_from(frame: InboundFrame) -> Result<Self, Self::Error> {
        match frame.event.as_str() {
            "join-whiteboard" => frame.payload().map(Self::JoinWhiteboard),
            "draw" => frame.payload().map(Self::Draw),
            "erase" => frame.payload().map(Self::Erase),
            "clear-board" => Ok(Self::ClearBoard),
            _ => Err(DecodeError::UnknownEvent(frame.event)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CursorPositionRequest {
    pub position: CursorPosition,
    #[serde(default)]
    pub selection: Option<Selection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecuteCodeRequest {
    pub code: String,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CodeRequest {
    JoinCodeSession(JoinRequest),
    CodeChange(CodeEdit),
    CursorPosition(CursorPositionRequest),
    ExecuteCode(ExecuteCodeRequest),
}

impl TryFrom<InboundFrame> for CodeRequest {
    type Error = DecodeError;

    fn try_from(frame: InboundFrame) -> Result<Self, Self::Error> {
        match frame.event.as_str() {
            "join-code-session" => frame.payload().map(Self::JoinCodeSession),
            "code-change" => frame.payload().map(Self::CodeChange),
            "cursor-position" => frame.payload().map(Self::CursorPosition),
            "execute-code" => frame.payload().map(Self::ExecuteCode),
            _ => Err(DecodeError::UnknownEvent(frame.event)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default, rename = "type")]
    pub kind: MessageKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatRequest {
    JoinChat(JoinRequest),
    SendMessage(SendMessageRequest),
}

impl TryFrom<InboundFrame> for ChatRequest {
    type Error = DecodeError;

    fn try_from(frame: InboundFrame) -> Result<Self, Self::Error> {
        match frame.event.as_str() {
            "join-chat" => frame.payload().map(Self::JoinChat),
            "send-message" => frame.payload().map(Self::SendMessage),
            _ => Err(DecodeError::UnknownEvent(frame.event)),
        }
    }
}

// ========================================
// 送信（サーバー → クライアント）
// ========================================

/// サーバーから送信するイベント
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    // video
    ExistingParticipants(Vec<Participant>),
    UserJoined {
        user_id: UserId,
        #[serde(skip_serializing_if = "Option::is_none")]
        user_info: Option<Value>,
        connection_id: ConnectionId,
    },
    UserLeft {
        user_id: UserId,
        connection_id: ConnectionId,
    },
    Offer(SignalForward),
    Answer(SignalForward),
    IceCandidate(SignalForward),
    UserVideoToggle {
        user_id: UserId,
        enabled: bool,
    },
    UserAudioToggle {
        user_id: UserId,
        enabled: bool,
    },
    UserScreenShare {
        user_id: UserId,
        sharing: bool,
    },
    Error {
        message: String,
    },

    // whiteboard
    WhiteboardState(Vec<DrawingOperation>),
    Draw(DrawingOperation),
    Erase(DrawingOperation),
    BoardCleared {
        user_id: UserId,
        timestamp: Timestamp,
    },
    UserJoinedWhiteboard {
        user_id: UserId,
    },
    UserLeftWhiteboard {
        user_id: UserId,
    },

    // code
    FileContent(FileContent),
    ActiveCursors(Vec<CursorState>),
    CodeChange(CodeChange),
    CursorUpdate(CursorState),
    CollaboratorJoined {
        user_id: UserId,
        connection_id: ConnectionId,
    },
    CollaboratorLeft {
        user_id: UserId,
    },
    CodeExecutionResult {
        executed_by: UserId,
        result: ExecutionOutput,
        timestamp: Timestamp,
    },
    CodeExecutionError {
        message: String,
    },

    // chat
    ChatHistory(Vec<ChatMessage>),
    NewMessage(ChatMessage),
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// 送信用の JSON テキストにエンコード
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// 転送するシグナリングメッセージ（受信したペイロードに送信元を付ける）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalForward {
    pub sender: ConnectionId,
    #[serde(flatten)]
    pub body: serde_json::Map<String, Value>,
}
