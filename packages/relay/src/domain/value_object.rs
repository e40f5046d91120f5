//! Value Object 定義
//!
//! 識別子やメッセージ内容など、不変でバリデーション済みの値を表す型。
//! 生成時に検証を行うため、ドメイン層では常に正しい値として扱える。

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ValueObjectError;

/// 識別子の最大長
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// メッセージ内容の最大長（文字数）
const MAX_MESSAGE_LENGTH: usize = 10_000;

/// Room キーの区切り文字
///
/// 識別子にはこの文字を含めることができない（`sessionId:fileId` の曖昧さを防ぐ）。
pub const ROOM_KEY_SEPARATOR: char = ':';

/// 識別子に使えない文字
///
/// 識別子は外部サービスの URL パスにも埋め込まれる。
const FORBIDDEN_CHARACTERS: [char; 5] = [ROOM_KEY_SEPARATOR, '/', '\\', '?', '#'];

fn validate_identifier(kind: &'static str, value: &str) -> Result<(), ValueObjectError> {
    if value.is_empty() {
        return Err(ValueObjectError::Empty(kind));
    }
    if value.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(ValueObjectError::TooLong {
            kind,
            max: MAX_IDENTIFIER_LENGTH,
        });
    }
    if let Some(character) = value.chars().find(|c| FORBIDDEN_CHARACTERS.contains(c)) {
        return Err(ValueObjectError::InvalidCharacter { kind, character });
    }
    if value == "." || value == ".." {
        return Err(ValueObjectError::DotSegment(kind));
    }
    Ok(())
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// 検証付きで生成
            pub fn new(value: String) -> Result<Self, ValueObjectError> {
                validate_identifier($kind, &value)?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValueObjectError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(
    /// ユーザー ID（ドメインの User ドキュメントの識別子）
    UserId,
    "user id"
);

identifier!(
    /// セッション ID（チュータリングセッションの識別子）
    SessionId,
    "session id"
);

identifier!(
    /// コード共同編集のファイル ID
    FileId,
    "file id"
);

identifier!(
    /// リレーインスタンスの識別子（クロスインスタンス配信の送信元判定に使う）
    InstanceId,
    "instance id"
);

/// AI アシスタントの応答に使う予約ユーザー ID
pub const ASSISTANT_USER_ID: &str = "ai-assistant";

impl UserId {
    /// AI アシスタント用の予約ユーザー
    pub fn assistant() -> Self {
        Self(ASSISTANT_USER_ID.to_string())
    }
}

impl InstanceId {
    /// ランダムなインスタンス ID を生成
    pub fn generate() -> Self {
        Self(format!("relay-{}", Uuid::new_v4().simple()))
    }
}

/// 接続 ID
///
/// トランスポート接続ごとにサーバー側で採番される不透明な識別子。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Room キー
///
/// video / whiteboard / chat ではセッション ID のみ、code では
/// `sessionId:fileId` の複合キーになる。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomKey {
    session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_id: Option<FileId>,
}

impl RoomKey {
    /// セッション単位の Room
    pub fn session(session_id: SessionId) -> Self {
        Self {
            session_id,
            file_id: None,
        }
    }

    /// ファイル単位の Room（コード共同編集）
    pub fn file(session_id: SessionId, file_id: FileId) -> Self {
        Self {
            session_id,
            file_id: Some(file_id),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn file_id(&self) -> Option<&FileId> {
        self.file_id.as_ref()
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file_id {
            Some(file_id) => write!(f, "{}{}{}", self.session_id, ROOM_KEY_SEPARATOR, file_id),
            None => write!(f, "{}", self.session_id),
        }
    }
}

/// 名前空間（コラボレーション面）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Video,
    Whiteboard,
    Code,
    Chat,
}

impl Namespace {
    pub const ALL: [Namespace; 4] = [
        Namespace::Video,
        Namespace::Whiteboard,
        Namespace::Code,
        Namespace::Chat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Video => "video",
            Namespace::Whiteboard => "whiteboard",
            Namespace::Code => "code",
            Namespace::Chat => "chat",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = ValueObjectError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(Namespace::Video),
            "whiteboard" => Ok(Namespace::Whiteboard),
            "code" => Ok(Namespace::Code),
            "chat" => Ok(Namespace::Chat),
            other => Err(ValueObjectError::UnknownNamespace(other.to_string())),
        }
    }
}

/// チャットメッセージの内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageContent(String);

impl MessageContent {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        if value.trim().is_empty() {
            return Err(ValueObjectError::Empty("message content"));
        }
        if value.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ValueObjectError::TooLong {
                kind: "message content",
                max: MAX_MESSAGE_LENGTH,
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// メンショントークンを含むか（大文字小文字は区別しない）
    pub fn mentions(&self, token: &str) -> bool {
        !token.is_empty() && self.0.to_lowercase().contains(&token.to_lowercase())
    }
}

impl TryFrom<String> for MessageContent {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MessageContent> for String {
    fn from(value: MessageContent) -> Self {
        value.0
    }
}

/// Unix タイムスタンプ（UTC, ミリ秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(millis: i64) -> Self {
        Self(millis)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}
