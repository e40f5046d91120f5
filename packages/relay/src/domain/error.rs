//! ドメイン層のエラー型

use thiserror::Error;

/// Value Object の生成エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{kind} must be at most {max} characters")]
    TooLong { kind: &'static str, max: usize },

    #[error("{kind} must not contain '{character}'")]
    InvalidCharacter {
        kind: &'static str,
        character: char,
    },

    #[error("{0} must not be '.' or '..'")]
    DotSegment(&'static str),

    #[error("unknown namespace '{0}'")]
    UnknownNamespace(String),
}

/// Auxiliary Store のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// ストアに到達できない、またはコマンドが失敗した
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// キーに別種の値が格納されている（リスト操作を値キーに行った等）
    #[error("wrong value type at key '{0}'")]
    WrongType(String),

    #[error("failed to encode store value: {0}")]
    Encoding(String),
}

/// クロスインスタンスチャンネルのエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("failed to publish envelope: {0}")]
    PublishFailed(String),

    #[error("failed to subscribe: {0}")]
    SubscribeFailed(String),
}

/// 接続へのメッセージ送信エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PushError {
    #[error("connection '{0}' not found")]
    ConnectionNotFound(String),

    #[error("push failed: {0}")]
    PushFailed(String),
}

/// 外部コラボレーター呼び出しのエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("{0} is not configured")]
    Unavailable(&'static str),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}
