//! UseCase 層のエラー型

use thiserror::Error;

use crate::domain::{SessionId, UserId, ValueObjectError};

/// join の失敗（接続は開いたまま、Room には登録されない）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("invalid join request: {0}")]
    InvalidRequest(#[from] ValueObjectError),

    #[error("user '{user_id}' is not a participant of session '{session_id}'")]
    AccessDenied {
        session_id: SessionId,
        user_id: UserId,
    },
}
