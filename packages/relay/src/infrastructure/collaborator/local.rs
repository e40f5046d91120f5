//! ローカルのフォールバック実装
//!
//! 外部サービスのない開発環境向け。

use async_trait::async_trait;

use crate::domain::{
    AiAssistant, CodeExecutor, CollaboratorError, ContentAnalyzer, DrawingOperation,
    ExecutionOutput, SessionAccessChecker, SessionId, SessionStatusUpdater, UserId,
};

/// 全てのユーザーを参加者として扱う
pub struct OpenAccessChecker;

#[async_trait]
impl SessionAccessChecker for OpenAccessChecker {
    async fn is_participant(
        &self,
        _session_id: &SessionId,
        _user_id: &UserId,
    ) -> Result<bool, CollaboratorError> {
        Ok(true)
    }
}

pub struct NoopStatusUpdater;

#[async_trait]
impl SessionStatusUpdater for NoopStatusUpdater {
    async fn mark_active(&self, session_id: &SessionId) -> Result<(), CollaboratorError> {
        tracing::debug!("Session '{}' marked active (no session service)", session_id);
        Ok(())
    }
}

pub struct UnavailableExecutor;

#[async_trait]
impl CodeExecutor for UnavailableExecutor {
    async fn execute(
        &self,
        _code: &str,
        _language: &str,
    ) -> Result<ExecutionOutput, CollaboratorError> {
        Err(CollaboratorError::Unavailable("code executor"))
    }
}

pub struct UnavailableAssistant;

#[async_trait]
impl AiAssistant for UnavailableAssistant {
    async fn respond(
        &self,
        _session_id: &SessionId,
        _user_id: &UserId,
        _prompt: &str,
    ) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Unavailable("AI assistant"))
    }
}

pub struct NoopContentAnalyzer;

#[async_trait]
impl ContentAnalyzer for NoopContentAnalyzer {
    async fn analyze(
        &self,
        _session_id: &SessionId,
        _operation: &DrawingOperation,
    ) -> Result<(), CollaboratorError> {
        Ok(())
    }
}
