//! 外部コラボレーターのインターフェース
//!
//! セッションのアクセス制御、セッション状態の更新、サンドボックス実行、
//! AI アシスタント、コンテンツ解析はリレーの外側にある。ここでは呼び出し口のみを定義する。

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    entity::{DrawingOperation, ExecutionOutput},
    error::CollaboratorError,
    value_object::{SessionId, UserId},
};

/// セッション参加者の検証
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionAccessChecker: Send + Sync {
    /// ユーザーがセッションの参加者なら `true`
    ///
    /// セッションが存在しない場合も `false`（参加者でない場合と区別しない）。
    async fn is_participant(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> Result<bool, CollaboratorError>;
}

/// セッションの状態更新（"active" への遷移）
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStatusUpdater: Send + Sync {
    async fn mark_active(&self, session_id: &SessionId) -> Result<(), CollaboratorError>;
}

/// サンドボックスでのコード実行
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    async fn execute(
        &self,
        code: &str,
        language: &str,
    ) -> Result<ExecutionOutput, CollaboratorError>;
}

/// `@ai` メンションへの応答生成
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AiAssistant: Send + Sync {
    async fn respond(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
        prompt: &str,
    ) -> Result<String, CollaboratorError>;
}

/// テキスト・ダイアグラム描画の解析フック（ベストエフォート）
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        session_id: &SessionId,
        operation: &DrawingOperation,
    ) -> Result<(), CollaboratorError>;
}

/// リレーが利用するコラボレーター一式
#[derive(Clone)]
pub struct Collaborators {
    pub access_checker: Arc<dyn SessionAccessChecker>,
    pub status_updater: Arc<dyn SessionStatusUpdater>,
    pub code_executor: Arc<dyn CodeExecutor>,
    pub assistant: Arc<dyn AiAssistant>,
    pub content_analyzer: Arc<dyn ContentAnalyzer>,
}
