//! HTTP コラボレーターアダプター
//!
//! ## エンドポイント
//!
//! - セッションサービス
//!   - `GET {base}/api/sessions/{sessionId}/participants/{userId}`: 200 なら参加者、404/403 なら非参加者
//!   - `PATCH {base}/api/sessions/{sessionId}/status`: `{"status": "active"}`
//! - コード実行: `POST {url}` `{"code", "language"}` → `{"stdout", "stderr", "exitCode"}`
//! - AI アシスタント: `POST {url}` `{"sessionId", "userId", "prompt"}` → `{"response"}`
//! - コンテンツ解析: `POST {url}` `{"sessionId", "operation"}`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::domain::{
    AiAssistant, CodeExecutor, CollaboratorError, ContentAnalyzer, DrawingOperation,
    ExecutionOutput, SessionAccessChecker, SessionId, SessionStatusUpdater, UserId,
};

/// 実行・応答生成以外のリクエストのタイムアウト
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn build_client() -> Result<Client, CollaboratorError> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(request_failed)
}

fn request_failed(err: reqwest::Error) -> CollaboratorError {
    CollaboratorError::RequestFailed(err.to_string())
}

/// セッションサービス（参加者の確認と状態更新）
pub struct HttpSessionService {
    client: Client,
    base_url: Url,
}

impl HttpSessionService {
    pub fn new(base_url: &str) -> Result<Self, CollaboratorError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| CollaboratorError::RequestFailed(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(CollaboratorError::RequestFailed(format!(
                "'{}' cannot be a base URL",
                base_url
            )));
        }
        Ok(Self {
            client: build_client()?,
            base_url,
        })
    }

    /// ベース URL にパスセグメントを追加する（各セグメントはパーセントエンコードされる）
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait]
impl SessionAccessChecker for HttpSessionService {
    async fn is_participant(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> Result<bool, CollaboratorError> {
        let url = self.endpoint(&[
            "api",
            "sessions",
            session_id.as_str(),
            "participants",
            user_id.as_str(),
        ]);
        let response = self.client.get(url).send().await.map_err(request_failed)?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => Ok(false),
            status => Err(CollaboratorError::InvalidResponse(format!(
                "participant check returned {}",
                status
            ))),
        }
    }
}

#[derive(Serialize)]
struct StatusUpdate<'a> {
    status: &'a str,
}

#[async_trait]
impl SessionStatusUpdater for HttpSessionService {
    async fn mark_active(&self, session_id: &SessionId) -> Result<(), CollaboratorError> {
        let url = self.endpoint(&["api", "sessions", session_id.as_str(), "status"]);
        self.client
            .patch(url)
            .json(&StatusUpdate { status: "active" })
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(request_failed)?;
        Ok(())
    }
}

/// サンドボックス実行サービス
///
/// タイムアウトは呼び出し側（コードハンドラー）で強制する。
pub struct HttpCodeExecutor {
    client: Client,
    url: String,
}

impl HttpCodeExecutor {
    pub fn new(url: &str) -> Result<Self, CollaboratorError> {
        Ok(Self {
            client: Client::new(),
            url: url.to_string(),
        })
    }
}

#[derive(Serialize)]
struct ExecutionRequest<'a> {
    code: &'a str,
    language: &'a str,
}

#[async_trait]
impl CodeExecutor for HttpCodeExecutor {
    async fn execute(
        &self,
        code: &str,
        language: &str,
    ) -> Result<ExecutionOutput, CollaboratorError> {
        let response = self
            .client
            .post(&self.url)
            .json(&ExecutionRequest { code, language })
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(request_failed)?;
        response
            .json::<ExecutionOutput>()
            .await
            .map_err(|e| CollaboratorError::InvalidResponse(e.to_string()))
    }
}

/// AI アシスタントサービス
pub struct HttpAssistant {
    client: Client,
    url: String,
}

impl HttpAssistant {
    pub fn new(url: &str) -> Result<Self, CollaboratorError> {
        Ok(Self {
            client: Client::new(),
            url: url.to_string(),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssistantRequest<'a> {
    session_id: &'a SessionId,
    user_id: &'a UserId,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct AssistantResponse {
    response: String,
}

#[async_trait]
impl AiAssistant for HttpAssistant {
    async fn respond(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
        prompt: &str,
    ) -> Result<String, CollaboratorError> {
        let response = self
            .client
            .post(&self.url)
            .json(&AssistantRequest {
                session_id,
                user_id,
                prompt,
            })
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(request_failed)?;
        let body = response
            .json::<AssistantResponse>()
            .await
            .map_err(|e| CollaboratorError::InvalidResponse(e.to_string()))?;
        Ok(body.response)
    }
}

/// コンテンツ解析サービス
pub struct HttpContentAnalyzer {
    client: Client,
    url: String,
}

impl HttpContentAnalyzer {
    pub fn new(url: &str) -> Result<Self, CollaboratorError> {
        Ok(Self {
            client: build_client()?,
            url: url.to_string(),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisRequest<'a> {
    session_id: &'a SessionId,
    operation: &'a DrawingOperation,
}

#[async_trait]
impl ContentAnalyzer for HttpContentAnalyzer {
    async fn analyze(
        &self,
        session_id: &SessionId,
        operation: &DrawingOperation,
    ) -> Result<(), CollaboratorError> {
        self.client
            .post(&self.url)
            .json(&AnalysisRequest {
                session_id,
                operation,
            })
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(request_failed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_ignores_trailing_slash() {
        // テスト項目: ベース URL 末尾のスラッシュの有無でパスが変わらない
        // given (前提条件):
        let with_slash = HttpSessionService::new("http://sessions.internal:4000/v1/").unwrap();
        let without_slash = HttpSessionService::new("http://sessions.internal:4000/v1").unwrap();

        // when (操作):
        let a = with_slash.endpoint(&["api", "sessions", "S1", "status"]);
        let b = without_slash.endpoint(&["api", "sessions", "S1", "status"]);

        // then (期待する結果):
        assert_eq!(a.as_str(), "http://sessions.internal:4000/v1/api/sessions/S1/status");
        assert_eq!(a, b);
    }

    #[test]
    fn test_endpoint_escapes_path_segments() {
        // テスト項目: セグメント内の '/' や '..' はエンコードされ、別の参加者のパスにならない
        // given (前提条件):
        let service = HttpSessionService::new("http://sessions.internal:4000").unwrap();

        // when (操作):
        let url = service.endpoint(&["api", "sessions", "S1", "participants", "mallory/../alice"]);

        // then (期待する結果):
        assert_eq!(
            url.path(),
            "/api/sessions/S1/participants/mallory%2F..%2Falice"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        // テスト項目: URL として解釈できないベース URL は設定エラーになる
        // given (前提条件):
        let base = "not a url";

        // when (操作):
        let result = HttpSessionService::new(base);

        // then (期待する結果):
        assert!(matches!(result, Err(CollaboratorError::RequestFailed(_))));
    }

    #[test]
    fn test_assistant_request_is_camel_case() {
        // テスト項目: AI アシスタントへのリクエストが camelCase でエンコードされる
        // given (前提条件):
        let session_id = SessionId::new("S2".to_string()).unwrap();
        let user_id = UserId::new("A".to_string()).unwrap();

        // when (操作):
        let json = serde_json::to_value(AssistantRequest {
            session_id: &session_id,
            user_id: &user_id,
            prompt: "@ai explain",
        })
        .unwrap();

        // then (期待する結果):
        assert_eq!(
            json,
            serde_json::json!({"sessionId": "S2", "userId": "A", "prompt": "@ai explain"})
        );
    }
}
