//! ハンドラーのテスト用ヘルパー

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use atelier_shared::time::FixedClock;
use serde_json::Value;
use tokio::sync::mpsc;

use super::context::RelayContext;
use crate::{
    config::RelayConfig,
    domain::{
        AuxiliaryStore, CollaboratorError, Collaborators, ConnectionHandle, ConnectionId,
        FileId, InstanceId, MockAiAssistant, MockCodeExecutor, MockContentAnalyzer,
        MockSessionAccessChecker, MockSessionStatusUpdater, Namespace, RoomKey, SessionId,
        StoreError,
    },
    infrastructure::{
        dto::websocket::JoinRequest, pubsub::InMemoryCrossInstanceChannel,
        store::InMemoryAuxiliaryStore,
    },
};

/// テストで使う固定時刻
pub(crate) const NOW: i64 = 1_700_000_000_000;

pub(crate) struct TestRelay {
    pub context: Arc<RelayContext>,
    pub store: Arc<InMemoryAuxiliaryStore>,
    pub channel: InMemoryCrossInstanceChannel,
}

impl TestRelay {
    /// 全員を参加者として扱い、外部コラボレーターは失敗を返す構成
    pub fn new() -> Self {
        Self::with_collaborators(open_collaborators())
    }

    pub fn with_checker(checker: MockSessionAccessChecker) -> Self {
        let mut collaborators = open_collaborators();
        collaborators.access_checker = Arc::new(checker);
        Self::with_collaborators(collaborators)
    }

    pub fn with_collaborators(collaborators: Collaborators) -> Self {
        let store = Arc::new(InMemoryAuxiliaryStore::new());
        Self::build(collaborators, store.clone(), store)
    }

    /// 全てのストア操作が失敗する構成
    pub fn with_failing_store() -> Self {
        Self::build(
            open_collaborators(),
            Arc::new(InMemoryAuxiliaryStore::new()),
            Arc::new(FailingStore),
        )
    }

    fn build(
        collaborators: Collaborators,
        store: Arc<InMemoryAuxiliaryStore>,
        context_store: Arc<dyn AuxiliaryStore>,
    ) -> Self {
        let channel = InMemoryCrossInstanceChannel::new();
        let config = RelayConfig {
            instance_id: InstanceId::new("relay-test".to_string()).unwrap(),
            ..RelayConfig::default()
        };
        let context = Arc::new(RelayContext::new(
            config,
            context_store,
            Arc::new(channel.clone()),
            collaborators,
            Arc::new(FixedClock::new(NOW)),
        ));
        Self {
            context,
            store,
            channel,
        }
    }
}

pub(crate) fn open_collaborators() -> Collaborators {
    let mut checker = MockSessionAccessChecker::new();
    checker.expect_is_participant().returning(|_, _| Ok(true));
    let mut status_updater = MockSessionStatusUpdater::new();
    status_updater.expect_mark_active().returning(|_| Ok(()));
    let mut code_executor = MockCodeExecutor::new();
    code_executor
        .expect_execute()
        .returning(|_, _| Err(CollaboratorError::Unavailable("code executor")));
    let mut assistant = MockAiAssistant::new();
    assistant
        .expect_respond()
        .returning(|_, _, _| Err(CollaboratorError::Unavailable("AI assistant")));
    let mut content_analyzer = MockContentAnalyzer::new();
    content_analyzer.expect_analyze().returning(|_, _| Ok(()));

    Collaborators {
        access_checker: Arc::new(checker),
        status_updater: Arc::new(status_updater),
        code_executor: Arc::new(code_executor),
        assistant: Arc::new(assistant),
        content_analyzer: Arc::new(content_analyzer),
    }
}

/// 新しい接続と、その接続に届くメッセージの受信側
pub(crate) fn connect(namespace: Namespace) -> (ConnectionHandle, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ConnectionHandle::new(ConnectionId::generate(), namespace, tx),
        rx,
    )
}

pub(crate) fn join_request(session_id: &str, user_id: &str) -> JoinRequest {
    JoinRequest {
        session_id: session_id.to_string(),
        user_id: user_id.to_string(),
        file_id: None,
        user_info: None,
    }
}

pub(crate) fn code_join_request(session_id: &str, user_id: &str, file_id: &str) -> JoinRequest {
    JoinRequest {
        file_id: Some(file_id.to_string()),
        ..join_request(session_id, user_id)
    }
}

pub(crate) fn session_room(session_id: &str) -> RoomKey {
    RoomKey::session(SessionId::new(session_id.to_string()).unwrap())
}

pub(crate) fn file_room(session_id: &str, file_id: &str) -> RoomKey {
    RoomKey::file(
        SessionId::new(session_id.to_string()).unwrap(),
        FileId::new(file_id.to_string()).unwrap(),
    )
}

/// 次に届いたイベントを JSON として読む
pub(crate) async fn next_event(rx: &mut mpsc::UnboundedReceiver<String>) -> Value {
    let text = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("connection channel closed");
    serde_json::from_str(&text).expect("event is not JSON")
}

/// 指定したイベント名が届くまで読み進める
pub(crate) async fn next_event_named(
    rx: &mut mpsc::UnboundedReceiver<String>,
    name: &str,
) -> Value {
    loop {
        let event = next_event(rx).await;
        if event["event"] == name {
            return event;
        }
    }
}

/// 何も届いていないこと
pub(crate) fn assert_no_event(rx: &mut mpsc::UnboundedReceiver<String>) {
    if let Ok(text) = rx.try_recv() {
        panic!("unexpected event: {}", text);
    }
}

/// 全ての操作が失敗する Auxiliary Store
pub(crate) struct FailingStore;

fn unavailable() -> StoreError {
    StoreError::Unavailable("connection refused".to_string())
}

#[async_trait]
impl AuxiliaryStore for FailingStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn append(
        &self,
        _key: &str,
        _value: String,
        _retention: Option<Duration>,
    ) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn append_capped(
        &self,
        _key: &str,
        _value: String,
        _capacity: usize,
    ) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn range(&self, _key: &str) -> Result<Vec<String>, StoreError> {
        Err(unavailable())
    }

    async fn put(
        &self,
        _key: &str,
        _value: String,
        _ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn fetch(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(unavailable())
    }

    async fn increment(&self, _key: &str, _ttl: Option<Duration>) -> Result<u64, StoreError> {
        Err(unavailable())
    }

    async fn fetch_prefix(&self, _prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        Err(unavailable())
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
