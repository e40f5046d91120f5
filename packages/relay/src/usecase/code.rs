//! UseCase: 共同コード編集
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - join-code-session（ファイル内容と有効なカーソルの送信）
//! - code-change の順序付け・配信・履歴への追記
//! - cursor-position の TTL、execute-code の結果配信とタイムアウト
//!
//! ### なぜこのテストが必要か
//! - 変更履歴は `sessionId:fileId` 単位の監査ログになる
//! - カーソルは TTL で自然に消え、切断時には即座に消える必要がある
//! - コード実行は時間がかかっても他のイベント処理を止めてはいけない
//!
//! ### どのような状況を想定しているか
//! - 正常系：変更の配信、実行結果の全員への配信
//! - 異常系：実行の失敗・タイムアウト（依頼者にだけエラー）
//! - エッジケース：TTL 経過後のカーソル、保存されていないファイル
//!
//! ファイル内容（`code-file`）は変更ストリームから組み立てない。
//! 外部から書き込まれた内容をそのまま返す。

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    NamespaceHandler,
    context::{Audience, RelayContext, decode_entries, encode_entry},
};
use crate::{
    domain::{
        AutoSave, ChangeSequencer, CodeEdit, ConnectionHandle, ConnectionId, CursorState,
        FileContent, Membership, Namespace, RoomKey, RoomRegistry, StoreKeys,
    },
    infrastructure::dto::websocket::{
        CodeRequest, CursorPositionRequest, ExecuteCodeRequest, JoinRequest, ServerEvent,
    },
};

pub struct CodeHandler {
    context: Arc<RelayContext>,
    registry: Arc<dyn RoomRegistry>,
    sequencer: ChangeSequencer,
}

impl CodeHandler {
    pub fn new(context: Arc<RelayContext>, registry: Arc<dyn RoomRegistry>) -> Self {
        Self {
            context,
            registry,
            sequencer: ChangeSequencer::new(),
        }
    }

    async fn join(&self, connection: &mut ConnectionHandle, request: JoinRequest) {
        let (membership, _) = match self.context.authorize(Namespace::Code, request).await {
            Ok(joined) => joined,
            Err(e) => {
                tracing::info!("Rejected code join on '{}': {}", connection.id(), e);
                self.context.reply(connection, &ServerEvent::error(e.to_string()));
                return;
            }
        };
        self.leave_current(connection).await;

        let Membership { user_id, room } = membership;
        self.registry
            .join(&room, connection.to_member(user_id.clone(), None));
        connection.bind(user_id.clone(), room.clone());
        tracing::info!("User '{}' joined code room '{}'", user_id, room);

        let file = self.load_file(&room).await;
        self.context.reply(connection, &ServerEvent::FileContent(file));
        let cursors = self.load_cursors(&room).await;
        self.context
            .reply(connection, &ServerEvent::ActiveCursors(cursors));

        self.context
            .announce(
                self.registry.as_ref(),
                Namespace::Code,
                &room,
                Audience::AllExcept(connection.id()),
                &ServerEvent::CollaboratorJoined {
                    user_id,
                    connection_id: connection.id().clone(),
                },
            )
            .await;
    }

    /// 保存されたファイル内容（なければ空のファイル）
    async fn load_file(&self, room: &RoomKey) -> FileContent {
        let empty =
            || FileContent::empty(room.file_id().cloned(), &self.context.config.default_language);
        let key = StoreKeys::code_file(room);
        match self.context.store.fetch(&key).await {
            Ok(Some(stored)) => serde_json::from_str(&stored).unwrap_or_else(|e| {
                tracing::warn!("Malformed file content in '{}': {}", key, e);
                empty()
            }),
            Ok(None) => empty(),
            Err(e) => {
                tracing::warn!("Failed to read file content '{}': {}", key, e);
                empty()
            }
        }
    }

    /// TTL 内に更新されたカーソル
    async fn load_cursors(&self, room: &RoomKey) -> Vec<CursorState> {
        let prefix = StoreKeys::cursor_prefix(room);
        match self.context.store.fetch_prefix(&prefix).await {
            Ok(entries) => decode_entries(
                &prefix,
                entries.into_iter().map(|(_, value)| value).collect(),
            ),
            Err(e) => {
                tracing::warn!("Failed to read cursors '{}': {}", prefix, e);
                Vec::new()
            }
        }
    }

    async fn leave_current(&self, connection: &mut ConnectionHandle) {
        if let Some(previous) = connection.unbind() {
            self.depart(connection.id(), previous).await;
        }
    }

    async fn depart(&self, connection_id: &ConnectionId, membership: Membership) {
        let Membership { user_id, room } = membership;
        let key = StoreKeys::cursor(&room, &user_id);
        if let Err(e) = self.context.store.delete(&key).await {
            tracing::warn!("Failed to delete cursor '{}': {}", key, e);
        }
        tracing::info!("User '{}' left code room '{}'", user_id, room);

        self.context
            .announce(
                self.registry.as_ref(),
                Namespace::Code,
                &room,
                Audience::AllExcept(connection_id),
                &ServerEvent::CollaboratorLeft { user_id },
            )
            .await;
        self.registry.leave(&room, connection_id);
        if !self.registry.contains_room(&room) {
            self.sequencer.forget(&room);
        }
    }

    /// ストアのカウンターを進める（到達できなければ `None`）
    async fn shared_revision(&self, room: &RoomKey) -> Option<u64> {
        let key = StoreKeys::code_revision(room);
        match self
            .context
            .store
            .increment(&key, Some(self.context.config.history_retention))
            .await
        {
            Ok(revision) => Some(revision),
            Err(e) => {
                tracing::warn!("Failed to advance revision counter '{}': {}", key, e);
                None
            }
        }
    }

    async fn change(&self, connection: &ConnectionHandle, membership: Membership, edit: CodeEdit) {
        let Membership { user_id, room } = membership;
        let shared = self.shared_revision(&room).await;
        let change = self.sequencer.sequence(
            &room,
            shared,
            self.context.new_id(),
            user_id,
            self.context.now(),
            edit,
        );

        let Some(payload) = self.context.deliver(
            self.registry.as_ref(),
            &room,
            Audience::AllExcept(connection.id()),
            &ServerEvent::CodeChange(change.clone()),
        ) else {
            return;
        };

        let history_key = StoreKeys::code_changes(&room);
        if let Some(entry) = encode_entry(&change)
            && let Err(e) = self
                .context
                .store
                .append(
                    &history_key,
                    entry,
                    Some(self.context.config.history_retention),
                )
                .await
        {
            tracing::warn!("Failed to append to change log '{}': {}", history_key, e);
        }

        let auto_save_key = StoreKeys::auto_save(&room);
        let snapshot = AutoSave {
            saved_at: self.context.now(),
            last_change: change,
        };
        if let Some(entry) = encode_entry(&snapshot)
            && let Err(e) = self
                .context
                .store
                .put(
                    &auto_save_key,
                    entry,
                    Some(self.context.config.auto_save_ttl),
                )
                .await
        {
            tracing::warn!("Failed to write auto-save '{}': {}", auto_save_key, e);
        }

        self.context.replicate(Namespace::Code, &room, payload).await;
    }

    async fn move_cursor(
        &self,
        connection: &ConnectionHandle,
        membership: Membership,
        request: CursorPositionRequest,
    ) {
        let Membership { user_id, room } = membership;
        let cursor = request.into_cursor(user_id, self.context.now());

        let key = StoreKeys::cursor(&room, &cursor.user_id);
        if let Some(entry) = encode_entry(&cursor)
            && let Err(e) = self
                .context
                .store
                .put(&key, entry, Some(self.context.config.cursor_ttl))
                .await
        {
            tracing::warn!("Failed to write cursor '{}': {}", key, e);
        }

        self.context
            .announce(
                self.registry.as_ref(),
                Namespace::Code,
                &room,
                Audience::AllExcept(connection.id()),
                &ServerEvent::CursorUpdate(cursor),
            )
            .await;
    }

    /// 実行は接続ごとのタスクから切り離して行う
    fn execute(
        &self,
        connection: &ConnectionHandle,
        membership: Membership,
        request: ExecuteCodeRequest,
    ) {
        let context = self.context.clone();
        let registry = self.registry.clone();
        let requester = connection.sender().clone();
        let Membership { user_id, room } = membership;
        let language = request
            .language
            .unwrap_or_else(|| context.config.default_language.clone());
        let code = request.code;

        tokio::spawn(async move {
            let timeout = context.config.execution_timeout;
            let outcome = tokio::time::timeout(
                timeout,
                context.collaborators.code_executor.execute(&code, &language),
            )
            .await;

            match outcome {
                Ok(Ok(result)) => {
                    tracing::info!(
                        "User '{}' executed {} code in '{}'",
                        user_id,
                        language,
                        room
                    );
                    let event = ServerEvent::CodeExecutionResult {
                        executed_by: user_id,
                        result,
                        timestamp: context.now(),
                    };
                    context
                        .announce(
                            registry.as_ref(),
                            Namespace::Code,
                            &room,
                            Audience::All,
                            &event,
                        )
                        .await;
                }
                Ok(Err(e)) => {
                    tracing::warn!("Execution for user '{}' failed: {}", user_id, e);
                    let message = format!("Execution failed: {}", e);
                    context.push(&requester, &ServerEvent::CodeExecutionError { message });
                }
                Err(_) => {
                    tracing::warn!(
                        "Execution for user '{}' timed out after {:?}",
                        user_id,
                        timeout
                    );
                    let message =
                        format!("Execution timed out after {} seconds", timeout.as_secs());
                    context.push(&requester, &ServerEvent::CodeExecutionError { message });
                }
            }
        });
    }
}

#[async_trait]
impl NamespaceHandler for CodeHandler {
    type Request = CodeRequest;

    fn namespace(&self) -> Namespace {
        Namespace::Code
    }

    fn registry(&self) -> &Arc<dyn RoomRegistry> {
        &self.registry
    }

    async fn handle(&self, connection: &mut ConnectionHandle, request: CodeRequest) {
        if let CodeRequest::JoinCodeSession(join) = request {
            self.join(connection, join).await;
            return;
        }
        let Some(membership) = connection.membership().cloned() else {
            tracing::debug!("Ignoring code event from '{}' before join", connection.id());
            return;
        };

        match request {
            CodeRequest::JoinCodeSession(_) => {}
            CodeRequest::CodeChange(edit) => self.change(connection, membership, edit).await,
            CodeRequest::CursorPosition(cursor) => {
                self.move_cursor(connection, membership, cursor).await
            }
            CodeRequest::ExecuteCode(execute) => self.execute(connection, membership, execute),
        }
    }

    async fn disconnect(&self, connection: &mut ConnectionHandle) {
        self.leave_current(connection).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        domain::{
            AuxiliaryStore, CodeExecutor, CollaboratorError, CursorPosition, ExecutionOutput,
            MockCodeExecutor, UserId,
        },
        infrastructure::registry::InMemoryRoomRegistry,
        usecase::testing::{self, TestRelay},
    };
    use serde_json::json;

    fn handler(relay: &TestRelay) -> CodeHandler {
        CodeHandler::new(relay.context.clone(), Arc::new(InMemoryRoomRegistry::new()))
    }

    fn join(user: &str) -> CodeRequest {
        CodeRequest::JoinCodeSession(testing::code_join_request("S3", user, "F"))
    }

    fn cursor_at(line: u32, column: u32) -> CodeRequest {
        CodeRequest::CursorPosition(CursorPositionRequest {
            position: CursorPosition { line, column },
            selection: None,
        })
    }

    fn handler_with_executor(executor: Arc<dyn CodeExecutor>) -> (TestRelay, CodeHandler) {
        let mut collaborators = testing::open_collaborators();
        collaborators.code_executor = executor;
        let relay = TestRelay::with_collaborators(collaborators);
        let handler = handler(&relay);
        (relay, handler)
    }

    #[tokio::test]
    async fn test_join_sends_default_file_content() {
        // テスト項目: 保存されていないファイルは空の内容と既定の言語で送られる
        // given (前提条件):
        let relay = TestRelay::new();
        let handler = handler(&relay);
        let (mut alice, mut alice_rx) = testing::connect(Namespace::Code);

        // when (操作):
        handler.handle(&mut alice, join("A")).await;

        // then (期待する結果):
        let file = testing::next_event(&mut alice_rx).await;
        assert_eq!(file["event"], "file-content");
        assert_eq!(
            file["data"],
            json!({"fileId": "F", "content": "", "language": "javascript"})
        );
        let cursors = testing::next_event(&mut alice_rx).await;
        assert_eq!(cursors["event"], "active-cursors");
        assert_eq!(cursors["data"], json!([]));
    }

    #[tokio::test]
    async fn test_join_sends_stored_file_content() {
        // テスト項目: 保存されたファイル内容がそのまま送られる
        // given (前提条件):
        let relay = TestRelay::new();
        let handler = handler(&relay);
        relay
            .store
            .put(
                &StoreKeys::code_file(&testing::file_room("S3", "F")),
                r#"{"content":"print(1)","language":"python"}"#.to_string(),
                None,
            )
            .await
            .unwrap();
        let (mut alice, mut alice_rx) = testing::connect(Namespace::Code);

        // when (操作):
        handler.handle(&mut alice, join("A")).await;

        // then (期待する結果):
        let file = testing::next_event(&mut alice_rx).await;
        assert_eq!(file["data"]["content"], "print(1)");
        assert_eq!(file["data"]["language"], "python");
    }

    #[tokio::test]
    async fn test_code_change_is_logged_and_broadcast() {
        // テスト項目: 変更は履歴に 1 件追記され、同じ Room の他の接続に届く
        // given (前提条件):
        let relay = TestRelay::new();
        let handler = handler(&relay);
        let (mut alice, mut alice_rx) = testing::connect(Namespace::Code);
        let (mut bob, mut bob_rx) = testing::connect(Namespace::Code);
        handler.handle(&mut alice, join("A")).await;
        handler.handle(&mut bob, join("B")).await;
        while alice_rx.try_recv().is_ok() {}

        // when (操作):
        handler
            .handle(
                &mut alice,
                CodeRequest::CodeChange(CodeEdit::Insert {
                    position: 0,
                    text: "x=1".to_string(),
                }),
            )
            .await;

        // then (期待する結果):
        let room = testing::file_room("S3", "F");
        let log = relay
            .store
            .range(&StoreKeys::code_changes(&room))
            .await
            .unwrap();
        assert_eq!(log.len(), 1);
        let record: serde_json::Value = serde_json::from_str(&log[0]).unwrap();
        assert_eq!(record["type"], "insert");
        assert_eq!(record["text"], "x=1");
        assert_eq!(record["position"], 0);
        assert_eq!(record["userId"], "A");
        assert_eq!(record["revision"], 1);

        let broadcast = testing::next_event_named(&mut bob_rx, "code-change").await;
        assert_eq!(broadcast["data"], record);
        testing::assert_no_event(&mut alice_rx);

        let auto_save = relay
            .store
            .fetch(&StoreKeys::auto_save(&room))
            .await
            .unwrap()
            .unwrap();
        let auto_save: serde_json::Value = serde_json::from_str(&auto_save).unwrap();
        assert_eq!(auto_save["lastChange"], record);
    }

    #[tokio::test]
    async fn test_code_change_does_not_touch_file_content() {
        // テスト項目: 変更はファイル内容に反映されない
        // given (前提条件):
        let relay = TestRelay::new();
        let handler = handler(&relay);
        let (mut alice, _alice_rx) = testing::connect(Namespace::Code);
        let (mut bob, mut bob_rx) = testing::connect(Namespace::Code);
        handler.handle(&mut alice, join("A")).await;
        handler
            .handle(
                &mut alice,
                CodeRequest::CodeChange(CodeEdit::Insert {
                    position: 0,
                    text: "x=1".to_string(),
                }),
            )
            .await;

        // when (操作):
        handler.handle(&mut bob, join("B")).await;

        // then (期待する結果):
        let file = testing::next_event(&mut bob_rx).await;
        assert_eq!(file["data"]["content"], "");
    }

    #[tokio::test]
    async fn test_revisions_increase_per_room() {
        // テスト項目: 論理クロックは Room ごとに 1 から増える
        // given (前提条件):
        let relay = TestRelay::new();
        let handler = handler(&relay);
        let (mut alice, _alice_rx) = testing::connect(Namespace::Code);
        handler.handle(&mut alice, join("A")).await;

        // when (操作):
        for position in 0..3 {
            handler
                .handle(
                    &mut alice,
                    CodeRequest::CodeChange(CodeEdit::Delete {
                        position,
                        length: 1,
                    }),
                )
                .await;
        }

        // then (期待する結果):
        let log = relay
            .store
            .range(&StoreKeys::code_changes(&testing::file_room("S3", "F")))
            .await
            .unwrap();
        let revisions: Vec<u64> = log
            .iter()
            .map(|entry| {
                let record: serde_json::Value = serde_json::from_str(entry).unwrap();
                record["revision"].as_u64().unwrap()
            })
            .collect();
        assert_eq!(revisions, vec![1, 2, 3]);
    }

    fn logged_revisions(entries: &[String]) -> Vec<u64> {
        entries
            .iter()
            .map(|entry| {
                let record: serde_json::Value = serde_json::from_str(entry).unwrap();
                record["revision"].as_u64().unwrap()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_revisions_continue_after_room_empties() {
        // テスト項目: Room が空になって再び参加しても、履歴のリビジョンは 1 に戻らない
        // given (前提条件):
        let relay = TestRelay::new();
        let handler = handler(&relay);

        // when (操作):
        for _ in 0..2 {
            let (mut alice, _alice_rx) = testing::connect(Namespace::Code);
            handler.handle(&mut alice, join("A")).await;
            handler
                .handle(
                    &mut alice,
                    CodeRequest::CodeChange(CodeEdit::Insert {
                        position: 0,
                        text: "x".to_string(),
                    }),
                )
                .await;
            handler.disconnect(&mut alice).await;
        }

        // then (期待する結果):
        let log = relay
            .store
            .range(&StoreKeys::code_changes(&testing::file_room("S3", "F")))
            .await
            .unwrap();
        assert_eq!(logged_revisions(&log), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_revisions_are_shared_between_handlers() {
        // テスト項目: 同じストアを使う別インスタンスのハンドラー間でリビジョンが重複しない
        // given (前提条件):
        let relay = TestRelay::new();
        let first = handler(&relay);
        let second = handler(&relay);
        let (mut alice, _alice_rx) = testing::connect(Namespace::Code);
        let (mut bob, _bob_rx) = testing::connect(Namespace::Code);
        first.handle(&mut alice, join("A")).await;
        second.handle(&mut bob, join("B")).await;

        // when (操作):
        for (handler, connection) in [(&first, &mut alice), (&second, &mut bob)] {
            handler
                .handle(
                    connection,
                    CodeRequest::CodeChange(CodeEdit::Delete {
                        position: 0,
                        length: 1,
                    }),
                )
                .await;
        }

        // then (期待する結果):
        let log = relay
            .store
            .range(&StoreKeys::code_changes(&testing::file_room("S3", "F")))
            .await
            .unwrap();
        assert_eq!(logged_revisions(&log), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cursor_visible_within_ttl_only() {
        // テスト項目: カーソルは TTL 内の参加者には見え、TTL を過ぎると消える
        // given (前提条件):
        let relay = TestRelay::new();
        let handler = handler(&relay);
        let (mut alice, _alice_rx) = testing::connect(Namespace::Code);
        let (mut bob, mut bob_rx) = testing::connect(Namespace::Code);
        let (mut carol, mut carol_rx) = testing::connect(Namespace::Code);
        handler.handle(&mut alice, join("A")).await;
        handler.handle(&mut alice, cursor_at(3, 7)).await;

        // when (操作):
        tokio::time::advance(Duration::from_secs(29)).await;
        handler.handle(&mut bob, join("B")).await;
        tokio::time::advance(Duration::from_secs(2)).await;
        handler.handle(&mut carol, join("C")).await;

        // then (期待する結果):
        let within = testing::next_event_named(&mut bob_rx, "active-cursors").await;
        assert_eq!(within["data"].as_array().unwrap().len(), 1);
        assert_eq!(within["data"][0]["userId"], "A");
        assert_eq!(within["data"][0]["position"], json!({"line": 3, "column": 7}));
        let after = testing::next_event_named(&mut carol_rx, "active-cursors").await;
        assert_eq!(after["data"], json!([]));
    }

    #[tokio::test]
    async fn test_disconnect_removes_cursor_immediately() {
        // テスト項目: 切断するとカーソルは TTL を待たずに消え、collaborator-left が届く
        // given (前提条件):
        let relay = TestRelay::new();
        let handler = handler(&relay);
        let (mut alice, _alice_rx) = testing::connect(Namespace::Code);
        let (mut bob, mut bob_rx) = testing::connect(Namespace::Code);
        handler.handle(&mut alice, join("A")).await;
        handler.handle(&mut bob, join("B")).await;
        handler.handle(&mut alice, cursor_at(1, 1)).await;

        // when (操作):
        handler.disconnect(&mut alice).await;

        // then (期待する結果):
        let update = testing::next_event_named(&mut bob_rx, "cursor-update").await;
        assert_eq!(update["data"]["userId"], "A");
        let left = testing::next_event_named(&mut bob_rx, "collaborator-left").await;
        assert_eq!(left["data"], json!({"userId": "A"}));
        let cursor = relay
            .store
            .fetch(&StoreKeys::cursor(
                &testing::file_room("S3", "F"),
                &UserId::new("A".to_string()).unwrap(),
            ))
            .await
            .unwrap();
        assert_eq!(cursor, None);
    }

    #[tokio::test]
    async fn test_execution_result_reaches_everyone() {
        // テスト項目: 実行結果は依頼者を含む全員に届く
        // given (前提条件):
        let mut executor = MockCodeExecutor::new();
        executor
            .expect_execute()
            .withf(|code, language| code == "1+1" && language == "javascript")
            .returning(|_, _| {
                Ok(ExecutionOutput {
                    stdout: "2\n".to_string(),
                    stderr: String::new(),
                    exit_code: Some(0),
                })
            });
        let (_relay, handler) = handler_with_executor(Arc::new(executor));
        let (mut alice, mut alice_rx) = testing::connect(Namespace::Code);
        let (mut bob, mut bob_rx) = testing::connect(Namespace::Code);
        handler.handle(&mut alice, join("A")).await;
        handler.handle(&mut bob, join("B")).await;

        // when (操作):
        handler
            .handle(
                &mut alice,
                CodeRequest::ExecuteCode(ExecuteCodeRequest {
                    code: "1+1".to_string(),
                    language: None,
                }),
            )
            .await;

        // then (期待する結果):
        for rx in [&mut alice_rx, &mut bob_rx] {
            let result = testing::next_event_named(rx, "code-execution-result").await;
            assert_eq!(result["data"]["executedBy"], "A");
            assert_eq!(result["data"]["result"]["stdout"], "2\n");
            assert_eq!(result["data"]["result"]["exitCode"], 0);
        }
    }

    #[tokio::test]
    async fn test_execution_failure_reaches_requester_only() {
        // テスト項目: 実行の失敗は依頼者にだけ届く
        // given (前提条件):
        let mut executor = MockCodeExecutor::new();
        executor
            .expect_execute()
            .returning(|_, _| Err(CollaboratorError::RequestFailed("sandbox down".to_string())));
        let (_relay, handler) = handler_with_executor(Arc::new(executor));
        let (mut alice, mut alice_rx) = testing::connect(Namespace::Code);
        let (mut bob, mut bob_rx) = testing::connect(Namespace::Code);
        handler.handle(&mut alice, join("A")).await;
        handler.handle(&mut bob, join("B")).await;
        while bob_rx.try_recv().is_ok() {}

        // when (操作):
        handler
            .handle(
                &mut alice,
                CodeRequest::ExecuteCode(ExecuteCodeRequest {
                    code: "boom".to_string(),
                    language: Some("python".to_string()),
                }),
            )
            .await;

        // then (期待する結果):
        let error = testing::next_event_named(&mut alice_rx, "code-execution-error").await;
        assert!(
            error["data"]["message"]
                .as_str()
                .unwrap()
                .contains("sandbox down")
        );
        tokio::task::yield_now().await;
        testing::assert_no_event(&mut bob_rx);
    }

    struct HangingExecutor;

    #[async_trait]
    impl CodeExecutor for HangingExecutor {
        async fn execute(
            &self,
            _code: &str,
            _language: &str,
        ) -> Result<ExecutionOutput, CollaboratorError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ExecutionOutput::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_execution_timeout_reports_error() {
        // テスト項目: 実行がタイムアウトすると依頼者にエラーが届き、他のイベントは止まらない
        // given (前提条件):
        let (_relay, handler) = handler_with_executor(Arc::new(HangingExecutor));
        let (mut alice, mut alice_rx) = testing::connect(Namespace::Code);
        let (mut bob, mut bob_rx) = testing::connect(Namespace::Code);
        handler.handle(&mut alice, join("A")).await;
        handler.handle(&mut bob, join("B")).await;
        while alice_rx.try_recv().is_ok() {}
        while bob_rx.try_recv().is_ok() {}

        // when (操作):
        handler
            .handle(
                &mut alice,
                CodeRequest::ExecuteCode(ExecuteCodeRequest {
                    code: "while(true){}".to_string(),
                    language: None,
                }),
            )
            .await;
        handler.handle(&mut alice, cursor_at(2, 2)).await;

        // then (期待する結果):
        let update = bob_rx.recv().await.unwrap();
        assert!(update.contains("cursor-update"));
        let error: serde_json::Value =
            serde_json::from_str(&alice_rx.recv().await.unwrap()).unwrap();
        assert_eq!(error["event"], "code-execution-error");
        assert!(error["data"]["message"].as_str().unwrap().contains("timed out"));
    }
}
