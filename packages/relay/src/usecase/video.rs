//! UseCase: ビデオ通話のシグナリング
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - join-room（参加者確認、既存参加者の通知、参加の通知）
//! - offer / answer / ice-candidate の直接転送
//! - メディア状態の通知と切断時の通知
//!
//! ### なぜこのテストが必要か
//! - 既存参加者の一覧は WebRTC のメッシュ接続を張る起点になる
//! - 拒否された接続が Room に登録されないことを保証する
//!
//! ### どのような状況を想定しているか
//! - 正常系：複数ユーザーの参加とシグナリング
//! - 異常系：参加者でないユーザーの join
//! - エッジケース：切断済みの相手への転送、join 前のイベント

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    NamespaceHandler,
    context::{Audience, RelayContext},
};
use crate::{
    domain::{ConnectionHandle, ConnectionId, Membership, Namespace, Participant, RoomRegistry},
    infrastructure::dto::websocket::{JoinRequest, ServerEvent, SignalRequest, VideoRequest},
};

/// シグナリングの種類
#[derive(Debug, Clone, Copy)]
enum Signal {
    Offer,
    Answer,
    IceCandidate,
}

pub struct VideoHandler {
    context: Arc<RelayContext>,
    registry: Arc<dyn RoomRegistry>,
}

impl VideoHandler {
    pub fn new(context: Arc<RelayContext>, registry: Arc<dyn RoomRegistry>) -> Self {
        Self { context, registry }
    }

    async fn join(&self, connection: &mut ConnectionHandle, request: JoinRequest) {
        let (membership, user_info) = match self.context.authorize(Namespace::Video, request).await
        {
            Ok(joined) => joined,
            Err(e) => {
                tracing::info!("Rejected video join on '{}': {}", connection.id(), e);
                self.context.reply(connection, &ServerEvent::error(e.to_string()));
                return;
            }
        };
        self.leave_current(connection).await;

        let Membership { user_id, room } = membership;
        let existing: Vec<Participant> = self
            .registry
            .join(&room, connection.to_member(user_id.clone(), user_info.clone()))
            .iter()
            .map(Participant::from)
            .collect();
        connection.bind(user_id.clone(), room.clone());
        tracing::info!(
            "User '{}' joined video room '{}' ({} existing)",
            user_id,
            room,
            existing.len()
        );

        self.context
            .reply(connection, &ServerEvent::ExistingParticipants(existing));
        self.context
            .announce(
                self.registry.as_ref(),
                Namespace::Video,
                &room,
                Audience::AllExcept(connection.id()),
                &ServerEvent::UserJoined {
                    user_id,
                    user_info,
                    connection_id: connection.id().clone(),
                },
            )
            .await;

        let status_updater = self.context.collaborators.status_updater.clone();
        let session_id = room.session_id().clone();
        tokio::spawn(async move {
            if let Err(e) = status_updater.mark_active(&session_id).await {
                tracing::warn!("Failed to mark session '{}' active: {}", session_id, e);
            }
        });
    }

    /// 別の Room に入り直すときは、今の Room を先に抜ける
    async fn leave_current(&self, connection: &mut ConnectionHandle) {
        if let Some(previous) = connection.unbind() {
            self.depart(connection.id(), previous).await;
        }
    }

    async fn depart(&self, connection_id: &ConnectionId, membership: Membership) {
        let Membership { user_id, room } = membership;
        tracing::info!("User '{}' left video room '{}'", user_id, room);
        self.context
            .announce(
                self.registry.as_ref(),
                Namespace::Video,
                &room,
                Audience::AllExcept(connection_id),
                &ServerEvent::UserLeft {
                    user_id,
                    connection_id: connection_id.clone(),
                },
            )
            .await;
        self.registry.leave(&room, connection_id);
    }

    /// 転送先が切断済みなら黙って捨てる
    fn forward(&self, connection: &ConnectionHandle, signal: Signal, request: SignalRequest) {
        let (target, forward) = request.into_forward(connection.id().clone());
        let event = match signal {
            Signal::Offer => ServerEvent::Offer(forward),
            Signal::Answer => ServerEvent::Answer(forward),
            Signal::IceCandidate => ServerEvent::IceCandidate(forward),
        };
        let payload = match event.encode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to encode {:?}: {}", signal, e);
                return;
            }
        };
        if let Err(e) = self.registry.send_to(&target, &payload) {
            tracing::debug!("Dropped {:?} from '{}': {}", signal, connection.id(), e);
        }
    }

    async fn notify_media(&self, connection: &ConnectionHandle, event: ServerEvent) {
        let Some(membership) = connection.membership() else {
            return;
        };
        self.context
            .announce(
                self.registry.as_ref(),
                Namespace::Video,
                &membership.room,
                Audience::AllExcept(connection.id()),
                &event,
            )
            .await;
    }
}

#[async_trait]
impl NamespaceHandler for VideoHandler {
    type Request = VideoRequest;

    fn namespace(&self) -> Namespace {
        Namespace::Video
    }

    fn registry(&self) -> &Arc<dyn RoomRegistry> {
        &self.registry
    }

    async fn handle(&self, connection: &mut ConnectionHandle, request: VideoRequest) {
        if let VideoRequest::JoinRoom(join) = request {
            self.join(connection, join).await;
            return;
        }
        let Some(user_id) = connection.membership().map(|m| m.user_id.clone()) else {
            tracing::debug!("Ignoring video event from '{}' before join", connection.id());
            return;
        };

        match request {
            VideoRequest::JoinRoom(_) => {}
            VideoRequest::Offer(signal) => self.forward(connection, Signal::Offer, signal),
            VideoRequest::Answer(signal) => self.forward(connection, Signal::Answer, signal),
            VideoRequest::IceCandidate(signal) => {
                self.forward(connection, Signal::IceCandidate, signal)
            }
            VideoRequest::ToggleVideo(toggle) => {
                let event = ServerEvent::UserVideoToggle {
                    user_id,
                    enabled: toggle.enabled,
                };
                self.notify_media(connection, event).await;
            }
            VideoRequest::ToggleAudio(toggle) => {
                let event = ServerEvent::UserAudioToggle {
                    user_id,
                    enabled: toggle.enabled,
                };
                self.notify_media(connection, event).await;
            }
            VideoRequest::StartScreenShare => {
                let event = ServerEvent::UserScreenShare {
                    user_id,
                    sharing: true,
                };
                self.notify_media(connection, event).await;
            }
            VideoRequest::StopScreenShare => {
                let event = ServerEvent::UserScreenShare {
                    user_id,
                    sharing: false,
                };
                self.notify_media(connection, event).await;
            }
        }
    }

    async fn disconnect(&self, connection: &mut ConnectionHandle) {
        self.leave_current(connection).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::MockSessionAccessChecker,
        infrastructure::registry::InMemoryRoomRegistry,
        usecase::testing::{self, TestRelay},
    };
    use serde_json::json;

    fn handler(relay: &TestRelay) -> VideoHandler {
        VideoHandler::new(relay.context.clone(), Arc::new(InMemoryRoomRegistry::new()))
    }

    fn signal(target: &ConnectionId) -> SignalRequest {
        let mut body = serde_json::Map::new();
        body.insert("offer".to_string(), json!({"sdp": "v=0"}));
        SignalRequest {
            target: target.to_string(),
            body,
        }
    }

    #[tokio::test]
    async fn test_existing_participants_lists_prior_members() {
        // テスト項目: 後から参加したユーザーに、先に参加していたメンバーが通知される
        // given (前提条件):
        let relay = TestRelay::new();
        let handler = handler(&relay);
        let (mut alice, mut alice_rx) = testing::connect(Namespace::Video);
        let (mut bob, mut bob_rx) = testing::connect(Namespace::Video);
        let (mut carol, mut carol_rx) = testing::connect(Namespace::Video);
        handler
            .handle(&mut alice, VideoRequest::JoinRoom(testing::join_request("S1", "A")))
            .await;
        handler
            .handle(&mut bob, VideoRequest::JoinRoom(testing::join_request("S1", "B")))
            .await;

        // when (操作):
        handler
            .handle(&mut carol, VideoRequest::JoinRoom(testing::join_request("S1", "C")))
            .await;

        // then (期待する結果):
        let event = testing::next_event(&mut carol_rx).await;
        assert_eq!(event["event"], "existing-participants");
        let mut users: Vec<String> = event["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["userId"].as_str().unwrap().to_string())
            .collect();
        users.sort();
        assert_eq!(users, vec!["A", "B"]);

        let first = testing::next_event(&mut alice_rx).await;
        assert_eq!(first["event"], "existing-participants");
        let joined = testing::next_event_named(&mut alice_rx, "user-joined").await;
        assert_eq!(joined["data"]["userId"], "B");
        let joined = testing::next_event_named(&mut bob_rx, "user-joined").await;
        assert_eq!(joined["data"]["userId"], "C");
        assert_eq!(joined["data"]["connectionId"], carol.id().to_string());
    }

    #[tokio::test]
    async fn test_existing_participants_excludes_departed_members() {
        // テスト項目: 切断したメンバーは既存参加者に含まれない
        // given (前提条件):
        let relay = TestRelay::new();
        let handler = handler(&relay);
        let (mut alice, _alice_rx) = testing::connect(Namespace::Video);
        let (mut bob, _bob_rx) = testing::connect(Namespace::Video);
        let (mut carol, mut carol_rx) = testing::connect(Namespace::Video);
        handler
            .handle(&mut alice, VideoRequest::JoinRoom(testing::join_request("S1", "A")))
            .await;
        handler
            .handle(&mut bob, VideoRequest::JoinRoom(testing::join_request("S1", "B")))
            .await;
        handler.disconnect(&mut alice).await;

        // when (操作):
        handler
            .handle(&mut carol, VideoRequest::JoinRoom(testing::join_request("S1", "C")))
            .await;

        // then (期待する結果):
        let event = testing::next_event(&mut carol_rx).await;
        let participants = event["data"].as_array().unwrap();
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0]["userId"], "B");
    }

    #[tokio::test]
    async fn test_denied_join_is_never_registered() {
        // テスト項目: 参加者でないユーザーはエラーを受け取り、Room に登録されない
        // given (前提条件):
        let mut checker = MockSessionAccessChecker::new();
        checker
            .expect_is_participant()
            .returning(|_, user| Ok(user.as_str() != "mallory"));
        let relay = TestRelay::with_checker(checker);
        let handler = handler(&relay);
        let (mut alice, _alice_rx) = testing::connect(Namespace::Video);
        let (mut mallory, mut mallory_rx) = testing::connect(Namespace::Video);
        handler
            .handle(&mut alice, VideoRequest::JoinRoom(testing::join_request("S1", "A")))
            .await;

        // when (操作):
        handler
            .handle(
                &mut mallory,
                VideoRequest::JoinRoom(testing::join_request("S1", "mallory")),
            )
            .await;
        handler
            .handle(&mut alice, VideoRequest::StartScreenShare)
            .await;

        // then (期待する結果):
        let event = testing::next_event(&mut mallory_rx).await;
        assert_eq!(event["event"], "error");
        testing::assert_no_event(&mut mallory_rx);
        assert!(!mallory.is_joined());
        let members = handler.registry().members(&testing::session_room("S1"));
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id.as_str(), "A");
    }

    #[tokio::test]
    async fn test_offer_forwarded_to_target_with_sender() {
        // テスト項目: offer は転送先にだけ、送信元の接続 ID 付きで届く
        // given (前提条件):
        let relay = TestRelay::new();
        let handler = handler(&relay);
        let (mut alice, mut alice_rx) = testing::connect(Namespace::Video);
        let (mut bob, mut bob_rx) = testing::connect(Namespace::Video);
        let (mut carol, mut carol_rx) = testing::connect(Namespace::Video);
        for (connection, user) in [(&mut alice, "A"), (&mut bob, "B"), (&mut carol, "C")] {
            handler
                .handle(connection, VideoRequest::JoinRoom(testing::join_request("S1", user)))
                .await;
        }
        while alice_rx.try_recv().is_ok() {}
        while bob_rx.try_recv().is_ok() {}
        while carol_rx.try_recv().is_ok() {}

        // when (操作):
        handler
            .handle(&mut alice, VideoRequest::Offer(signal(bob.id())))
            .await;

        // then (期待する結果):
        let event = testing::next_event(&mut bob_rx).await;
        assert_eq!(event["event"], "offer");
        assert_eq!(event["data"]["sender"], alice.id().to_string());
        assert_eq!(event["data"]["offer"], json!({"sdp": "v=0"}));
        testing::assert_no_event(&mut carol_rx);
        testing::assert_no_event(&mut alice_rx);
    }

    #[tokio::test]
    async fn test_forward_to_departed_target_is_noop() {
        // テスト項目: 切断済みの相手への転送はエラーにならず何も起きない
        // given (前提条件):
        let relay = TestRelay::new();
        let handler = handler(&relay);
        let (mut alice, mut alice_rx) = testing::connect(Namespace::Video);
        let (mut bob, _bob_rx) = testing::connect(Namespace::Video);
        handler
            .handle(&mut alice, VideoRequest::JoinRoom(testing::join_request("S1", "A")))
            .await;
        handler
            .handle(&mut bob, VideoRequest::JoinRoom(testing::join_request("S1", "B")))
            .await;
        let bob_id = bob.id().clone();
        handler.disconnect(&mut bob).await;
        while alice_rx.try_recv().is_ok() {}

        // when (操作):
        handler
            .handle(&mut alice, VideoRequest::IceCandidate(signal(&bob_id)))
            .await;

        // then (期待する結果):
        testing::assert_no_event(&mut alice_rx);
        assert!(alice.is_joined());
    }

    #[tokio::test]
    async fn test_disconnect_notifies_remaining_members() {
        // テスト項目: 切断すると残りのメンバーに user-left が届く
        // given (前提条件):
        let relay = TestRelay::new();
        let handler = handler(&relay);
        let (mut alice, mut alice_rx) = testing::connect(Namespace::Video);
        let (mut bob, _bob_rx) = testing::connect(Namespace::Video);
        handler
            .handle(&mut alice, VideoRequest::JoinRoom(testing::join_request("S1", "A")))
            .await;
        handler
            .handle(&mut bob, VideoRequest::JoinRoom(testing::join_request("S1", "B")))
            .await;
        let bob_id = bob.id().to_string();

        // when (操作):
        handler.disconnect(&mut bob).await;

        // then (期待する結果):
        let left = testing::next_event_named(&mut alice_rx, "user-left").await;
        assert_eq!(left["data"], json!({"userId": "B", "connectionId": bob_id}));
        assert_eq!(handler.registry().member_count(), 1);
    }

    #[tokio::test]
    async fn test_media_toggle_reaches_others_only() {
        // テスト項目: メディア状態の変更は送信者以外に通知される
        // given (前提条件):
        let relay = TestRelay::new();
        let handler = handler(&relay);
        let (mut alice, mut alice_rx) = testing::connect(Namespace::Video);
        let (mut bob, mut bob_rx) = testing::connect(Namespace::Video);
        handler
            .handle(&mut alice, VideoRequest::JoinRoom(testing::join_request("S1", "A")))
            .await;
        handler
            .handle(&mut bob, VideoRequest::JoinRoom(testing::join_request("S1", "B")))
            .await;
        while alice_rx.try_recv().is_ok() {}

        // when (操作):
        handler
            .handle(
                &mut alice,
                VideoRequest::ToggleAudio(crate::infrastructure::dto::websocket::ToggleRequest {
                    enabled: false,
                }),
            )
            .await;

        // then (期待する結果):
        let event = testing::next_event_named(&mut bob_rx, "user-audio-toggle").await;
        assert_eq!(event["data"], json!({"userId": "A", "enabled": false}));
        testing::assert_no_event(&mut alice_rx);
    }

    #[tokio::test]
    async fn test_events_before_join_are_ignored() {
        // テスト項目: join 前の接続からのイベントは無視される
        // given (前提条件):
        let relay = TestRelay::new();
        let handler = handler(&relay);
        let (mut alice, mut alice_rx) = testing::connect(Namespace::Video);

        // when (操作):
        handler
            .handle(&mut alice, VideoRequest::StartScreenShare)
            .await;
        handler.disconnect(&mut alice).await;

        // then (期待する結果):
        testing::assert_no_event(&mut alice_rx);
        assert_eq!(handler.registry().room_count(), 0);
    }

    #[tokio::test]
    async fn test_rejoin_leaves_previous_room() {
        // テスト項目: 別の Room に join し直すと、前の Room から抜けて通知される
        // given (前提条件):
        let relay = TestRelay::new();
        let handler = handler(&relay);
        let (mut alice, _alice_rx) = testing::connect(Namespace::Video);
        let (mut bob, mut bob_rx) = testing::connect(Namespace::Video);
        handler
            .handle(&mut bob, VideoRequest::JoinRoom(testing::join_request("S1", "B")))
            .await;
        handler
            .handle(&mut alice, VideoRequest::JoinRoom(testing::join_request("S1", "A")))
            .await;

        // when (操作):
        handler
            .handle(&mut alice, VideoRequest::JoinRoom(testing::join_request("S2", "A")))
            .await;

        // then (期待する結果):
        let left = testing::next_event_named(&mut bob_rx, "user-left").await;
        assert_eq!(left["data"]["userId"], "A");
        assert_eq!(handler.registry().members(&testing::session_room("S1")).len(), 1);
        assert_eq!(handler.registry().members(&testing::session_room("S2")).len(), 1);
    }
}
