//! ハンドラーが共有するアプリケーション状態

use std::sync::Arc;

use tokio::sync::watch;

use crate::{
    domain::{Namespace, RoomRegistry},
    usecase::{
        ChatHandler, CodeHandler, NamespaceHandler, RelayContext, ReplicationHealth, VideoHandler,
        WhiteboardHandler,
    },
};

pub struct AppState {
    pub context: Arc<RelayContext>,
    pub video: Arc<VideoHandler>,
    pub whiteboard: Arc<WhiteboardHandler>,
    pub code: Arc<CodeHandler>,
    pub chat: Arc<ChatHandler>,
    /// `true` になったら全ての接続を閉じる
    pub shutdown: watch::Receiver<bool>,
    /// インスタンス間配信を行わない構成では `None`
    pub replication: Option<ReplicationHealth>,
}

impl AppState {
    /// 名前空間ごとの Room Registry
    pub fn registries(&self) -> Vec<(Namespace, Arc<dyn RoomRegistry>)> {
        vec![
            (Namespace::Video, self.video.registry().clone()),
            (Namespace::Whiteboard, self.whiteboard.registry().clone()),
            (Namespace::Code, self.code.registry().clone()),
            (Namespace::Chat, self.chat.registry().clone()),
        ]
    }
}
