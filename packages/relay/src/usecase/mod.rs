//! UseCase 層
//!
//! 名前空間ごとのイベントハンドラーと、クロスインスタンス配信のブリッジ。
//! 各ハンドラーは自分の名前空間の Room Registry を 1 つ持つ。

pub mod bridge;
pub mod chat;
pub mod code;
pub mod context;
pub mod error;
pub mod video;
pub mod whiteboard;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    domain::{ConnectionHandle, Namespace, RoomRegistry},
    infrastructure::dto::websocket::{DecodeError, InboundFrame},
};

pub use bridge::{CrossInstanceBridge, ReplicationHealth};
pub use chat::ChatHandler;
pub use code::CodeHandler;
pub use context::{Audience, RelayContext};
pub use error::JoinError;
pub use video::VideoHandler;
pub use whiteboard::WhiteboardHandler;

/// 名前空間のイベントハンドラー
///
/// 接続ごとのタスクから、受信したリクエストと切断が順に渡される。
#[async_trait]
pub trait NamespaceHandler: Send + Sync + 'static {
    type Request: TryFrom<InboundFrame, Error = DecodeError> + Send;

    fn namespace(&self) -> Namespace;

    fn registry(&self) -> &Arc<dyn RoomRegistry>;

    /// join 前の接続からの join 以外のリクエストは無視する
    async fn handle(&self, connection: &mut ConnectionHandle, request: Self::Request);

    /// 接続が閉じたときに呼ばれる（join 前なら何もしない）
    async fn disconnect(&self, connection: &mut ConnectionHandle);
}
