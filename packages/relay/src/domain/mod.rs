//! ドメイン層
//!
//! エンティティ・Value Object と、UseCase 層が依存する trait（Room Registry,
//! Auxiliary Store, クロスインスタンスチャンネル, 外部コラボレーター）を定義する。
//! 具体的な実装は Infrastructure 層が提供する（依存性の逆転）。

pub mod collaborator;
pub mod connection;
pub mod entity;
pub mod error;
pub mod keys;
pub mod pubsub;
pub mod registry;
pub mod sequencer;
pub mod store;
pub mod value_object;

pub use collaborator::{
    AiAssistant, CodeExecutor, Collaborators, ContentAnalyzer, SessionAccessChecker,
    SessionStatusUpdater,
};
#[cfg(test)]
pub use collaborator::{
    MockAiAssistant, MockCodeExecutor, MockContentAnalyzer, MockSessionAccessChecker,
    MockSessionStatusUpdater,
};
pub use connection::{ConnectionHandle, Membership};
pub use entity::{
    AutoSave, ChatMessage, CodeChange, CodeEdit, CursorPosition, CursorState, DrawingOperation,
    DrawingShape, ExecutionOutput, FileContent, MessageKind, Participant, Point,
    RESERVED_OPERATION_FIELDS, Selection,
};
pub use error::{ChannelError, CollaboratorError, PushError, StoreError, ValueObjectError};
pub use keys::StoreKeys;
pub use pubsub::{CrossInstanceChannel, RelayEnvelope, Subscription};
pub use registry::{Member, PusherChannel, RoomRegistry};
pub use sequencer::ChangeSequencer;
pub use store::AuxiliaryStore;
pub use value_object::{
    ASSISTANT_USER_ID, ConnectionId, FileId, InstanceId, MessageContent, Namespace, RoomKey,
    SessionId, Timestamp, UserId,
};
