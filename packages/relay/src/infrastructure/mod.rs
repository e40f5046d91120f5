//! Infrastructure 層
//!
//! ドメイン層の trait の具体的な実装（インメモリ / Redis / HTTP）と、
//! ワイヤーフォーマットの DTO。

pub mod collaborator;
pub mod dto;
pub mod pubsub;
pub mod registry;
pub mod store;
