//! Data Transfer Objects
//!
//! WebSocket フレームと HTTP レスポンスの形式、およびドメインモデルとの変換。

pub mod conversion;
pub mod http;
pub mod websocket;
