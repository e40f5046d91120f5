//! クロスインスタンス配信チャンネルの実装
//!
//! - `redis`: Redis pub/sub（本番用）
//! - `inmemory`: 同一プロセス内の複数インスタンスを結ぶ（開発・テスト用）

pub mod inmemory;
pub mod redis;

pub use inmemory::InMemoryCrossInstanceChannel;
pub use redis::RedisCrossInstanceChannel;

/// 購読ストリームのバッファサイズ
const SUBSCRIPTION_BUFFER: usize = 1024;
