//! Auxiliary Store の実装
//!
//! - `redis`: 本番用（複数インスタンスで共有）
//! - `inmemory`: 単一インスタンスの開発・テスト用

pub mod inmemory;
pub mod redis;

pub use inmemory::InMemoryAuxiliaryStore;
pub use redis::RedisAuxiliaryStore;
