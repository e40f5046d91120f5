//! Redis を使った Auxiliary Store 実装
//!
//! `ConnectionManager` は自動再接続付きの多重化接続で、clone しても同じ接続を共有する。
//! 操作ごとに clone して使う。

use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, RedisError, aio::ConnectionManager};

use crate::domain::{AuxiliaryStore, StoreError};

pub struct RedisAuxiliaryStore {
    connection: ConnectionManager,
}

impl RedisAuxiliaryStore {
    /// Redis に接続する（到達できなければエラー）
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(store_error)?;
        let connection = ConnectionManager::new(client).await.map_err(store_error)?;
        tracing::info!("Connected to auxiliary store at {}", redact(url));
        Ok(Self { connection })
    }

    fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

fn store_error(err: RedisError) -> StoreError {
    match err.code() {
        Some("WRONGTYPE") => StoreError::WrongType(err.to_string()),
        _ => StoreError::Unavailable(err.to_string()),
    }
}

/// SCAN 1 回あたりの走査件数の目安
const SCAN_BATCH_SIZE: usize = 100;

/// SCAN MATCH パターンのメタ文字をエスケープする
fn escape_pattern(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('*');
    escaped
}

/// ログ出力用に URL の認証情報を伏せる
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

#[async_trait]
impl AuxiliaryStore for RedisAuxiliaryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn append(
        &self,
        key: &str,
        value: String,
        retention: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut conn = self.connection();
        let mut pipe = redis::pipe();
        pipe.atomic().rpush(key, value).ignore();
        if let Some(retention) = retention {
            pipe.expire(key, retention.as_secs() as i64).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await.map_err(store_error)?;
        Ok(())
    }

    async fn append_capped(
        &self,
        key: &str,
        value: String,
        capacity: usize,
    ) -> Result<(), StoreError> {
        let mut conn = self.connection();
        let start = -(capacity.max(1) as isize);
        let _: () = redis::pipe()
            .atomic()
            .rpush(key, value)
            .ignore()
            .ltrim(key, start, -1)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn range(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connection();
        conn.lrange(key, 0, -1).await.map_err(store_error)
    }

    async fn put(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut conn = self.connection();
        match ttl {
            Some(ttl) => {
                let _: () = conn
                    .set_ex(key, value, ttl.as_secs().max(1))
                    .await
                    .map_err(store_error)?;
            }
            None => {
                let _: () = conn.set(key, value).await.map_err(store_error)?;
            }
        }
        Ok(())
    }

    async fn fetch(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection();
        conn.get(key).await.map_err(store_error)
    }

    async fn increment(&self, key: &str, ttl: Option<Duration>) -> Result<u64, StoreError> {
        let mut conn = self.connection();
        let mut pipe = redis::pipe();
        pipe.atomic().incr(key, 1_u64);
        if let Some(ttl) = ttl {
            pipe.expire(key, ttl.as_secs().max(1) as i64).ignore();
        }
        let (value,): (u64,) = pipe.query_async(&mut conn).await.map_err(store_error)?;
        Ok(value)
    }

    async fn fetch_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        let mut conn = self.connection();
        let pattern = escape_pattern(prefix);

        // KEYS は使わず SCAN のカーソルで走査する
        let mut keys: Vec<String> = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH_SIZE)
                .query_async(&mut conn)
                .await
                .map_err(store_error)?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        // SCAN は同じキーを複数回返すことがある
        keys.sort();
        keys.dedup();

        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;

        // SCAN と MGET の間に期限切れになった値は除外する
        Ok(keys
            .into_iter()
            .zip(values)
            .filter_map(|(key, value)| value.map(|value| (key, value)))
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection();
        let _: i64 = conn.del(key).await.map_err(store_error)?;
        Ok(())
    }

    /// 書き込みは全て完了を待ってから返すので、ここで送り出すものはない
    ///
    /// `ConnectionManager` に明示的な切断はなく、接続は最後の clone と一緒に破棄される。
    async fn close(&self) -> Result<(), StoreError> {
        tracing::info!("Auxiliary store has no pending writes; connection is released on drop");
        Ok(())
    }
}
